mod common;

use std::sync::{Arc, Mutex};

use common::{people_with_monotone_ages, people_with_random_ages, Person, Rng};
use deltaview_bind::SortedListAdapter;
use deltaview_cache::KeyedCache;
use deltaview_core::prelude::*;
use deltaview_operators::{ChangeStreamOps, Comparer};

const RESET_THRESHOLD: usize = 25;

fn person_cache() -> KeyedCache<String, Person> {
    KeyedCache::new(|person: &Person| person.key())
}

fn name_then_age() -> Comparer<Person> {
    Comparer::ascending(|p: &Person| p.name().to_string()).then_ascending(|p: &Person| p.age())
}

fn age_then_name() -> Comparer<Person> {
    Comparer::ascending(|p: &Person| p.age()).then_ascending(|p: &Person| p.name().to_string())
}

fn age_desc_then_name() -> Comparer<Person> {
    Comparer::descending(|p: &Person| p.age()).then_ascending(|p: &Person| p.name().to_string())
}

fn expected_order(people: &[Person], comparer: &Comparer<Person>) -> Vec<Person> {
    let mut expected = people.to_vec();
    expected.sort_by(|a, b| comparer.compare(a, b));
    expected
}

fn sorted_values(results: &SortedChangeSetAggregator<String, Person>) -> Vec<Person> {
    results
        .sorted_items()
        .into_iter()
        .map(|(_, person)| person)
        .collect()
}

#[test]
fn initial_batch_is_fully_ordered() {
    let cache = person_cache();
    let sorted = cache.connect().sort(name_then_age(), RESET_THRESHOLD);
    let results = SortedChangeSetAggregator::capture(&sorted);

    let people = people_with_random_ages(100, 3);
    cache.add_or_update_many(people.clone()).expect("add");

    assert_eq!(results.message_count(), 1);
    assert_eq!(results.last_reason(), Some(SortReason::InitialLoad));
    assert_eq!(results.data().len(), 100);
    assert_eq!(sorted_values(&results), expected_order(&people, &name_then_age()));
}

#[test]
fn replacing_the_comparer_resorts_everything() {
    let cache = person_cache();
    let comparers = Signal::new(name_then_age());
    let sorted = cache.connect().sort_with(comparers.clone(), RESET_THRESHOLD);
    let results = SortedChangeSetAggregator::capture(&sorted);

    let people = people_with_random_ages(100, 5);
    cache.add_or_update_many(people.clone()).expect("add");
    comparers.set(age_desc_then_name());

    assert_eq!(results.message_count(), 2);
    assert_eq!(
        sorted_values(&results),
        expected_order(&people, &age_desc_then_name())
    );
}

#[test]
fn comparer_change_within_threshold_reorders() {
    let cache = person_cache();
    let comparers = Signal::new(name_then_age());
    let sorted = cache.connect().sort_with(comparers.clone(), RESET_THRESHOLD);
    let results = SortedChangeSetAggregator::capture(&sorted);

    // 20 displaced items stay at or under the threshold of 25.
    let people = people_with_monotone_ages(20);
    cache.add_or_update_many(people.clone()).expect("add");
    comparers.set(age_desc_then_name());

    assert_eq!(results.last_reason(), Some(SortReason::Reorder));
    assert_eq!(
        sorted_values(&results),
        expected_order(&people, &age_desc_then_name())
    );
    let last = results.messages().last().expect("emission").clone();
    assert!(last.changes().moves() > 0);
}

#[test]
fn comparer_change_above_threshold_resets() {
    let cache = person_cache();
    let comparers = Signal::new(name_then_age());
    let sorted = cache.connect().sort_with(comparers.clone(), RESET_THRESHOLD);
    let results = SortedChangeSetAggregator::capture(&sorted);

    // Reversing 30 items displaces all 30, which exceeds the threshold.
    let people = people_with_monotone_ages(30);
    cache.add_or_update_many(people.clone()).expect("add");
    comparers.set(age_desc_then_name());

    assert_eq!(results.last_reason(), Some(SortReason::Reset));
    assert_eq!(
        sorted_values(&results),
        expected_order(&people, &age_desc_then_name())
    );
}

#[test]
fn incremental_adds_and_removes_patch_the_order() {
    let cache = person_cache();
    let sorted = cache.connect().sort(age_then_name(), RESET_THRESHOLD);
    let results = SortedChangeSetAggregator::capture(&sorted);

    cache
        .add_or_update_many(vec![
            Person::new("ann", 30),
            Person::new("bob", 20),
            Person::new("cy", 40),
        ])
        .expect("seed");
    cache.add_or_update(Person::new("dee", 25)).expect("add");
    cache.remove(&"cy".to_string()).expect("remove");

    assert_eq!(results.message_count(), 3);
    let messages = results.messages();
    assert_eq!(messages[1].reason(), SortReason::DataChanged);
    // dee (25) slots between bob (20) and ann (30).
    assert_eq!(messages[1].changes().iter().next().expect("add").index(), Some(1));
    let names: Vec<String> = sorted_values(&results).iter().map(|p| p.key()).collect();
    assert_eq!(names, vec!["bob", "dee", "ann"]);
}

#[test]
fn in_place_mutations_resort_and_rebind_consistently() {
    let cache = person_cache();
    let sorted = cache.connect().sort(age_then_name(), RESET_THRESHOLD);
    let results = SortedChangeSetAggregator::capture(&sorted);

    let people = people_with_random_ages(10_000, 9);
    cache.add_or_update_many(people.clone()).expect("seed");

    // Mutate ten items in place through external references, then announce
    // the mutations with one bulk refresh.
    let mut rng = Rng::new(21);
    let mut touched = Vec::new();
    for _ in 0..10 {
        let person = &people[rng.below(10_000) as usize];
        person.set_age(rng.below(100) + 1);
        touched.push(person.key());
    }
    touched.sort();
    touched.dedup();
    cache.refresh_many(touched).expect("refresh");

    let expected = expected_order(&people, &age_then_name());
    assert_eq!(sorted_values(&results), expected);

    // Replaying the full emitted history into a bound list must land on
    // the same order.
    let adapter = SortedListAdapter::new();
    let mut bound: Vec<Person> = Vec::new();
    for message in results.messages() {
        adapter.adapt(&message, &mut bound);
    }
    assert_eq!(bound, expected);
}

#[test]
fn refresh_without_order_impact_stays_incremental() {
    let cache = person_cache();
    let sorted = cache.connect().sort(name_then_age(), RESET_THRESHOLD);
    let results = SortedChangeSetAggregator::capture(&sorted);

    let people = people_with_random_ages(100, 13);
    cache.add_or_update_many(people.clone()).expect("seed");

    // Names are unique, so age mutations never change a name-ordered
    // sequence: the emission carries refreshes but no moves.
    let person = &people[42];
    person.set_age(1);
    cache.refresh(&person.key()).expect("refresh");

    assert_eq!(results.last_reason(), Some(SortReason::DataChanged));
    let last = results.messages().last().expect("emission").clone();
    assert_eq!(last.changes().refreshes(), 1);
    assert_eq!(last.changes().moves(), 0);
    assert_eq!(sorted_values(&results), expected_order(&people, &name_then_age()));
}

#[test]
fn comparer_roundtrip_restores_the_original_order() {
    let cache = person_cache();
    let comparers = Signal::new(name_then_age());
    let sorted = cache.connect().sort_with(comparers.clone(), RESET_THRESHOLD);
    let results = SortedChangeSetAggregator::capture(&sorted);

    let people = people_with_monotone_ages(100);
    cache.add_or_update_many(people.clone()).expect("seed");
    comparers.set(age_desc_then_name());
    comparers.set(name_then_age());

    assert_eq!(results.message_count(), 3);
    assert_eq!(
        sorted_values(&results),
        expected_order(&people, &name_then_age())
    );
}

#[test]
fn late_subscriber_gets_an_initial_load_of_sorted_state() {
    let cache = person_cache();
    let people = people_with_random_ages(50, 17);
    cache.add_or_update_many(people.clone()).expect("seed");

    let sorted = cache.connect().sort(age_then_name(), RESET_THRESHOLD);
    let results = SortedChangeSetAggregator::capture(&sorted);

    assert_eq!(results.message_count(), 1);
    assert_eq!(results.last_reason(), Some(SortReason::InitialLoad));
    assert_eq!(sorted_values(&results), expected_order(&people, &age_then_name()));
}

#[test]
fn unsubscribing_one_view_leaves_siblings_running() {
    let cache = person_cache();
    let stream = cache.connect();
    let first = SortedChangeSetAggregator::capture(&stream.sort(age_then_name(), RESET_THRESHOLD));
    let second = SortedChangeSetAggregator::capture(&stream.sort(name_then_age(), RESET_THRESHOLD));

    cache.add_or_update(Person::new("ann", 30)).expect("add");
    drop(first);
    cache.add_or_update(Person::new("bob", 20)).expect("add");

    assert_eq!(second.message_count(), 2);
    let names: Vec<String> = second
        .sorted_items()
        .into_iter()
        .map(|(key, _)| key)
        .collect();
    assert_eq!(names, vec!["ann", "bob"]);
}

#[test]
fn bound_list_follows_a_sorted_stream() {
    use deltaview_bind::SortedStreamExt;

    let cache = person_cache();
    let comparers = Signal::new(age_then_name());
    let sorted = cache.connect().sort_with(comparers.clone(), 3);
    let target: Arc<Mutex<Vec<Person>>> = Arc::new(Mutex::new(Vec::new()));
    let binding = sorted.bind(Arc::clone(&target));

    let people = people_with_monotone_ages(8);
    cache.add_or_update_many(people.clone()).expect("seed");
    // Threshold 3 forces the comparer swap down the reset path.
    comparers.set(age_desc_then_name());

    let expected = expected_order(&people, &age_desc_then_name());
    assert_eq!(*target.lock().unwrap(), expected);

    binding.unsubscribe();
    cache.add_or_update(Person::new("zed", 99)).expect("add");
    assert_eq!(target.lock().unwrap().len(), 8);
}
