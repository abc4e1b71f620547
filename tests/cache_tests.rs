mod common;

use common::{people_with_random_ages, Person, Rng};
use deltaview_cache::KeyedCache;
use deltaview_core::prelude::*;

fn person_cache() -> KeyedCache<String, Person> {
    KeyedCache::new(|person: &Person| person.key())
}

#[test]
fn batched_adds_arrive_as_one_change_set() {
    let cache = person_cache();
    let results = ChangeSetAggregator::capture(&cache.connect());

    let people: Vec<Person> = (1..=10)
        .map(|i| Person::new(format!("key-{i}"), i))
        .collect();
    cache.add_or_update_many(people).expect("add batch");

    assert_eq!(results.message_count(), 1);
    let first = &results.messages()[0];
    assert_eq!(first.adds(), 10);
    assert_eq!(first.len(), 10);
    assert_eq!(results.data().len(), 10);
    assert_eq!(cache.len(), 10);
}

#[test]
fn duplicate_key_add_is_an_update() {
    let cache = person_cache();
    let results = ChangeSetAggregator::capture(&cache.connect());

    cache.add_or_update(Person::new("ann", 30)).expect("add");
    cache.add_or_update(Person::new("ann", 31)).expect("update");

    let messages = results.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].adds(), 0);
    assert_eq!(messages[1].updates(), 1);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(&"ann".to_string()).expect("present").age(), 31);
}

#[test]
fn removing_an_absent_key_is_a_noop() {
    let cache = person_cache();
    let results = ChangeSetAggregator::capture(&cache.connect());

    cache.remove(&"ghost".to_string()).expect("no-op remove");

    assert_eq!(results.message_count(), 0);
}

#[test]
fn refreshing_an_absent_key_fails() {
    let cache = person_cache();

    let outcome = cache.refresh(&"ghost".to_string());

    assert!(matches!(outcome, Err(Error::KeyNotFound(_))));
}

#[test]
fn refresh_emits_without_structural_change() {
    let cache = person_cache();
    let results = ChangeSetAggregator::capture(&cache.connect());

    let ann = Person::new("ann", 30);
    cache.add_or_update(ann.clone()).expect("add");
    ann.set_age(44);
    cache.refresh(&"ann".to_string()).expect("refresh");

    let messages = results.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].refreshes(), 1);
    assert_eq!(messages[1].adds(), 0);
    assert_eq!(results.data().len(), 1);
    assert_eq!(
        results.data().get(&"ann".to_string()).expect("folded").age(),
        44
    );
}

#[test]
fn a_failed_bulk_refresh_emits_nothing() {
    let cache = person_cache();
    let results = ChangeSetAggregator::capture(&cache.connect());

    cache.add_or_update(Person::new("ann", 30)).expect("add");
    let outcome = cache.refresh_many(vec!["ann".to_string(), "ghost".to_string()]);

    assert!(matches!(outcome, Err(Error::KeyNotFound(_))));
    assert_eq!(results.message_count(), 1);
}

#[test]
fn clear_removes_every_entry_in_insertion_order() {
    let cache = person_cache();
    let results = ChangeSetAggregator::capture(&cache.connect());

    cache
        .add_or_update_many(vec![
            Person::new("ann", 1),
            Person::new("bob", 2),
            Person::new("cy", 3),
        ])
        .expect("add");
    cache.clear().expect("clear");

    let messages = results.messages();
    assert_eq!(messages[1].removes(), 3);
    let removed: Vec<String> = messages[1].iter().map(|c| c.key().clone()).collect();
    assert_eq!(removed, vec!["ann", "bob", "cy"]);
    assert!(cache.is_empty());
    assert!(results.data().is_empty());
}

#[test]
fn late_subscriber_receives_current_state_first() {
    let cache = person_cache();
    cache
        .add_or_update_many(vec![
            Person::new("ann", 1),
            Person::new("bob", 2),
            Person::new("cy", 3),
        ])
        .expect("add");
    cache.remove(&"bob".to_string()).expect("remove");

    let results = ChangeSetAggregator::capture(&cache.connect());

    assert_eq!(results.message_count(), 1);
    let initial = &results.messages()[0];
    assert_eq!(initial.adds(), 2);
    let keys: Vec<String> = initial.iter().map(|c| c.key().clone()).collect();
    assert_eq!(keys, vec!["ann", "cy"]);
    assert_eq!(results.data().len(), 2);
}

#[test]
fn dispose_completes_subscriptions_and_blocks_mutation() {
    let cache = person_cache();
    let results = ChangeSetAggregator::capture(&cache.connect());

    cache.add_or_update(Person::new("ann", 1)).expect("add");
    cache.dispose();

    assert!(results.is_completed());
    assert!(matches!(
        cache.add_or_update(Person::new("bob", 2)),
        Err(Error::Disposed)
    ));
    assert!(matches!(cache.clear(), Err(Error::Disposed)));
}

#[test]
fn dropping_the_cache_completes_subscriptions() {
    let cache = person_cache();
    let results = ChangeSetAggregator::capture(&cache.connect());
    cache.add_or_update(Person::new("ann", 1)).expect("add");

    drop(cache);

    assert!(results.is_completed());
    assert_eq!(results.data().len(), 1);
}

#[test]
fn folding_every_change_set_reproduces_cache_state() {
    let cache = person_cache();
    let results = ChangeSetAggregator::capture(&cache.connect());
    let mut rng = Rng::new(7);

    let people = people_with_random_ages(40, 11);
    cache.add_or_update_many(people.clone()).expect("seed");
    for round in 0..50 {
        match round % 4 {
            0 => {
                let person = &people[rng.below(40) as usize];
                cache
                    .add_or_update(Person::new(person.name(), rng.below(100)))
                    .expect("update");
            }
            1 => {
                let person = &people[rng.below(40) as usize];
                cache.remove(&person.key()).expect("remove");
            }
            2 => {
                cache
                    .add_or_update(Person::new(format!("extra-{round}"), rng.below(100)))
                    .expect("add");
            }
            _ => {
                let person = &people[rng.below(40) as usize];
                if cache.get(&person.key()).is_some() {
                    person.set_age(rng.below(100));
                    cache.refresh(&person.key()).expect("refresh");
                }
            }
        }
    }

    let folded = results.data();
    let snapshot = cache.snapshot();
    assert_eq!(folded.len(), snapshot.len());
    for (key, value) in snapshot {
        assert_eq!(folded.get(&key), Some(&value), "mismatch for {key}");
    }
}
