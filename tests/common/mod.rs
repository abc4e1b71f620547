//! Shared domain helpers for the integration fixtures.
#![allow(dead_code)]

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Domain value with a stable key (`name`) and a secondary field (`age`)
/// that can be mutated in place: clones share the age cell, so a caller
/// holding an external reference can change an item the cache already owns
/// and announce it via `refresh`.
#[derive(Clone)]
pub struct Person {
    name: String,
    age: Arc<AtomicU32>,
}

impl Person {
    pub fn new(name: impl Into<String>, age: u32) -> Self {
        Self {
            name: name.into(),
            age: Arc::new(AtomicU32::new(age)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> String {
        self.name.clone()
    }

    pub fn age(&self) -> u32 {
        self.age.load(Ordering::SeqCst)
    }

    pub fn set_age(&self, age: u32) {
        self.age.store(age, Ordering::SeqCst);
    }
}

impl fmt::Debug for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Person")
            .field("name", &self.name)
            .field("age", &self.age())
            .finish()
    }
}

impl PartialEq for Person {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.age() == other.age()
    }
}

/// Small deterministic generator (xorshift*) standing in for random data.
pub struct Rng(u64);

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        (x.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 32) as u32
    }

    pub fn below(&mut self, bound: u32) -> u32 {
        self.next_u32() % bound
    }
}

/// `count` people with unique zero-padded names and pseudo-random ages.
pub fn people_with_random_ages(count: usize, seed: u64) -> Vec<Person> {
    let mut rng = Rng::new(seed);
    (0..count)
        .map(|i| Person::new(format!("person-{i:05}"), rng.below(100) + 1))
        .collect()
}

/// `count` people whose age order matches their name order, so reversing
/// either field reverses the whole sequence.
pub fn people_with_monotone_ages(count: usize) -> Vec<Person> {
    (0..count)
        .map(|i| Person::new(format!("person-{i:05}"), i as u32))
        .collect()
}
