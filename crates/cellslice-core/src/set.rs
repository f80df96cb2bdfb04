//! Keyed set primitives (spec.md S4.A).
//!
//! `KeyedSet<T, K>` is a set over items of type `T` whose identity is given
//! by a caller-supplied key-extraction function `T -> K`. Backed by an
//! `indexmap::IndexMap` so iteration order is deterministic (insertion
//! order) within a single traversal without promising anything about cross-
//! run ordering -- exactly the guarantee spec.md S4.A asks for, and the
//! property SPEC_FULL.md S3 calls out for reproducible tests.

use indexmap::IndexMap;
use std::fmt;
use std::hash::Hash;

pub struct KeyedSet<T, K, F>
where
    K: Eq + Hash + Clone,
    F: Fn(&T) -> K,
{
    items: IndexMap<K, T>,
    key_fn: F,
}

impl<T: Clone, K: Eq + Hash + Clone, F: Fn(&T) -> K + Clone> Clone for KeyedSet<T, K, F> {
    fn clone(&self) -> Self {
        Self { items: self.items.clone(), key_fn: self.key_fn.clone() }
    }
}

impl<T: fmt::Debug, K: Eq + Hash + Clone + fmt::Debug, F: Fn(&T) -> K> fmt::Debug for KeyedSet<T, K, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.values()).finish()
    }
}

impl<T, K, F> KeyedSet<T, K, F>
where
    K: Eq + Hash + Clone,
    F: Fn(&T) -> K,
{
    pub fn new(key_fn: F) -> Self {
        Self { items: IndexMap::new(), key_fn }
    }

    pub fn from_iter(key_fn: F, iter: impl IntoIterator<Item = T>) -> Self {
        let mut set = Self::new(key_fn);
        for item in iter {
            set.add(item);
        }
        set
    }

    /// Inserts `item`, replacing any prior item with the same key.
    pub fn add(&mut self, item: T) {
        let key = (self.key_fn)(&item);
        self.items.insert(key, item);
    }

    pub fn remove(&mut self, item: &T) -> bool {
        let key = (self.key_fn)(item);
        self.items.shift_remove(&key).is_some()
    }

    pub fn has(&self, item: &T) -> bool {
        let key = (self.key_fn)(item);
        self.items.contains_key(&key)
    }

    pub fn has_key(&self, key: &K) -> bool {
        self.items.contains_key(key)
    }

    pub fn get_by_key(&self, key: &K) -> Option<&T> {
        self.items.get(key)
    }

    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.items.values()
    }

    pub fn into_items(self) -> impl Iterator<Item = T> {
        self.items.into_values()
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn equals(&self, other: &Self) -> bool {
        self.size() == other.size() && self.items.keys().all(|k| other.items.contains_key(k))
    }

    /// Variadic union: self plus every set in `others`.
    pub fn union(&self, others: impl IntoIterator<Item = Self>) -> Self
    where
        T: Clone,
        F: Clone,
    {
        let mut result = self.clone();
        for other in others {
            for (k, v) in other.items {
                result.items.insert(k, v);
            }
        }
        result
    }

    pub fn intersect(&self, other: &Self) -> Self
    where
        T: Clone,
        F: Clone,
    {
        let mut result = Self::new(self.key_fn.clone());
        for (k, v) in &self.items {
            if other.items.contains_key(k) {
                result.items.insert(k.clone(), v.clone());
            }
        }
        result
    }

    pub fn minus(&self, other: &Self) -> Self
    where
        T: Clone,
        F: Clone,
    {
        let mut result = Self::new(self.key_fn.clone());
        for (k, v) in &self.items {
            if !other.items.contains_key(k) {
                result.items.insert(k.clone(), v.clone());
            }
        }
        result
    }

    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Self
    where
        T: Clone,
        F: Clone,
    {
        let mut result = Self::new(self.key_fn.clone());
        for (k, v) in &self.items {
            if pred(v) {
                result.items.insert(k.clone(), v.clone());
            }
        }
        result
    }

    /// Maps every item through `f`, re-keying the result with `new_key_fn`.
    pub fn map<U, K2, F2>(&self, new_key_fn: F2, f: impl Fn(&T) -> U) -> KeyedSet<U, K2, F2>
    where
        K2: Eq + Hash + Clone,
        F2: Fn(&U) -> K2,
    {
        let mut result = KeyedSet::new(new_key_fn);
        for v in self.items.values() {
            result.add(f(v));
        }
        result
    }

    pub fn some(&self, pred: impl Fn(&T) -> bool) -> bool {
        self.items.values().any(pred)
    }

    /// Cartesian product with another set.
    pub fn product<'a, U, K2, F2>(&'a self, other: &'a KeyedSet<U, K2, F2>) -> Vec<(&'a T, &'a U)>
    where
        K2: Eq + Hash + Clone,
        F2: Fn(&U) -> K2,
    {
        let mut out = Vec::with_capacity(self.size() * other.size());
        for a in self.items.values() {
            for b in other.items.values() {
                out.push((a, b));
            }
        }
        out
    }

    /// Removes and returns an arbitrary element. Fails when the set is
    /// empty (spec.md S7: "fatal to the caller").
    pub fn pop(&mut self) -> Option<T> {
        self.items.shift_remove_index(0).map(|(_, v)| v)
    }
}

/// A set of plain `u64`s, keyed by identity.
pub type NumberSet = KeyedSet<u64, u64, fn(&u64) -> u64>;

pub fn number_set() -> NumberSet {
    KeyedSet::new(|n: &u64| *n)
}

/// `range(min, max)` -- the half-open integer set `[min, max)`.
pub fn range(min: u64, max: u64) -> NumberSet {
    let mut set = number_set();
    for n in min..max {
        set.add(n);
    }
    set
}

/// A set of `String`s, keyed by their own value.
pub type StringSet = KeyedSet<String, String, fn(&String) -> String>;

pub fn string_set() -> StringSet {
    KeyedSet::new(|s: &String| s.clone())
}

pub fn string_set_from(iter: impl IntoIterator<Item = String>) -> StringSet {
    KeyedSet::from_iter(|s: &String| s.clone(), iter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_is_idempotent() {
        let a = string_set_from(["a".to_string(), "b".to_string()]);
        let unioned = a.union([a.clone()]);
        assert!(unioned.equals(&a));
    }

    #[test]
    fn minus_self_is_empty() {
        let a = string_set_from(["a".to_string(), "b".to_string()]);
        assert!(a.minus(&a).empty());
    }

    #[test]
    fn intersect_is_commutative() {
        let a = string_set_from(["a".to_string(), "b".to_string()]);
        let b = string_set_from(["b".to_string(), "c".to_string()]);
        assert!(a.intersect(&b).equals(&b.intersect(&a)));
    }

    #[test]
    fn range_is_half_open() {
        let r = range(2, 5);
        assert_eq!(r.size(), 3);
        assert!(r.has(&2));
        assert!(!r.has(&5));
    }

    #[test]
    fn pop_drains_the_set() {
        let mut a = number_set();
        a.add(1);
        assert_eq!(a.pop(), Some(1));
        assert_eq!(a.pop(), None);
    }

    #[test]
    fn filter_keeps_matching_items() {
        let a = range(0, 10);
        let evens = a.filter(|n| n % 2 == 0);
        assert_eq!(evens.size(), 5);
    }
}
