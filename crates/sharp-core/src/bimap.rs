//! Bidirectional maps used for coordinator bookkeeping.
//!
//! - [`BiMap`] keeps a strict bijection between keys and values.
//! - [`BiSetMap`] maps each key to a set of values, with every value owned by
//!   exactly one key.
//!
//! Both keep their forward and reverse indexes in lockstep: every mutation
//! either updates both sides or neither.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::error::MapError;

/// A one-to-one map with O(1) lookups in both directions.
#[derive(Debug, Clone)]
pub struct BiMap<K, V> {
    forward: HashMap<K, V>,
    reverse: HashMap<V, K>,
}

impl<K, V> BiMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Eq + Hash + Clone,
{
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            forward: HashMap::new(),
            reverse: HashMap::new(),
        }
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Whether the map holds no pairs.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Insert a pair, failing if either side is already present.
    pub fn insert(&mut self, key: K, value: V) -> Result<(), MapError> {
        if self.forward.contains_key(&key) || self.reverse.contains_key(&value) {
            return Err(MapError::DuplicateKeyOrValue);
        }
        self.forward.insert(key.clone(), value.clone());
        self.reverse.insert(value, key);
        Ok(())
    }

    /// Insert a pair if neither side is present. Returns whether it was inserted.
    pub fn try_insert(&mut self, key: K, value: V) -> bool {
        self.insert(key, value).is_ok()
    }

    /// Remove the pair with the given key.
    pub fn remove_by_key(&mut self, key: &K) -> bool {
        match self.forward.remove(key) {
            Some(value) => {
                self.reverse.remove(&value);
                true
            }
            None => false,
        }
    }

    /// Remove the pair with the given value.
    pub fn remove_by_value(&mut self, value: &V) -> bool {
        match self.reverse.remove(value) {
            Some(key) => {
                self.forward.remove(&key);
                true
            }
            None => false,
        }
    }

    /// Look up a value by key.
    pub fn get_by_key(&self, key: &K) -> Option<&V> {
        self.forward.get(key)
    }

    /// Look up a key by value.
    pub fn get_by_value(&self, value: &V) -> Option<&K> {
        self.reverse.get(value)
    }

    /// Whether the key is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.forward.contains_key(key)
    }

    /// Whether the value is present.
    pub fn contains_value(&self, value: &V) -> bool {
        self.reverse.contains_key(value)
    }

    /// Iterate over all keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.forward.keys()
    }

    /// Iterate over all values.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.forward.values()
    }

    /// Iterate over all pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.forward.iter()
    }

    /// Remove every pair.
    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
    }
}

impl<K, V> Default for BiMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// A one-to-many map where each value has a unique owning key.
///
/// A key is present only while its set is non-empty.
#[derive(Debug, Clone)]
pub struct BiSetMap<K, V> {
    forward: HashMap<K, HashSet<V>>,
    reverse: HashMap<V, K>,
}

impl<K, V> BiSetMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Eq + Hash + Clone,
{
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            forward: HashMap::new(),
            reverse: HashMap::new(),
        }
    }

    /// Number of keys with at least one value.
    pub fn key_count(&self) -> usize {
        self.forward.len()
    }

    /// Number of values across all keys.
    pub fn value_count(&self) -> usize {
        self.reverse.len()
    }

    /// Whether the map holds no values.
    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }

    /// Add a value under a key, failing if the value already has an owner.
    pub fn insert(&mut self, key: K, value: V) -> Result<(), MapError> {
        if self.reverse.contains_key(&value) {
            return Err(MapError::ValueAlreadyOwned);
        }
        self.forward
            .entry(key.clone())
            .or_default()
            .insert(value.clone());
        self.reverse.insert(value, key);
        Ok(())
    }

    /// Add a value under a key if it has no owner yet.
    pub fn try_insert(&mut self, key: K, value: V) -> bool {
        self.insert(key, value).is_ok()
    }

    /// Remove a specific (key, value) pair.
    pub fn remove(&mut self, key: &K, value: &V) -> bool {
        let Some(set) = self.forward.get_mut(key) else {
            return false;
        };
        if !set.remove(value) {
            return false;
        }
        if set.is_empty() {
            self.forward.remove(key);
        }
        self.reverse.remove(value);
        true
    }

    /// Remove a key together with all of its values.
    pub fn remove_by_key(&mut self, key: &K) -> bool {
        match self.forward.remove(key) {
            Some(set) => {
                for value in &set {
                    self.reverse.remove(value);
                }
                true
            }
            None => false,
        }
    }

    /// Remove a value from whichever key owns it.
    ///
    /// Returns the owning key, which is deleted if this was its last value.
    pub fn remove_by_value(&mut self, value: &V) -> Option<K> {
        let key = self.reverse.remove(value)?;
        if let Some(set) = self.forward.get_mut(&key) {
            set.remove(value);
            if set.is_empty() {
                self.forward.remove(&key);
            }
        }
        Some(key)
    }

    /// The values owned by a key.
    pub fn get_values(&self, key: &K) -> Option<&HashSet<V>> {
        self.forward.get(key)
    }

    /// The key owning a value.
    pub fn get_key(&self, value: &V) -> Option<&K> {
        self.reverse.get(value)
    }

    /// Whether the key has any values.
    pub fn contains_key(&self, key: &K) -> bool {
        self.forward.contains_key(key)
    }

    /// Iterate over keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.forward.keys()
    }

    /// Iterate over every value of every key.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.forward.values().flatten()
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
    }
}

impl<K, V> Default for BiSetMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
