//! # Generic In-Memory Store
//!
//! Thread-safe, cloneable key-value store shared by the catalog, policy,
//! and workflow stores.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Thread-safe, cloneable in-memory record store.
///
/// All operations are synchronous (the RwLock is `parking_lot`, not an
/// async lock) because the lock is never held across a suspension point.
/// `parking_lot::RwLock` is non-poisonable — a panicking writer does not
/// permanently corrupt the store.
///
/// A `BTreeMap` keeps listings deterministic: identifiers are assigned
/// monotonically, so key order is insertion order.
#[derive(Debug)]
pub struct Store<K, V> {
    data: Arc<RwLock<BTreeMap<K, V>>>,
}

impl<K, V> Clone for Store<K, V> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<K: Ord + Clone, V: Clone> Store<K, V> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.data.write().insert(key, value)
    }

    /// Retrieve a record by key.
    pub fn get(&self, key: &K) -> Option<V> {
        self.data.read().get(key).cloned()
    }

    /// List all records in key order.
    pub fn list(&self) -> Vec<V> {
        self.data.read().values().cloned().collect()
    }

    /// Update a record in place under the write lock. Returns the updated
    /// record, or `None` if not found.
    pub fn update(&self, key: &K, f: impl FnOnce(&mut V)) -> Option<V> {
        let mut guard = self.data.write();
        if let Some(entry) = guard.get_mut(key) {
            f(entry);
            Some(entry.clone())
        } else {
            None
        }
    }

    /// Transactional upsert keyed by identity.
    ///
    /// Runs entirely under one write lock: if the key exists, `merge` is
    /// applied to the stored record with the incoming value; otherwise the
    /// incoming value is inserted as-is. Concurrent upserts of the same
    /// key serialize. Returns the stored record.
    pub fn upsert(&self, key: K, value: V, merge: impl FnOnce(&mut V, V)) -> V {
        let mut guard = self.data.write();
        match guard.entry(key) {
            std::collections::btree_map::Entry::Occupied(mut occupied) => {
                merge(occupied.get_mut(), value);
                occupied.get().clone()
            }
            std::collections::btree_map::Entry::Vacant(vacant) => vacant.insert(value).clone(),
        }
    }

    /// Atomically read-validate-update a record.
    ///
    /// The closure receives a `&mut V` and may inspect the current state,
    /// validate preconditions, mutate the record, and return `Ok(R)` or
    /// `Err(E)`. The entire operation runs under a single write lock,
    /// eliminating TOCTOU races between read and update — this is the
    /// compare-and-set primitive workflow transitions are built on.
    ///
    /// Returns `None` if the record doesn't exist, or `Some(result)` with
    /// the closure's `Result`.
    pub fn try_update<R, E>(
        &self,
        key: &K,
        f: impl FnOnce(&mut V) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.data.write().get_mut(key).map(f)
    }

    /// Remove a record by key.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.data.write().remove(key)
    }

    /// Check if a record exists.
    pub fn contains(&self, key: &K) -> bool {
        self.data.read().contains_key(key)
    }

    /// Return the number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Ord + Clone, V: Clone> Default for Store<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
