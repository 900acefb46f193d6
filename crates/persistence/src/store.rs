// Copyright (C) 2015-2025 The Neo Project.
//
// store.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The key-value backend seam and the in-memory reference backend.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Direction of a seek or prefix scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekDirection {
    /// Ascending key order.
    #[default]
    Forward,
    /// Descending key order.
    Backward,
}

/// The contract a key-value backend implements.
///
/// Keys and values are raw byte strings; the layered cache speaks
/// `StorageKey`/`StorageItem` and translates at this boundary. Backward
/// seeks yield entries with keys `<=` the seek key in descending order;
/// forward seeks yield entries `>=` the seek key ascending. An empty
/// forward seek key yields everything.
pub trait Store: Send + Sync {
    /// Reads a value.
    fn try_get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Returns whether a key exists.
    fn contains(&self, key: &[u8]) -> bool {
        self.try_get(key).is_some()
    }

    /// Writes a value.
    fn put(&self, key: Vec<u8>, value: Vec<u8>);

    /// Removes a key. Removing an absent key is a no-op.
    fn delete(&self, key: &[u8]);

    /// Ordered scan starting at `key` in the given direction.
    fn seek(&self, key: &[u8], direction: SeekDirection) -> Vec<(Vec<u8>, Vec<u8>)>;
}

/// The in-memory reference backend, a `BTreeMap` behind a lock.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of entries currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Store for MemoryStore {
    fn try_get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.read().get(key).cloned()
    }

    fn put(&self, key: Vec<u8>, value: Vec<u8>) {
        self.entries.write().insert(key, value);
    }

    fn delete(&self, key: &[u8]) {
        self.entries.write().remove(key);
    }

    fn seek(&self, key: &[u8], direction: SeekDirection) -> Vec<(Vec<u8>, Vec<u8>)> {
        let entries = self.entries.read();
        match direction {
            SeekDirection::Forward => entries
                .range((Bound::Included(key.to_vec()), Bound::Unbounded))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            SeekDirection::Backward => entries
                .range((Bound::Unbounded, Bound::Included(key.to_vec())))
                .rev()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for b in [1u8, 3, 5, 7] {
            store.put(vec![b], vec![b * 10]);
        }
        store
    }

    #[test]
    fn test_get_put_delete() {
        let store = MemoryStore::new();
        assert!(store.try_get(b"k").is_none());
        store.put(b"k".to_vec(), b"v".to_vec());
        assert_eq!(store.try_get(b"k").unwrap(), b"v");
        assert!(store.contains(b"k"));
        store.delete(b"k");
        assert!(!store.contains(b"k"));
        store.delete(b"k"); // idempotent
    }

    #[test]
    fn test_seek_forward() {
        let store = seeded();
        let found = store.seek(&[3], SeekDirection::Forward);
        let keys: Vec<u8> = found.iter().map(|(k, _)| k[0]).collect();
        assert_eq!(keys, vec![3, 5, 7]);
    }

    #[test]
    fn test_seek_forward_empty_key_yields_all() {
        let store = seeded();
        assert_eq!(store.seek(&[], SeekDirection::Forward).len(), 4);
    }

    #[test]
    fn test_seek_backward() {
        let store = seeded();
        let found = store.seek(&[5], SeekDirection::Backward);
        let keys: Vec<u8> = found.iter().map(|(k, _)| k[0]).collect();
        assert_eq!(keys, vec![5, 3, 1]);
    }

    #[test]
    fn test_seek_backward_between_keys() {
        let store = seeded();
        let found = store.seek(&[4], SeekDirection::Backward);
        let keys: Vec<u8> = found.iter().map(|(k, _)| k[0]).collect();
        assert_eq!(keys, vec![3, 1]);
    }
}
