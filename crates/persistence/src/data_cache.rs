// Copyright (C) 2015-2025 The Neo Project.
//
// data_cache.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The layered, copy-on-write cache over a store or over another cache.

use crate::storage_item::StorageItem;
use crate::storage_key::StorageKey;
use crate::store::{SeekDirection, Store};
use crate::track_state::{TrackState, Trackable};
use crate::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

enum Backing {
    /// No lower layer; commit folds changes into this cache.
    None,
    /// A raw key-value backend.
    Store(Arc<dyn Store>),
    /// A parent cache; commit replays into it.
    Cache(Arc<DataCache>),
}

/// A copy-on-write overlay with change tracking.
///
/// Reads fall through to the backing layer and are recorded locally with
/// state `None`; writes stay local until [`DataCache::commit`] replays
/// them downward. Cloning with [`DataCache::clone_cache`] stacks another
/// layer on top. All operations serialize on an internal lock; iteration
/// collects its snapshot under that lock.
pub struct DataCache {
    inner: Mutex<HashMap<StorageKey, Trackable>>,
    backing: Backing,
}

impl DataCache {
    /// Creates a free-standing cache with no backing layer.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            backing: Backing::None,
        }
    }

    /// Creates a cache over a key-value backend.
    pub fn with_store(store: Arc<dyn Store>) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            backing: Backing::Store(store),
        }
    }

    /// Creates a child cache that commits into `self`.
    pub fn clone_cache(self: &Arc<Self>) -> DataCache {
        DataCache {
            inner: Mutex::new(HashMap::new()),
            backing: Backing::Cache(Arc::clone(self)),
        }
    }

    fn backing_get(&self, key: &StorageKey) -> Option<StorageItem> {
        match &self.backing {
            Backing::None => None,
            Backing::Store(store) => store.try_get(&key.to_array()).map(StorageItem::new),
            Backing::Cache(parent) => parent.try_get(key),
        }
    }

    fn backing_contains(&self, key: &StorageKey) -> bool {
        match &self.backing {
            Backing::None => false,
            Backing::Store(store) => store.contains(&key.to_array()),
            Backing::Cache(parent) => parent.contains(key),
        }
    }

    fn backing_seek(
        &self,
        key: &[u8],
        direction: SeekDirection,
    ) -> Vec<(StorageKey, StorageItem)> {
        match &self.backing {
            Backing::None => Vec::new(),
            Backing::Store(store) => store
                .seek(key, direction)
                .iter()
                .filter_map(|(k, v)| {
                    StorageKey::from_array(k).map(|key| (key, StorageItem::new(v.clone())))
                })
                .collect(),
            Backing::Cache(parent) => parent.seek(key, direction),
        }
    }

    /// Reads an item, loading it through from the backing layer on first
    /// access.
    pub fn try_get(&self, key: &StorageKey) -> Option<StorageItem> {
        {
            let inner = self.inner.lock();
            if let Some(trackable) = inner.get(key) {
                if trackable.state.is_erased() {
                    return None;
                }
                return Some(trackable.item.clone());
            }
        }
        let item = self.backing_get(key)?;
        let mut inner = self.inner.lock();
        // Another reader may have raced the load; keep whichever landed.
        inner
            .entry(key.clone())
            .or_insert_with(|| Trackable::new(item.clone(), TrackState::None));
        Some(item)
    }

    /// Reads an item, failing if it does not exist.
    pub fn get(&self, key: &StorageKey) -> StorageResult<StorageItem> {
        self.try_get(key).ok_or(StorageError::NotFound)
    }

    /// Returns whether a key exists, without loading the item locally.
    pub fn contains(&self, key: &StorageKey) -> bool {
        {
            let inner = self.inner.lock();
            if let Some(trackable) = inner.get(key) {
                return !trackable.state.is_erased();
            }
        }
        self.backing_contains(key)
    }

    /// Creates an entry that must not already exist in this layer.
    pub fn add(&self, key: StorageKey, item: StorageItem) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        if let Some(trackable) = inner.get_mut(&key) {
            return match trackable.state {
                TrackState::Deleted => {
                    trackable.item = item;
                    trackable.state = TrackState::Changed;
                    Ok(())
                }
                TrackState::NotFound => {
                    trackable.item = item;
                    trackable.state = TrackState::Added;
                    Ok(())
                }
                state => Err(StorageError::AlreadyExists {
                    state: state.name(),
                }),
            };
        }
        inner.insert(key, Trackable::new(item, TrackState::Added));
        Ok(())
    }

    /// Deletes an entry. Deleting an absent key is a no-op.
    pub fn delete(&self, key: &StorageKey) {
        let mut inner = self.inner.lock();
        if let Some(trackable) = inner.get_mut(key) {
            match trackable.state {
                TrackState::Added => trackable.state = TrackState::NotFound,
                TrackState::None | TrackState::Changed => trackable.state = TrackState::Deleted,
                TrackState::Deleted | TrackState::NotFound => {}
            }
            return;
        }
        drop(inner);
        if let Some(item) = self.backing_get(key) {
            let mut inner = self.inner.lock();
            inner
                .entry(key.clone())
                .or_insert_with(|| Trackable::new(item, TrackState::None))
                .state = TrackState::Deleted;
        }
    }

    /// Upserts an entry, recording the appropriate state transition.
    pub fn put(&self, key: StorageKey, item: StorageItem) {
        let mut inner = self.inner.lock();
        if let Some(trackable) = inner.get_mut(&key) {
            trackable.item = item;
            trackable.state = match trackable.state {
                TrackState::Added | TrackState::NotFound => TrackState::Added,
                _ => TrackState::Changed,
            };
            return;
        }
        drop(inner);
        let state = if self.backing_contains(&key) {
            TrackState::Changed
        } else {
            TrackState::Added
        };
        self.inner
            .lock()
            .insert(key, Trackable::new(item, state));
    }

    /// Loads or creates an entry, marks it dirty, and edits it in place.
    ///
    /// With no factory, a missing key fails with `NotFound`.
    pub fn get_and_change<R>(
        &self,
        key: &StorageKey,
        factory: Option<&dyn Fn() -> StorageItem>,
        mutate: impl FnOnce(&mut StorageItem) -> R,
    ) -> StorageResult<R> {
        // Resolve the backing read before taking the lock for the edit.
        let backing_item = {
            let inner = self.inner.lock();
            if inner.contains_key(key) {
                None
            } else {
                drop(inner);
                self.backing_get(key)
            }
        };

        let mut inner = self.inner.lock();
        if !inner.contains_key(key) {
            let (item, state) = match backing_item {
                Some(item) => (item, TrackState::Changed),
                None => {
                    let factory = factory.ok_or(StorageError::NotFound)?;
                    (factory(), TrackState::Added)
                }
            };
            inner.insert(key.clone(), Trackable::new(item, state));
        } else {
            let trackable = inner.get_mut(key).expect("checked above");
            match trackable.state {
                TrackState::Deleted => {
                    let factory = factory.ok_or(StorageError::NotFound)?;
                    trackable.item = factory();
                    trackable.state = TrackState::Changed;
                }
                TrackState::NotFound => {
                    let factory = factory.ok_or(StorageError::NotFound)?;
                    trackable.item = factory();
                    trackable.state = TrackState::Added;
                }
                TrackState::None => trackable.state = TrackState::Changed,
                TrackState::Added | TrackState::Changed => {}
            }
        }
        let trackable = inner.get_mut(key).expect("present by now");
        Ok(mutate(&mut trackable.item))
    }

    /// Loads an entry, creating it when absent; existing entries stay clean.
    pub fn get_or_add(
        &self,
        key: &StorageKey,
        factory: &dyn Fn() -> StorageItem,
    ) -> StorageItem {
        let backing_item = {
            let inner = self.inner.lock();
            if inner.contains_key(key) {
                None
            } else {
                drop(inner);
                self.backing_get(key)
            }
        };

        let mut inner = self.inner.lock();
        if !inner.contains_key(key) {
            let (item, state) = match backing_item {
                Some(item) => (item, TrackState::None),
                None => (factory(), TrackState::Added),
            };
            inner.insert(key.clone(), Trackable::new(item.clone(), state));
            return item;
        }
        let trackable = inner.get_mut(key).expect("checked above");
        match trackable.state {
            TrackState::Deleted => {
                trackable.item = factory();
                trackable.state = TrackState::Changed;
            }
            TrackState::NotFound => {
                trackable.item = factory();
                trackable.state = TrackState::Added;
            }
            _ => {}
        }
        trackable.item.clone()
    }

    /// Ordered scan merging this layer with its backing, starting at `key`.
    ///
    /// Local erased entries hide backing entries with the same key.
    pub fn seek(
        &self,
        key: &[u8],
        direction: SeekDirection,
    ) -> Vec<(StorageKey, StorageItem)> {
        let backing = self.backing_seek(key, direction);

        let inner = self.inner.lock();
        let in_bound = |candidate: &StorageKey| {
            let bytes = candidate.to_array();
            match direction {
                SeekDirection::Forward => bytes.as_slice() >= key,
                SeekDirection::Backward => bytes.as_slice() <= key,
            }
        };

        let mut merged: Vec<(StorageKey, StorageItem)> = backing
            .into_iter()
            .filter(|(k, _)| !inner.contains_key(k))
            .collect();
        for (k, trackable) in inner.iter() {
            if trackable.state.is_erased() || !in_bound(k) {
                continue;
            }
            merged.push((k.clone(), trackable.item.clone()));
        }
        drop(inner);

        match direction {
            SeekDirection::Forward => merged.sort_by(|a, b| a.0.cmp(&b.0)),
            SeekDirection::Backward => merged.sort_by(|a, b| b.0.cmp(&a.0)),
        }
        merged
    }

    /// Scans every entry whose iteration layout starts with `prefix`.
    ///
    /// Backward scans seek from the lexicographic successor of the prefix
    /// and filter; a prefix of all 0xff bytes cannot be advanced past.
    pub fn find(
        &self,
        prefix: &[u8],
        direction: SeekDirection,
    ) -> StorageResult<Vec<(StorageKey, StorageItem)>> {
        let seek_key = match direction {
            SeekDirection::Forward => prefix.to_vec(),
            SeekDirection::Backward => prefix_successor(prefix)?,
        };
        Ok(self
            .seek(&seek_key, direction)
            .into_iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .collect())
    }

    /// Scans every entry of one contract whose key starts with `prefix`.
    pub fn find_prefix(
        &self,
        id: i32,
        prefix: &[u8],
        direction: SeekDirection,
    ) -> StorageResult<Vec<(StorageKey, StorageItem)>> {
        let mut layout = Vec::with_capacity(4 + prefix.len());
        layout.extend_from_slice(&id.to_be_bytes());
        layout.extend_from_slice(prefix);
        self.find(&layout, direction)
    }

    /// Half-open interval scan over the iteration layout.
    pub fn find_range(
        &self,
        start: &[u8],
        end: &[u8],
        direction: SeekDirection,
    ) -> Vec<(StorageKey, StorageItem)> {
        self.seek(start, direction)
            .into_iter()
            .take_while(|(k, _)| {
                let bytes = k.to_array();
                match direction {
                    SeekDirection::Forward => bytes.as_slice() < end,
                    SeekDirection::Backward => bytes.as_slice() > end,
                }
            })
            .collect()
    }

    /// The tracked changes: every entry whose state is Added, Changed or
    /// Deleted.
    pub fn change_set(&self) -> Vec<(StorageKey, Trackable)> {
        self.inner
            .lock()
            .iter()
            .filter(|(_, t)| {
                matches!(
                    t.state,
                    TrackState::Added | TrackState::Changed | TrackState::Deleted
                )
            })
            .map(|(k, t)| (k.clone(), t.clone()))
            .collect()
    }

    /// Replays the tracked changes into the backing layer and resets the
    /// local states to `None`.
    pub fn commit(&self) {
        let mut inner = self.inner.lock();
        for (key, trackable) in inner.iter() {
            match (&self.backing, trackable.state) {
                (Backing::Store(store), TrackState::Added | TrackState::Changed) => {
                    store.put(key.to_array(), trackable.item.value().to_vec());
                }
                (Backing::Store(store), TrackState::Deleted) => {
                    store.delete(&key.to_array());
                }
                (Backing::Cache(parent), TrackState::Added | TrackState::Changed) => {
                    parent.put(key.clone(), trackable.item.clone());
                }
                (Backing::Cache(parent), TrackState::Deleted) => {
                    parent.delete(key);
                }
                _ => {}
            }
        }
        inner.retain(|_, t| !t.state.is_erased());
        for trackable in inner.values_mut() {
            trackable.state = TrackState::None;
        }
    }
}

impl Default for DataCache {
    fn default() -> Self {
        Self::new()
    }
}

/// The smallest byte string lexicographically above every string starting
/// with `prefix`: the last non-0xff byte incremented, the tail dropped.
fn prefix_successor(prefix: &[u8]) -> StorageResult<Vec<u8>> {
    let mut successor = prefix.to_vec();
    while let Some(&last) = successor.last() {
        if last == 0xff {
            successor.pop();
        } else {
            *successor.last_mut().expect("non-empty") = last + 1;
            return Ok(successor);
        }
    }
    Err(StorageError::InvalidPrefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn key(id: i32, k: &[u8]) -> StorageKey {
        StorageKey::new(id, k.to_vec())
    }

    fn item(v: &[u8]) -> StorageItem {
        StorageItem::new(v.to_vec())
    }

    fn store_backed() -> (Arc<MemoryStore>, Arc<DataCache>) {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(DataCache::with_store(store.clone()));
        (store, cache)
    }

    #[test]
    fn test_read_through_records_none_state() {
        let (store, cache) = store_backed();
        store.put(key(1, b"a").to_array(), vec![7]);

        assert_eq!(cache.try_get(&key(1, b"a")).unwrap().value(), &[7]);
        // Read-through entries are not part of the change set.
        assert!(cache.change_set().is_empty());
    }

    #[test]
    fn test_add_conflicts_on_live_states() {
        let cache = Arc::new(DataCache::new());
        cache.add(key(1, b"a"), item(&[1])).unwrap();
        assert!(matches!(
            cache.add(key(1, b"a"), item(&[2])),
            Err(StorageError::AlreadyExists { state: "Added" })
        ));
    }

    #[test]
    fn test_state_transitions_delete_then_add() {
        let (store, cache) = store_backed();
        store.put(key(1, b"a").to_array(), vec![1]);

        cache.delete(&key(1, b"a"));
        assert!(cache.try_get(&key(1, b"a")).is_none());
        assert!(!cache.contains(&key(1, b"a")));

        // Deleted -> re-Add -> Changed with the new value.
        cache.add(key(1, b"a"), item(&[9])).unwrap();
        assert_eq!(cache.try_get(&key(1, b"a")).unwrap().value(), &[9]);
        let change_set = cache.change_set();
        assert_eq!(change_set.len(), 1);
        assert_eq!(change_set[0].1.state, TrackState::Changed);
    }

    #[test]
    fn test_added_then_deleted_is_forgotten() {
        let (store, cache) = store_backed();
        cache.add(key(1, b"x"), item(&[1])).unwrap();
        cache.delete(&key(1, b"x"));
        assert!(cache.try_get(&key(1, b"x")).is_none());

        cache.commit();
        assert!(!store.contains(&key(1, b"x").to_array()));
    }

    #[test]
    fn test_contains_matches_try_get() {
        let (store, cache) = store_backed();
        store.put(key(1, b"a").to_array(), vec![1]);

        for k in [key(1, b"a"), key(1, b"b")] {
            assert_eq!(cache.contains(&k), cache.try_get(&k).is_some());
        }
        cache.delete(&key(1, b"a"));
        assert_eq!(
            cache.contains(&key(1, b"a")),
            cache.try_get(&key(1, b"a")).is_some()
        );
    }

    #[test]
    fn test_commit_writes_last_value() {
        let (store, cache) = store_backed();
        store.put(key(1, b"a").to_array(), vec![1]);
        store.put(key(1, b"b").to_array(), vec![2]);

        cache
            .get_and_change(&key(1, b"a"), None, |it| it.set_value(vec![10]))
            .unwrap();
        cache.delete(&key(1, b"b"));
        cache.add(key(1, b"c"), item(&[3])).unwrap();
        cache.commit();

        assert_eq!(store.try_get(&key(1, b"a").to_array()).unwrap(), vec![10]);
        assert!(!store.contains(&key(1, b"b").to_array()));
        assert_eq!(store.try_get(&key(1, b"c").to_array()).unwrap(), vec![3]);
        // After commit the change set is empty.
        assert!(cache.change_set().is_empty());
    }

    #[test]
    fn test_clone_commit_replays_into_parent() {
        let (store, parent) = store_backed();
        store.put(key(1, b"a").to_array(), vec![1]);

        let child = parent.clone_cache();
        child
            .get_and_change(&key(1, b"a"), None, |it| it.set_value(vec![5]))
            .unwrap();
        child.add(key(1, b"b"), item(&[6])).unwrap();

        // Parent sees nothing until the child commits.
        assert_eq!(parent.try_get(&key(1, b"a")).unwrap().value(), &[1]);
        assert!(parent.try_get(&key(1, b"b")).is_none());

        child.commit();
        assert_eq!(parent.try_get(&key(1, b"a")).unwrap().value(), &[5]);
        assert_eq!(parent.try_get(&key(1, b"b")).unwrap().value(), &[6]);

        // The store only changes when the parent commits in turn.
        assert_eq!(store.try_get(&key(1, b"a").to_array()).unwrap(), vec![1]);
        parent.commit();
        assert_eq!(store.try_get(&key(1, b"a").to_array()).unwrap(), vec![5]);
    }

    #[test]
    fn test_get_and_change_requires_factory_for_missing() {
        let cache = Arc::new(DataCache::new());
        assert!(matches!(
            cache.get_and_change(&key(1, b"m"), None, |_| ()),
            Err(StorageError::NotFound)
        ));
        cache
            .get_and_change(&key(1, b"m"), Some(&|| item(&[1])), |it| {
                it.set_value(vec![2])
            })
            .unwrap();
        assert_eq!(cache.try_get(&key(1, b"m")).unwrap().value(), &[2]);
    }

    #[test]
    fn test_get_or_add_keeps_existing_clean() {
        let (store, cache) = store_backed();
        store.put(key(1, b"a").to_array(), vec![1]);
        let got = cache.get_or_add(&key(1, b"a"), &|| item(&[9]));
        assert_eq!(got.value(), &[1]);
        assert!(cache.change_set().is_empty());

        let created = cache.get_or_add(&key(1, b"n"), &|| item(&[9]));
        assert_eq!(created.value(), &[9]);
        assert_eq!(cache.change_set().len(), 1);
    }

    #[test]
    fn test_find_merges_and_hides_deleted() {
        let (store, cache) = store_backed();
        store.put(key(1, b"a1").to_array(), vec![1]);
        store.put(key(1, b"a2").to_array(), vec![2]);
        store.put(key(2, b"a1").to_array(), vec![3]);

        cache.delete(&key(1, b"a2"));
        cache.add(key(1, b"a3"), item(&[4])).unwrap();

        let prefix = 1i32.to_be_bytes().to_vec();
        let found = cache.find(&prefix, SeekDirection::Forward).unwrap();
        let keys: Vec<&[u8]> = found.iter().map(|(k, _)| k.key.as_slice()).collect();
        assert_eq!(keys, vec![b"a1".as_slice(), b"a3".as_slice()]);
    }

    #[test]
    fn test_find_backward() {
        let (store, cache) = store_backed();
        store.put(key(1, b"a1").to_array(), vec![1]);
        store.put(key(1, b"a2").to_array(), vec![2]);
        cache.add(key(1, b"a3"), item(&[3])).unwrap();

        let mut prefix = 1i32.to_be_bytes().to_vec();
        prefix.push(b'a');
        let found = cache.find(&prefix, SeekDirection::Backward).unwrap();
        let keys: Vec<&[u8]> = found.iter().map(|(k, _)| k.key.as_slice()).collect();
        assert_eq!(
            keys,
            vec![b"a3".as_slice(), b"a2".as_slice(), b"a1".as_slice()]
        );
    }

    #[test]
    fn test_backward_all_ff_prefix_rejected() {
        let cache = Arc::new(DataCache::new());
        assert!(matches!(
            cache.find(&[0xff, 0xff], SeekDirection::Backward),
            Err(StorageError::InvalidPrefix)
        ));
    }

    #[test]
    fn test_prefix_successor_skips_trailing_ff() {
        assert_eq!(prefix_successor(&[1, 0xff]).unwrap(), vec![2]);
        assert_eq!(prefix_successor(&[1, 2]).unwrap(), vec![1, 3]);
        assert!(prefix_successor(&[0xff]).is_err());
    }

    #[test]
    fn test_find_range_half_open() {
        let (store, cache) = store_backed();
        for b in [1u8, 2, 3, 4] {
            store.put(key(1, &[b]).to_array(), vec![b]);
        }
        let start = key(1, &[2]).to_array();
        let end = key(1, &[4]).to_array();
        let found = cache.find_range(&start, &end, SeekDirection::Forward);
        let keys: Vec<u8> = found.iter().map(|(k, _)| k.key[0]).collect();
        assert_eq!(keys, vec![2, 3]);
    }
}
