//! Interop handles for contract storage access.

use neo_persistence::{StorageItem, StorageKey};
use neo_vm::stack_item::InteropInterface;
use parking_lot::Mutex;

/// A handle to one contract's storage region.
#[derive(Debug, Clone, Copy)]
pub struct StorageContext {
    /// The owning contract's id.
    pub id: i32,
    /// Whether writes through this handle are rejected.
    pub is_read_only: bool,
}

impl InteropInterface for StorageContext {
    fn interface_name(&self) -> &'static str {
        "StorageContext"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Iteration behavior bits for `System.Storage.Find`.
#[derive(Debug, Clone, Copy)]
pub struct FindOptions(pub u8);

impl FindOptions {
    /// No transformation; entries are (key, value) structs.
    pub const NONE: u8 = 0;
    /// Strip the search prefix from returned keys.
    pub const REMOVE_PREFIX: u8 = 1 << 0;
    /// Return keys only.
    pub const KEYS_ONLY: u8 = 1 << 1;
    /// Return values only.
    pub const VALUES_ONLY: u8 = 1 << 2;
    /// Deserialize values as stack items.
    pub const DESERIALIZE_VALUES: u8 = 1 << 3;
    /// Project field 0 of deserialized values.
    pub const PICK_FIELD_0: u8 = 1 << 4;
    /// Project field 1 of deserialized values.
    pub const PICK_FIELD_1: u8 = 1 << 5;
    /// Iterate backwards.
    pub const BACKWARDS: u8 = 1 << 7;

    /// All bits that mean anything.
    pub const ALL: u8 = Self::REMOVE_PREFIX
        | Self::KEYS_ONLY
        | Self::VALUES_ONLY
        | Self::DESERIALIZE_VALUES
        | Self::PICK_FIELD_0
        | Self::PICK_FIELD_1
        | Self::BACKWARDS;

    /// Whether the bit combination is coherent.
    pub fn is_valid(self) -> bool {
        let bits = self.0;
        if bits & !Self::ALL != 0 {
            return false;
        }
        let keys_only = bits & Self::KEYS_ONLY != 0;
        let values_only = bits & Self::VALUES_ONLY != 0;
        if keys_only && values_only {
            return false;
        }
        let picks = bits & (Self::PICK_FIELD_0 | Self::PICK_FIELD_1);
        if picks != 0 && bits & Self::DESERIALIZE_VALUES == 0 {
            return false;
        }
        if picks == (Self::PICK_FIELD_0 | Self::PICK_FIELD_1) {
            return false;
        }
        true
    }

    /// Whether the bit is set.
    pub fn has(self, bit: u8) -> bool {
        self.0 & bit != 0
    }
}

/// A storage iterator handed to scripts by `System.Storage.Find`.
#[derive(Debug)]
pub struct StorageIterator {
    inner: Mutex<IteratorState>,
}

#[derive(Debug)]
struct IteratorState {
    entries: Vec<(StorageKey, StorageItem)>,
    position: Option<usize>,
    prefix_length: usize,
    options: u8,
}

impl StorageIterator {
    /// Creates an iterator over pre-collected entries.
    pub fn new(entries: Vec<(StorageKey, StorageItem)>, prefix_length: usize, options: u8) -> Self {
        Self {
            inner: Mutex::new(IteratorState {
                entries,
                position: None,
                prefix_length,
                options,
            }),
        }
    }

    /// Advances; returns whether an element is available.
    pub fn next(&self) -> bool {
        let mut state = self.inner.lock();
        let next = state.position.map_or(0, |p| p + 1);
        if next < state.entries.len() {
            state.position = Some(next);
            true
        } else {
            state.position = Some(state.entries.len());
            false
        }
    }

    /// The current element, shaped per the find options.
    pub fn value(&self) -> Option<(Vec<u8>, StorageItem, usize, u8)> {
        let state = self.inner.lock();
        let position = state.position?;
        let (key, item) = state.entries.get(position)?;
        let mut key_bytes = key.to_array();
        if FindOptions(state.options).has(FindOptions::REMOVE_PREFIX) {
            key_bytes = key_bytes.split_off(state.prefix_length);
        }
        Some((key_bytes, item.clone(), state.prefix_length, state.options))
    }
}

impl InteropInterface for StorageIterator {
    fn interface_name(&self) -> &'static str {
        "StorageIterator"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_options_validity() {
        assert!(FindOptions(FindOptions::NONE).is_valid());
        assert!(FindOptions(FindOptions::KEYS_ONLY | FindOptions::REMOVE_PREFIX).is_valid());
        assert!(!FindOptions(FindOptions::KEYS_ONLY | FindOptions::VALUES_ONLY).is_valid());
        assert!(!FindOptions(FindOptions::PICK_FIELD_0).is_valid());
        assert!(FindOptions(
            FindOptions::DESERIALIZE_VALUES | FindOptions::PICK_FIELD_0
        )
        .is_valid());
        assert!(!FindOptions(0x40).is_valid());
    }

    #[test]
    fn test_iterator_walks_entries() {
        let entries = vec![
            (StorageKey::new(1, vec![0x01, 0xaa]), StorageItem::new(vec![1])),
            (StorageKey::new(1, vec![0x01, 0xbb]), StorageItem::new(vec![2])),
        ];
        let iterator = StorageIterator::new(entries, 5, FindOptions::REMOVE_PREFIX);
        assert!(iterator.value().is_none());
        assert!(iterator.next());
        let (key, item, _, _) = iterator.value().unwrap();
        assert_eq!(key, vec![0xaa]);
        assert_eq!(item.value(), &[1]);
        assert!(iterator.next());
        assert!(!iterator.next());
        assert!(!iterator.next());
    }
}
