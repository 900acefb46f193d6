// Copyright (C) 2015-2025 The Neo Project.
//
// storage_key.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Keys into contract storage.

use neo_core::UInt160;
use std::cmp::Ordering;

/// A key in contract storage: the owning contract id plus the key bytes.
///
/// The iteration layout is big-endian id followed by the key bytes, so a
/// lexicographic walk groups keys by contract and orders prefixes
/// naturally within one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    /// The id of the owning contract; negative for native contracts.
    pub id: i32,
    /// The key bytes under that contract.
    pub key: Vec<u8>,
}

impl StorageKey {
    /// Creates a storage key.
    pub fn new(id: i32, key: Vec<u8>) -> Self {
        Self { id, key }
    }

    /// A key consisting of the id and a single prefix byte.
    pub fn from_prefix(id: i32, prefix: u8) -> Self {
        Self::new(id, vec![prefix])
    }

    /// A key of prefix byte followed by a script hash.
    pub fn from_hash(id: i32, prefix: u8, hash: &UInt160) -> Self {
        let mut key = Vec::with_capacity(21);
        key.push(prefix);
        key.extend_from_slice(hash.as_bytes());
        Self::new(id, key)
    }

    /// A key of prefix byte followed by a big-endian u32, preserving
    /// numeric order under lexicographic iteration.
    pub fn from_u32(id: i32, prefix: u8, value: u32) -> Self {
        let mut key = Vec::with_capacity(5);
        key.push(prefix);
        key.extend_from_slice(&value.to_be_bytes());
        Self::new(id, key)
    }

    /// The iteration layout: big-endian id followed by the key bytes.
    pub fn to_array(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.key.len());
        out.extend_from_slice(&self.id.to_be_bytes());
        out.extend_from_slice(&self.key);
        out
    }

    /// Reconstructs a key from its iteration layout.
    pub fn from_array(data: &[u8]) -> Option<Self> {
        if data.len() < 4 {
            return None;
        }
        let id = i32::from_be_bytes(data[..4].try_into().ok()?);
        Some(Self::new(id, data[4..].to_vec()))
    }

    /// Whether the iteration layout of this key starts with `prefix`.
    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.to_array().starts_with(prefix)
    }
}

impl Ord for StorageKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_array().cmp(&other.to_array())
    }
}

impl PartialOrd for StorageKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_round_trip() {
        let key = StorageKey::new(-5, vec![0x14, 1, 2, 3]);
        let bytes = key.to_array();
        assert_eq!(StorageKey::from_array(&bytes).unwrap(), key);
        assert_eq!(&bytes[..4], &(-5i32).to_be_bytes());
    }

    #[test]
    fn test_ordering_groups_by_contract() {
        // Big-endian ids keep contract regions contiguous for ids of the
        // same sign; suffix order decides within a contract.
        let a = StorageKey::new(1, vec![0x01]);
        let b = StorageKey::new(1, vec![0x02]);
        let c = StorageKey::new(2, vec![0x00]);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_from_u32_preserves_numeric_order() {
        let low = StorageKey::from_u32(3, 0x0c, 255);
        let high = StorageKey::from_u32(3, 0x0c, 256);
        assert!(low < high);
    }

    #[test]
    fn test_from_array_rejects_short() {
        assert!(StorageKey::from_array(&[1, 2, 3]).is_none());
    }
}
