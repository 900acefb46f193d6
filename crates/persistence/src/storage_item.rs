// Copyright (C) 2015-2025 The Neo Project.
//
// storage_item.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Values in contract storage.

use num_bigint::{BigInt, Sign};

/// An opaque byte value in contract storage.
///
/// Many native-contract entries are integers; the BigInt views use the
/// minimal little-endian two's-complement form the VM uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageItem {
    value: Vec<u8>,
}

impl StorageItem {
    /// Creates an item holding `value`.
    pub fn new(value: Vec<u8>) -> Self {
        Self { value }
    }

    /// Creates an item holding the minimal encoding of `value`.
    pub fn from_int(value: &BigInt) -> Self {
        Self {
            value: encode_bigint(value),
        }
    }

    /// The raw bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Replaces the raw bytes.
    pub fn set_value(&mut self, value: Vec<u8>) {
        self.value = value;
    }

    /// Consumes the item, returning the bytes.
    pub fn into_value(self) -> Vec<u8> {
        self.value
    }

    /// Interprets the bytes as a little-endian signed integer.
    pub fn as_int(&self) -> BigInt {
        decode_bigint(&self.value)
    }

    /// Adds `delta` to the integer view, storing the minimal encoding back.
    pub fn add_int(&mut self, delta: &BigInt) {
        let sum = self.as_int() + delta;
        self.value = encode_bigint(&sum);
    }

    /// The storage size of the item in bytes.
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// Returns whether the item is empty.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl From<Vec<u8>> for StorageItem {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

impl From<&BigInt> for StorageItem {
    fn from(value: &BigInt) -> Self {
        Self::from_int(value)
    }
}

/// Minimal little-endian two's-complement encoding, empty for zero.
fn encode_bigint(value: &BigInt) -> Vec<u8> {
    if value.sign() == Sign::NoSign {
        return Vec::new();
    }
    value.to_signed_bytes_le()
}

fn decode_bigint(data: &[u8]) -> BigInt {
    if data.is_empty() {
        return BigInt::from(0);
    }
    BigInt::from_signed_bytes_le(data)
}
