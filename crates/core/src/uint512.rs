// Copyright (C) 2015-2025 The Neo Project.
//
// uint512.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Implementation of UInt512, a 512-bit unsigned integer.

use crate::{CoreError, CoreResult};
use neo_cryptography::hash::murmur32;
use neo_io::{BinaryWriter, IoResult, MemoryReader, Serializable};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// The length of UInt512 values in bytes.
pub const UINT512_SIZE: usize = 64;

/// Represents a 512-bit unsigned integer as eight little-endian words.
#[derive(Clone, Copy, Default, Eq, PartialEq)]
pub struct UInt512 {
    words: [u64; 8],
}

impl UInt512 {
    /// The zero value.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Returns whether every word is zero.
    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Creates a UInt512 from a little-endian byte slice of exactly 64 bytes.
    pub fn from_bytes(value: &[u8]) -> CoreResult<Self> {
        if value.len() != UINT512_SIZE {
            return Err(CoreError::invalid_format(format!(
                "invalid UInt512 length: {}",
                value.len()
            )));
        }
        let mut words = [0u64; 8];
        for (i, word) in words.iter_mut().enumerate() {
            *word = u64::from_le_bytes(value[i * 8..i * 8 + 8].try_into().expect("slice length"));
        }
        Ok(Self { words })
    }

    /// The canonical little-endian byte representation.
    pub fn to_le_bytes(&self) -> [u8; UINT512_SIZE] {
        let mut out = [0u8; UINT512_SIZE];
        for (i, word) in self.words.iter().enumerate() {
            out[i * 8..i * 8 + 8].copy_from_slice(&word.to_le_bytes());
        }
        out
    }

    /// The little-endian word view.
    pub fn words(&self) -> &[u64; 8] {
        &self.words
    }

    /// Parses the reversed-hex string form, with or without the `0x` prefix.
    pub fn parse(input: &str) -> CoreResult<Self> {
        let hex_str = input.strip_prefix("0x").unwrap_or(input);
        if hex_str.len() != UINT512_SIZE * 2 {
            return Err(CoreError::invalid_format(format!(
                "invalid UInt512 string length: {}",
                hex_str.len()
            )));
        }
        let mut bytes = hex::decode(hex_str)
            .map_err(|e| CoreError::invalid_format(format!("invalid hex: {e}")))?;
        bytes.reverse();
        Self::from_bytes(&bytes)
    }
}

impl Ord for UInt512 {
    /// Unsigned comparison walking from the most-significant word down.
    fn cmp(&self, other: &Self) -> Ordering {
        for i in (0..8).rev() {
            match self.words[i].cmp(&other.words[i]) {
                Ordering::Equal => continue,
                order => return order,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for UInt512 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for UInt512 {
    /// Murmur32 over the canonical little-endian bytes, keeping the hash
    /// code stable across platforms and runs.
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(murmur32(&self.to_le_bytes(), 0));
    }
}

impl fmt::Display for UInt512 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bytes = self.to_le_bytes();
        bytes.reverse();
        write!(f, "0x{}", hex::encode(bytes))
    }
}

impl fmt::Debug for UInt512 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UInt512({self})")
    }
}

impl FromStr for UInt512 {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serializable for UInt512 {
    fn size(&self) -> usize {
        UINT512_SIZE
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_bytes(&self.to_le_bytes());
        Ok(())
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let bytes = reader.read_array::<UINT512_SIZE>()?;
        Ok(Self::from_bytes(&bytes).expect("exact-width slice"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    #[test]
    fn test_rejects_wrong_length() {
        assert!(UInt512::from_bytes(&[0u8; 63]).is_err());
        assert!(UInt512::from_bytes(&[0u8; 65]).is_err());
        assert!(UInt512::from_bytes(&[0u8; 64]).is_ok());
    }

    #[test]
    fn test_byte_round_trip() {
        let mut bytes = [0u8; 64];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        let value = UInt512::from_bytes(&bytes).unwrap();
        assert_eq!(value.to_le_bytes(), bytes);
    }

    #[test]
    fn test_string_round_trip() {
        let mut bytes = [0u8; 64];
        bytes[63] = 0x80;
        let value = UInt512::from_bytes(&bytes).unwrap();
        assert!(value.to_string().starts_with("0x80"));
        assert_eq!(UInt512::parse(&value.to_string()).unwrap(), value);
    }

    #[test]
    fn test_ordering_most_significant_word_first() {
        let mut low = [0u8; 64];
        low[0] = 0xff;
        let mut high = [0u8; 64];
        high[63] = 0x01;
        assert!(UInt512::from_bytes(&low).unwrap() < UInt512::from_bytes(&high).unwrap());
    }

    #[test]
    fn test_hash_is_deterministic() {
        let value = UInt512::from_bytes(&[7u8; 64]).unwrap();
        let mut h1 = DefaultHasher::new();
        let mut h2 = DefaultHasher::new();
        value.hash(&mut h1);
        value.hash(&mut h2);
        assert_eq!(h1.finish(), h2.finish());
    }
}
