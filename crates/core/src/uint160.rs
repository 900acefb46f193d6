// Copyright (C) 2015-2025 The Neo Project.
//
// uint160.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Implementation of UInt160, a 160-bit unsigned integer.

use crate::{CoreError, CoreResult};
use neo_io::{BinaryWriter, IoResult, MemoryReader, Serializable};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// The length of UInt160 values in bytes.
pub const UINT160_SIZE: usize = 20;

/// Represents a 160-bit unsigned integer, stored little-endian.
///
/// Script hashes and account identifiers are UInt160 values. The string
/// form reverses the byte order and carries a `0x` prefix.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UInt160([u8; UINT160_SIZE]);

impl UInt160 {
    /// The zero value.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Returns whether every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Creates a UInt160 from a little-endian byte slice of exactly 20 bytes.
    pub fn from_bytes(value: &[u8]) -> CoreResult<Self> {
        let array: [u8; UINT160_SIZE] = value.try_into().map_err(|_| {
            CoreError::invalid_format(format!("invalid UInt160 length: {}", value.len()))
        })?;
        Ok(Self(array))
    }

    /// The little-endian byte view.
    pub fn as_bytes(&self) -> &[u8; UINT160_SIZE] {
        &self.0
    }

    /// Copies the little-endian bytes into a vector.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Parses the reversed-hex string form, with or without the `0x` prefix.
    pub fn parse(input: &str) -> CoreResult<Self> {
        let hex_str = input.strip_prefix("0x").unwrap_or(input);
        if hex_str.len() != UINT160_SIZE * 2 {
            return Err(CoreError::invalid_format(format!(
                "invalid UInt160 string length: {}",
                hex_str.len()
            )));
        }
        let mut bytes = hex::decode(hex_str)
            .map_err(|e| CoreError::invalid_format(format!("invalid hex: {e}")))?;
        bytes.reverse();
        Self::from_bytes(&bytes)
    }
}

impl Ord for UInt160 {
    /// Unsigned comparison walking from the most-significant byte down.
    fn cmp(&self, other: &Self) -> Ordering {
        for i in (0..UINT160_SIZE).rev() {
            match self.0[i].cmp(&other.0[i]) {
                Ordering::Equal => continue,
                order => return order,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for UInt160 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for UInt160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut reversed = self.0;
        reversed.reverse();
        write!(f, "0x{}", hex::encode(reversed))
    }
}

impl fmt::Debug for UInt160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UInt160({self})")
    }
}

impl FromStr for UInt160 {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for UInt160 {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UInt160> for String {
    fn from(value: UInt160) -> Self {
        value.to_string()
    }
}

impl From<[u8; UINT160_SIZE]> for UInt160 {
    fn from(value: [u8; UINT160_SIZE]) -> Self {
        Self(value)
    }
}

impl Serializable for UInt160 {
    fn size(&self) -> usize {
        UINT160_SIZE
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_bytes(&self.0);
        Ok(())
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        Ok(Self(reader.read_array::<UINT160_SIZE>()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_length_check() {
        assert!(UInt160::from_bytes(&[0u8; 19]).is_err());
        assert!(UInt160::from_bytes(&[0u8; 21]).is_err());
        assert!(UInt160::from_bytes(&[0u8; 20]).is_ok());
    }

    #[test]
    fn test_string_round_trip() {
        let mut bytes = [0u8; 20];
        bytes[0] = 0x01;
        bytes[19] = 0xff;
        let value = UInt160::from(bytes);
        let text = value.to_string();
        assert!(text.starts_with("0xff"));
        assert_eq!(UInt160::parse(&text).unwrap(), value);
    }

    #[test]
    fn test_ordering_most_significant_first() {
        let mut low = [0u8; 20];
        low[0] = 0xff; // only the least-significant byte set
        let mut high = [0u8; 20];
        high[19] = 0x01; // most-significant byte set
        assert!(UInt160::from(low) < UInt160::from(high));
    }

    #[test]
    fn test_serializable_round_trip() {
        let value = UInt160::from([0xabu8; 20]);
        assert_eq!(UInt160::from_bytes(&value.to_array()).unwrap(), value);
    }
}
