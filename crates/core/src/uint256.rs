// Copyright (C) 2015-2025 The Neo Project.
//
// uint256.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Implementation of UInt256, a 256-bit unsigned integer.

use crate::{CoreError, CoreResult};
use neo_io::{BinaryWriter, IoResult, MemoryReader, Serializable};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// The length of UInt256 values in bytes.
pub const UINT256_SIZE: usize = 32;

/// Represents a 256-bit unsigned integer, stored little-endian.
///
/// Block and transaction hashes are UInt256 values.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UInt256([u8; UINT256_SIZE]);

impl UInt256 {
    /// The zero value.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Returns whether every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Creates a UInt256 from a little-endian byte slice of exactly 32 bytes.
    pub fn from_bytes(value: &[u8]) -> CoreResult<Self> {
        let array: [u8; UINT256_SIZE] = value.try_into().map_err(|_| {
            CoreError::invalid_format(format!("invalid UInt256 length: {}", value.len()))
        })?;
        Ok(Self(array))
    }

    /// The little-endian byte view.
    pub fn as_bytes(&self) -> &[u8; UINT256_SIZE] {
        &self.0
    }

    /// Copies the little-endian bytes into a vector.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Parses the reversed-hex string form, with or without the `0x` prefix.
    pub fn parse(input: &str) -> CoreResult<Self> {
        let hex_str = input.strip_prefix("0x").unwrap_or(input);
        if hex_str.len() != UINT256_SIZE * 2 {
            return Err(CoreError::invalid_format(format!(
                "invalid UInt256 string length: {}",
                hex_str.len()
            )));
        }
        let mut bytes = hex::decode(hex_str)
            .map_err(|e| CoreError::invalid_format(format!("invalid hex: {e}")))?;
        bytes.reverse();
        Self::from_bytes(&bytes)
    }
}

impl Ord for UInt256 {
    /// Unsigned comparison walking from the most-significant byte down.
    fn cmp(&self, other: &Self) -> Ordering {
        for i in (0..UINT256_SIZE).rev() {
            match self.0[i].cmp(&other.0[i]) {
                Ordering::Equal => continue,
                order => return order,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for UInt256 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for UInt256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut reversed = self.0;
        reversed.reverse();
        write!(f, "0x{}", hex::encode(reversed))
    }
}

impl fmt::Debug for UInt256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UInt256({self})")
    }
}

impl FromStr for UInt256 {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for UInt256 {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UInt256> for String {
    fn from(value: UInt256) -> Self {
        value.to_string()
    }
}

impl From<[u8; UINT256_SIZE]> for UInt256 {
    fn from(value: [u8; UINT256_SIZE]) -> Self {
        Self(value)
    }
}

impl Serializable for UInt256 {
    fn size(&self) -> usize {
        UINT256_SIZE
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_bytes(&self.0);
        Ok(())
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        Ok(Self(reader.read_array::<UINT256_SIZE>()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_length_check() {
        assert!(UInt256::from_bytes(&[0u8; 31]).is_err());
        assert!(UInt256::from_bytes(&[0u8; 33]).is_err());
        assert!(UInt256::from_bytes(&[0u8; 32]).is_ok());
    }

    #[test]
    fn test_string_round_trip() {
        let mut bytes = [0u8; 32];
        bytes[31] = 0xab;
        let value = UInt256::from(bytes);
        assert!(value.to_string().starts_with("0xab"));
        assert_eq!(UInt256::parse(&value.to_string()).unwrap(), value);
    }

    #[test]
    fn test_ordering() {
        let mut a = [0xffu8; 32];
        a[31] = 0;
        let mut b = [0u8; 32];
        b[31] = 1;
        assert!(UInt256::from(a) < UInt256::from(b));
        assert_eq!(UInt256::zero().cmp(&UInt256::zero()), Ordering::Equal);
    }
}
