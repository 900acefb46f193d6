// Copyright (C) 2015-2025 The Neo Project.
//
// extensible.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The extensible payload carrying consensus and other subsystem messages.

use crate::witness::Witness;
use crate::{UInt160, UInt256};
use neo_cryptography::hash::sha256;
use neo_io::serializable::{var_bytes_size, var_int_size};
use neo_io::{BinaryWriter, IoError, IoResult, MemoryReader, Serializable};
use std::sync::OnceLock;

/// The longest category string allowed.
pub const MAX_CATEGORY_LENGTH: usize = 32;

/// The largest payload data accepted.
pub const MAX_PAYLOAD_DATA: usize = 0xffff;

/// A witness-authenticated payload routed by category, valid only within
/// a block-height window.
#[derive(Debug, Clone)]
pub struct ExtensiblePayload {
    /// Routing category, e.g. `dBFT`.
    pub category: String,
    /// First block height the payload is valid at.
    pub valid_block_start: u32,
    /// The payload expires at this height (exclusive).
    pub valid_block_end: u32,
    /// The account whose witness authenticates the payload.
    pub sender: UInt160,
    /// Opaque, category-defined data.
    pub data: Vec<u8>,
    /// The sender's witness.
    pub witness: Witness,
    hash: OnceLock<UInt256>,
}

impl ExtensiblePayload {
    /// Assembles a payload from parts.
    pub fn new(
        category: String,
        valid_block_start: u32,
        valid_block_end: u32,
        sender: UInt160,
        data: Vec<u8>,
        witness: Witness,
    ) -> Self {
        Self {
            category,
            valid_block_start,
            valid_block_end,
            sender,
            data,
            witness,
            hash: OnceLock::new(),
        }
    }

    /// The SHA-256 of the unsigned serialization.
    pub fn hash(&self) -> UInt256 {
        *self.hash.get_or_init(|| {
            let mut writer = BinaryWriter::with_capacity(self.size());
            self.serialize_unsigned(&mut writer)
                .expect("serialization to memory cannot fail");
            UInt256::from(sha256(writer.as_bytes()))
        })
    }

    /// The bytes the sender signs: network magic followed by the hash.
    pub fn sign_data(&self, network: u32) -> Vec<u8> {
        let mut data = Vec::with_capacity(4 + 32);
        data.extend_from_slice(&network.to_le_bytes());
        data.extend_from_slice(self.hash().as_bytes());
        data
    }

    /// Writes the witness-free portion.
    pub fn serialize_unsigned(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_var_string(&self.category);
        writer.write_u32(self.valid_block_start);
        writer.write_u32(self.valid_block_end);
        self.sender.serialize(writer)?;
        writer.write_var_bytes(&self.data);
        Ok(())
    }
}

impl PartialEq for ExtensiblePayload {
    fn eq(&self, other: &Self) -> bool {
        self.hash() == other.hash()
    }
}

impl Eq for ExtensiblePayload {}

impl Serializable for ExtensiblePayload {
    fn size(&self) -> usize {
        var_int_size(self.category.len() as u64)
            + self.category.len()
            + 4
            + 4
            + 20
            + var_bytes_size(&self.data)
            + 1
            + self.witness.size()
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.serialize_unsigned(writer)?;
        writer.write_var_int(1);
        self.witness.serialize(writer)?;
        Ok(())
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let category = reader.read_var_string(MAX_CATEGORY_LENGTH)?;
        let valid_block_start = reader.read_u32()?;
        let valid_block_end = reader.read_u32()?;
        if valid_block_start >= valid_block_end {
            return Err(IoError::format(
                "ExtensiblePayload",
                "empty validity window",
            ));
        }
        let sender = UInt160::deserialize(reader)?;
        let data = reader.read_var_bytes(MAX_PAYLOAD_DATA)?;
        let witness_count = reader.read_var_int(1)?;
        if witness_count != 1 {
            return Err(IoError::format(
                "ExtensiblePayload",
                format!("expected 1 witness, got {witness_count}"),
            ));
        }
        let witness = Witness::deserialize(reader)?;
        Ok(Self {
            category,
            valid_block_start,
            valid_block_end,
            sender,
            data,
            witness,
            hash: OnceLock::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let payload = ExtensiblePayload::new(
            "dBFT".into(),
            10,
            20,
            UInt160::from([3u8; 20]),
            vec![1, 2, 3],
            Witness::new(vec![7], vec![8]),
        );
        let decoded = ExtensiblePayload::from_bytes(&payload.to_array()).unwrap();
        assert_eq!(decoded.hash(), payload.hash());
        assert_eq!(payload.to_array().len(), payload.size());
    }

    #[test]
    fn test_rejects_empty_window() {
        let payload = ExtensiblePayload::new(
            "dBFT".into(),
            20,
            20,
            UInt160::zero(),
            vec![],
            Witness::empty(),
        );
        assert!(ExtensiblePayload::from_bytes(&payload.to_array()).is_err());
    }
}
