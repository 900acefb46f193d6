// Copyright (C) 2015-2025 The Neo Project.
//
// block.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Block headers and blocks.

use crate::transaction::Transaction;
use crate::witness::Witness;
use crate::{UInt160, UInt256};
use neo_config::MAX_TRANSACTIONS_PER_BLOCK;
use neo_cryptography::hash::sha256;
use neo_cryptography::merkle::merkle_root;
use neo_io::serializable::vec_size;
use neo_io::{BinaryWriter, IoError, IoResult, MemoryReader, Serializable};
use std::sync::OnceLock;

/// The only block version currently defined.
pub const BLOCK_VERSION: u32 = 0;

/// A block header.
#[derive(Debug, Clone)]
pub struct Header {
    /// The block version.
    pub version: u32,
    /// The hash of the previous block.
    pub prev_hash: UInt256,
    /// The merkle root over the transaction hashes.
    pub merkle_root: UInt256,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Random value thrown in by the primary.
    pub nonce: u64,
    /// The block height.
    pub index: u32,
    /// The consensus seat that proposed the block.
    pub primary_index: u8,
    /// The script hash of the next round's consensus address.
    pub next_consensus: UInt160,
    /// The multi-signature witness of the consensus nodes.
    pub witness: Witness,
    hash: OnceLock<UInt256>,
}

impl PartialEq for Header {
    fn eq(&self, other: &Self) -> bool {
        self.hash() == other.hash()
    }
}

impl Eq for Header {}

impl Header {
    /// Assembles a header from parts.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        version: u32,
        prev_hash: UInt256,
        merkle_root: UInt256,
        timestamp: u64,
        nonce: u64,
        index: u32,
        primary_index: u8,
        next_consensus: UInt160,
        witness: Witness,
    ) -> Self {
        Self {
            version,
            prev_hash,
            merkle_root,
            timestamp,
            nonce,
            index,
            primary_index,
            next_consensus,
            witness,
            hash: OnceLock::new(),
        }
    }

    /// The SHA-256 of the unsigned serialization, cached.
    pub fn hash(&self) -> UInt256 {
        *self.hash.get_or_init(|| {
            let mut writer = BinaryWriter::with_capacity(self.size());
            self.serialize_unsigned(&mut writer)
                .expect("serialization to memory cannot fail");
            UInt256::from(sha256(writer.as_bytes()))
        })
    }

    /// The bytes the consensus nodes sign: network magic followed by the hash.
    pub fn sign_data(&self, network: u32) -> Vec<u8> {
        let mut data = Vec::with_capacity(4 + 32);
        data.extend_from_slice(&network.to_le_bytes());
        data.extend_from_slice(self.hash().as_bytes());
        data
    }

    /// Writes the witness-free portion, the input of the hash.
    pub fn serialize_unsigned(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u32(self.version);
        self.prev_hash.serialize(writer)?;
        self.merkle_root.serialize(writer)?;
        writer.write_u64(self.timestamp);
        writer.write_u64(self.nonce);
        writer.write_u32(self.index);
        writer.write_byte(self.primary_index);
        self.next_consensus.serialize(writer)?;
        Ok(())
    }

    fn deserialize_unsigned(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let version = reader.read_u32()?;
        if version != BLOCK_VERSION {
            return Err(IoError::format(
                "Header",
                format!("unsupported version {version}"),
            ));
        }
        Ok(Self {
            version,
            prev_hash: UInt256::deserialize(reader)?,
            merkle_root: UInt256::deserialize(reader)?,
            timestamp: reader.read_u64()?,
            nonce: reader.read_u64()?,
            index: reader.read_u32()?,
            primary_index: reader.read_byte()?,
            next_consensus: UInt160::deserialize(reader)?,
            witness: Witness::empty(),
            hash: OnceLock::new(),
        })
    }
}

impl Serializable for Header {
    fn size(&self) -> usize {
        4 + 32 + 32 + 8 + 8 + 4 + 1 + 20 + 1 + self.witness.size()
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.serialize_unsigned(writer)?;
        // Headers always carry exactly one witness on the wire.
        writer.write_var_int(1);
        self.witness.serialize(writer)?;
        Ok(())
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let mut header = Self::deserialize_unsigned(reader)?;
        let witness_count = reader.read_var_int(1)?;
        if witness_count != 1 {
            return Err(IoError::format(
                "Header",
                format!("expected 1 witness, got {witness_count}"),
            ));
        }
        header.witness = Witness::deserialize(reader)?;
        Ok(header)
    }
}

/// A block: a header plus its transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// The header.
    pub header: Header,
    /// The transactions, in application order.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Creates a block.
    pub fn new(header: Header, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
        }
    }

    /// The block hash, the header hash.
    pub fn hash(&self) -> UInt256 {
        self.header.hash()
    }

    /// The block height.
    pub fn index(&self) -> u32 {
        self.header.index
    }

    /// Recomputes the merkle root over the transaction hashes.
    pub fn compute_merkle_root(&self) -> UInt256 {
        let leaves: Vec<[u8; 32]> = self
            .transactions
            .iter()
            .map(|tx| *tx.hash().as_bytes())
            .collect();
        UInt256::from(merkle_root(&leaves))
    }
}

impl Serializable for Block {
    fn size(&self) -> usize {
        self.header.size() + vec_size(&self.transactions)
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.header.serialize(writer)?;
        neo_io::serializable::serialize_vec(&self.transactions, writer)
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let header = Header::deserialize(reader)?;
        let transactions: Vec<Transaction> =
            neo_io::serializable::deserialize_vec(reader, MAX_TRANSACTIONS_PER_BLOCK as usize)?;
        let block = Self {
            header,
            transactions,
        };
        if block.compute_merkle_root() != block.header.merkle_root {
            return Err(IoError::format("Block", "merkle root mismatch"));
        }
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::Signer;

    fn sample_header() -> Header {
        Header::new(
            BLOCK_VERSION,
            UInt256::from([1u8; 32]),
            UInt256::zero(),
            1_600_000_000_000,
            7,
            5,
            0,
            UInt160::from([2u8; 20]),
            Witness::new(vec![9], vec![8]),
        )
    }

    fn sample_tx() -> Transaction {
        Transaction::new(
            1,
            0,
            0,
            100,
            vec![Signer::called_by_entry(UInt160::zero())],
            vec![],
            vec![0x40],
            vec![Witness::empty()],
        )
    }

    #[test]
    fn test_header_round_trip() {
        let header = sample_header();
        let decoded = Header::from_bytes(&header.to_array()).unwrap();
        assert_eq!(decoded.hash(), header.hash());
        assert_eq!(header.to_array().len(), header.size());
    }

    #[test]
    fn test_header_hash_excludes_witness() {
        let mut a = sample_header();
        a.witness = Witness::empty();
        let b = sample_header();
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_block_round_trip_checks_merkle() {
        let tx = sample_tx();
        let mut header = sample_header();
        header.merkle_root = UInt256::from(*tx.hash().as_bytes());
        let block = Block::new(header, vec![tx]);
        let decoded = Block::from_bytes(&block.to_array()).unwrap();
        assert_eq!(decoded.hash(), block.hash());
        assert_eq!(decoded.transactions.len(), 1);
    }

    #[test]
    fn test_block_rejects_bad_merkle_root() {
        let block = Block::new(sample_header(), vec![sample_tx()]);
        // Header claims a zero merkle root over one transaction.
        assert!(Block::from_bytes(&block.to_array()).is_err());
    }

    #[test]
    fn test_empty_block_merkle_is_zero() {
        let block = Block::new(sample_header(), vec![]);
        assert!(block.compute_merkle_root().is_zero());
    }
}
