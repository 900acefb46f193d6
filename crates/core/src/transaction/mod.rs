// Copyright (C) 2015-2025 The Neo Project.
//
// mod.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The transaction type and its canonical encoding.

pub mod attributes;

pub use attributes::{OracleResponseCode, TransactionAttribute, ORACLE_RESPONSE_FIXED_FEE};

use crate::signer::Signer;
use crate::witness::Witness;
use crate::{UInt160, UInt256};
use neo_config::{MAX_SCRIPT_LENGTH, MAX_TRANSACTION_ATTRIBUTES, MAX_TRANSACTION_SIZE};
use neo_cryptography::hash::sha256;
use neo_io::serializable::{var_bytes_size, vec_size};
use neo_io::{BinaryWriter, IoError, IoResult, MemoryReader, Serializable};
use std::collections::HashSet;
use std::sync::OnceLock;

/// The only transaction version currently defined.
pub const TRANSACTION_VERSION: u8 = 0;

/// The fixed header length of a serialized transaction:
/// version, nonce, system fee, network fee, valid-until-block.
pub const TRANSACTION_HEADER_SIZE: usize = 1 + 4 + 8 + 8 + 4;

/// A Neo transaction.
///
/// The hash is the SHA-256 of the unsigned serialization and is computed
/// lazily; mutating a transaction after hashing is a logic error, so all
/// fields stay private to this module once constructed through
/// [`Transaction::new`] or deserialization.
#[derive(Debug, Clone)]
pub struct Transaction {
    version: u8,
    nonce: u32,
    system_fee: i64,
    network_fee: i64,
    valid_until_block: u32,
    signers: Vec<Signer>,
    attributes: Vec<TransactionAttribute>,
    script: Vec<u8>,
    witnesses: Vec<Witness>,
    hash: OnceLock<UInt256>,
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.hash() == other.hash()
    }
}

impl Eq for Transaction {}

impl Transaction {
    /// Assembles a transaction from parts, without validating counts; the
    /// wire decoder is the validating entry point.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        nonce: u32,
        system_fee: i64,
        network_fee: i64,
        valid_until_block: u32,
        signers: Vec<Signer>,
        attributes: Vec<TransactionAttribute>,
        script: Vec<u8>,
        witnesses: Vec<Witness>,
    ) -> Self {
        Self {
            version: TRANSACTION_VERSION,
            nonce,
            system_fee,
            network_fee,
            valid_until_block,
            signers,
            attributes,
            script,
            witnesses,
            hash: OnceLock::new(),
        }
    }

    /// The transaction version.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// The anti-replay nonce.
    pub fn nonce(&self) -> u32 {
        self.nonce
    }

    /// The fee burned for script execution, in datoshi.
    pub fn system_fee(&self) -> i64 {
        self.system_fee
    }

    /// The fee paid for size and verification, in datoshi.
    pub fn network_fee(&self) -> i64 {
        self.network_fee
    }

    /// The last block height this transaction may enter.
    pub fn valid_until_block(&self) -> u32 {
        self.valid_until_block
    }

    /// The signers, the first being the sender.
    pub fn signers(&self) -> &[Signer] {
        &self.signers
    }

    /// The attributes.
    pub fn attributes(&self) -> &[TransactionAttribute] {
        &self.attributes
    }

    /// The execution script.
    pub fn script(&self) -> &[u8] {
        &self.script
    }

    /// One witness per signer, in signer order.
    pub fn witnesses(&self) -> &[Witness] {
        &self.witnesses
    }

    /// Replaces the witnesses, e.g. after signing.
    pub fn set_witnesses(&mut self, witnesses: Vec<Witness>) {
        self.witnesses = witnesses;
    }

    /// The account paying the fees: the first signer.
    pub fn sender(&self) -> UInt160 {
        self.signers
            .first()
            .map(|s| s.account)
            .unwrap_or_else(UInt160::zero)
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

    /// The bytes signed by each witness: network magic followed by the hash.
    pub fn sign_data(&self, network: u32) -> Vec<u8> {
        let mut data = Vec::with_capacity(4 + 32);
        data.extend_from_slice(&network.to_le_bytes());
        data.extend_from_slice(self.hash().as_bytes());
        data
    }

    /// Network fee divided by size, the primary pool ordering key.
    pub fn fee_per_byte(&self) -> i64 {
        let size = self.size() as i64;
        if size == 0 {
            0
        } else {
            self.network_fee / size
        }
    }

    /// The attributes of one concrete kind.
    pub fn get_attributes<'a>(
        &'a self,
        attribute_type: u8,
    ) -> impl Iterator<Item = &'a TransactionAttribute> {
        self.attributes
            .iter()
            .filter(move |a| a.attribute_type() == attribute_type)
    }

    /// Writes the unsigned portion, the input of both hash and signatures.
    pub fn serialize_unsigned(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_byte(self.version);
        writer.write_u32(self.nonce);
        writer.write_i64(self.system_fee);
        writer.write_i64(self.network_fee);
        writer.write_u32(self.valid_until_block);
        neo_io::serializable::serialize_vec(&self.signers, writer)?;
        neo_io::serializable::serialize_vec(&self.attributes, writer)?;
        writer.write_var_bytes(&self.script);
        Ok(())
    }

    fn deserialize_unsigned(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let version = reader.read_byte()?;
        if version != TRANSACTION_VERSION {
            return Err(IoError::format(
                "Transaction",
                format!("unsupported version {version}"),
            ));
        }
        let nonce = reader.read_u32()?;
        let system_fee = reader.read_i64()?;
        if system_fee < 0 {
            return Err(IoError::format("Transaction", "negative system fee"));
        }
        let network_fee = reader.read_i64()?;
        if network_fee < 0 {
            return Err(IoError::format("Transaction", "negative network fee"));
        }
        if system_fee.checked_add(network_fee).is_none() {
            return Err(IoError::format("Transaction", "fee overflow"));
        }
        let valid_until_block = reader.read_u32()?;
        let signers = Self::deserialize_signers(reader)?;
        let attributes = Self::deserialize_attributes(reader, signers.len())?;
        let script = reader.read_var_bytes(MAX_SCRIPT_LENGTH)?;
        if script.is_empty() {
            return Err(IoError::format("Transaction", "empty script"));
        }

        Ok(Self {
            version,
            nonce,
            system_fee,
            network_fee,
            valid_until_block,
            signers,
            attributes,
            script,
            witnesses: Vec::new(),
            hash: OnceLock::new(),
        })
    }

    fn deserialize_signers(reader: &mut MemoryReader<'_>) -> IoResult<Vec<Signer>> {
        let count = reader.read_var_int(MAX_TRANSACTION_ATTRIBUTES as u64)? as usize;
        if count == 0 {
            return Err(IoError::format("Transaction", "no signers"));
        }
        let mut signers = Vec::with_capacity(count);
        let mut seen = HashSet::with_capacity(count);
        for _ in 0..count {
            let signer = Signer::deserialize(reader)?;
            if !seen.insert(signer.account) {
                return Err(IoError::format("Transaction", "duplicate signer"));
            }
            signers.push(signer);
        }
        Ok(signers)
    }

    fn deserialize_attributes(
        reader: &mut MemoryReader<'_>,
        signer_count: usize,
    ) -> IoResult<Vec<TransactionAttribute>> {
        let max = MAX_TRANSACTION_ATTRIBUTES - signer_count;
        let count = reader.read_var_int(max as u64)? as usize;
        let mut attributes: Vec<TransactionAttribute> = Vec::with_capacity(count);
        for _ in 0..count {
            let attribute = TransactionAttribute::deserialize(reader)?;
            if !attribute.allow_multiple()
                && attributes
                    .iter()
                    .any(|a| a.attribute_type() == attribute.attribute_type())
            {
                return Err(IoError::format(
                    "Transaction",
                    format!(
                        "duplicate attribute type 0x{:02x}",
                        attribute.attribute_type()
                    ),
                ));
            }
            attributes.push(attribute);
        }
        Ok(attributes)
    }
}

impl Serializable for Transaction {
    fn size(&self) -> usize {
        TRANSACTION_HEADER_SIZE
            + vec_size(&self.signers)
            + vec_size(&self.attributes)
            + var_bytes_size(&self.script)
            + vec_size(&self.witnesses)
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.serialize_unsigned(writer)?;
        neo_io::serializable::serialize_vec(&self.witnesses, writer)?;
        Ok(())
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let mut tx = Self::deserialize_unsigned(reader)?;
        let witnesses: Vec<Witness> =
            neo_io::serializable::deserialize_vec(reader, tx.signers.len())?;
        if witnesses.len() != tx.signers.len() {
            return Err(IoError::format(
                "Transaction",
                format!(
                    "{} witnesses for {} signers",
                    witnesses.len(),
                    tx.signers.len()
                ),
            ));
        }
        tx.witnesses = witnesses;
        if tx.size() > MAX_TRANSACTION_SIZE {
            return Err(IoError::format("Transaction", "transaction too large"));
        }
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::WitnessScope;

    fn sample_tx() -> Transaction {
        Transaction::new(
            42,
            100,
            200,
            1000,
            vec![Signer::called_by_entry(UInt160::from([1u8; 20]))],
            vec![TransactionAttribute::HighPriority],
            vec![0x40], // RET
            vec![Witness::empty()],
        )
    }

    #[test]
    fn test_round_trip() {
        let tx = sample_tx();
        let decoded = Transaction::from_bytes(&tx.to_array()).unwrap();
        assert_eq!(decoded.hash(), tx.hash());
        assert_eq!(decoded.size(), tx.size());
        assert_eq!(decoded.to_array(), tx.to_array());
    }

    #[test]
    fn test_hash_ignores_witnesses() {
        let mut tx = sample_tx();
        let hash_before = tx.hash();
        tx.set_witnesses(vec![Witness::new(vec![1, 2, 3], vec![4, 5, 6])]);
        // A fresh decode of the re-witnessed bytes hashes identically.
        let decoded = Transaction::from_bytes(&tx.to_array()).unwrap();
        assert_eq!(decoded.hash(), hash_before);
    }

    #[test]
    fn test_sender_is_first_signer() {
        let tx = sample_tx();
        assert_eq!(tx.sender(), UInt160::from([1u8; 20]));
    }

    #[test]
    fn test_rejects_zero_signers() {
        let tx = Transaction::new(0, 0, 0, 0, vec![], vec![], vec![0x40], vec![]);
        assert!(Transaction::from_bytes(&tx.to_array()).is_err());
    }

    #[test]
    fn test_rejects_seventeen_signers() {
        let signers: Vec<Signer> = (0u8..17)
            .map(|i| Signer::new(UInt160::from([i; 20]), WitnessScope::NONE))
            .collect();
        let witnesses = vec![Witness::empty(); 17];
        let tx = Transaction::new(0, 0, 0, 0, signers, vec![], vec![0x40], witnesses);
        assert!(Transaction::from_bytes(&tx.to_array()).is_err());
    }

    #[test]
    fn test_rejects_duplicate_signer() {
        let signers = vec![
            Signer::global(UInt160::from([1u8; 20])),
            Signer::called_by_entry(UInt160::from([1u8; 20])),
        ];
        // Global must be alone per signer, but duplication fails first.
        let tx = Transaction::new(
            0,
            0,
            0,
            0,
            signers,
            vec![],
            vec![0x40],
            vec![Witness::empty(), Witness::empty()],
        );
        assert!(Transaction::from_bytes(&tx.to_array()).is_err());
    }

    #[test]
    fn test_rejects_duplicate_single_attribute() {
        let tx = Transaction::new(
            0,
            0,
            0,
            0,
            vec![Signer::called_by_entry(UInt160::zero())],
            vec![
                TransactionAttribute::HighPriority,
                TransactionAttribute::HighPriority,
            ],
            vec![0x40],
            vec![Witness::empty()],
        );
        assert!(Transaction::from_bytes(&tx.to_array()).is_err());
    }

    #[test]
    fn test_allows_multiple_conflicts() {
        let tx = Transaction::new(
            0,
            0,
            0,
            0,
            vec![Signer::called_by_entry(UInt160::zero())],
            vec![
                TransactionAttribute::Conflicts {
                    hash: UInt256::from([1u8; 32]),
                },
                TransactionAttribute::Conflicts {
                    hash: UInt256::from([2u8; 32]),
                },
            ],
            vec![0x40],
            vec![Witness::empty()],
        );
        let decoded = Transaction::from_bytes(&tx.to_array()).unwrap();
        assert_eq!(decoded.attributes().len(), 2);
    }

    #[test]
    fn test_rejects_negative_fees() {
        let mut writer = BinaryWriter::new();
        writer.write_byte(0);
        writer.write_u32(0);
        writer.write_i64(-1);
        writer.write_i64(0);
        writer.write_u32(0);
        let mut bytes = writer.into_bytes();
        bytes.extend_from_slice(&[0u8; 8]);
        assert!(Transaction::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_sign_data_prefixes_network() {
        let tx = sample_tx();
        let data = tx.sign_data(0x4e454f00);
        assert_eq!(&data[..4], &0x4e454f00u32.to_le_bytes());
        assert_eq!(&data[4..], tx.hash().as_bytes());
    }
}
