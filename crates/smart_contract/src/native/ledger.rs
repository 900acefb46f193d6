// Copyright (C) 2015-2025 The Neo Project.
//
// ledger.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The Ledger native contract: block and transaction index.

use crate::application_engine::ApplicationEngine;
use crate::key_builder::KeyBuilder;
use crate::native::{NativeContract, NativeMethod};
use crate::{ContractError, ContractResult};
use neo_core::{Block, Header, Transaction, UInt256};
use neo_io::{BinaryWriter, MemoryReader, Serializable};
use neo_persistence::{DataCache, StorageItem};
use neo_vm::{StackItem, VMState};

const PREFIX_BLOCK: u8 = 5;
const PREFIX_BLOCK_HASH: u8 = 9;
const PREFIX_TRANSACTION: u8 = 11;
const PREFIX_CURRENT_BLOCK: u8 = 12;

/// The id of the Ledger contract.
pub const ID: i32 = -4;

/// A stored transaction with its execution outcome.
#[derive(Debug, Clone)]
pub struct TransactionState {
    /// The block the transaction landed in.
    pub block_index: u32,
    /// The VM state its script finished with.
    pub vm_state: VMState,
    /// The transaction itself.
    pub transaction: Transaction,
}

impl TransactionState {
    fn to_bytes(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::new();
        writer.write_u32(self.block_index);
        writer.write_byte(vm_state_byte(self.vm_state));
        writer.write_var_bytes(&self.transaction.to_array());
        writer.into_bytes()
    }

    fn from_bytes(data: &[u8]) -> ContractResult<Self> {
        let mut reader = MemoryReader::new(data);
        let block_index = reader.read_u32()?;
        let vm_state = vm_state_from_byte(reader.read_byte()?)?;
        let tx_bytes = reader.read_var_bytes(neo_config::MAX_TRANSACTION_SIZE)?;
        let transaction = Transaction::from_bytes(&tx_bytes)?;
        Ok(Self {
            block_index,
            vm_state,
            transaction,
        })
    }
}

fn vm_state_byte(state: VMState) -> u8 {
    match state {
        VMState::NONE => 0x00,
        VMState::HALT => 0x01,
        VMState::FAULT => 0x02,
        VMState::BREAK => 0x04,
    }
}

fn vm_state_from_byte(byte: u8) -> ContractResult<VMState> {
    match byte {
        0x00 => Ok(VMState::NONE),
        0x01 => Ok(VMState::HALT),
        0x02 => Ok(VMState::FAULT),
        0x04 => Ok(VMState::BREAK),
        other => Err(ContractError::invalid_operation(format!(
            "invalid vm state byte 0x{other:02x}"
        ))),
    }
}

/// A block stripped to its header and transaction hashes.
#[derive(Debug, Clone)]
pub struct TrimmedBlock {
    /// The full header.
    pub header: Header,
    /// The hashes of the block's transactions.
    pub hashes: Vec<UInt256>,
}

impl TrimmedBlock {
    fn to_bytes(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::new();
        self.header.serialize(&mut writer).expect("memory write");
        neo_io::serializable::serialize_vec(&self.hashes, &mut writer).expect("memory write");
        writer.into_bytes()
    }

    fn from_bytes(data: &[u8]) -> ContractResult<Self> {
        let mut reader = MemoryReader::new(data);
        let header = Header::deserialize(&mut reader)?;
        let hashes = neo_io::serializable::deserialize_vec(
            &mut reader,
            neo_config::MAX_TRANSACTIONS_PER_BLOCK as usize,
        )?;
        Ok(Self { header, hashes })
    }
}

// ---- free read helpers, usable without an engine ----

fn current_block_key() -> neo_persistence::StorageKey {
    KeyBuilder::new(ID, PREFIX_CURRENT_BLOCK).build()
}

/// The stored tip as `(hash, index)`.
pub fn current_hash_and_index(snapshot: &DataCache) -> Option<(UInt256, u32)> {
    let item = snapshot.try_get(&current_block_key())?;
    let mut reader = MemoryReader::new(item.value());
    let hash = UInt256::deserialize(&mut reader).ok()?;
    let index = reader.read_u32().ok()?;
    Some((hash, index))
}

/// The stored tip height.
pub fn current_index(snapshot: &DataCache) -> Option<u32> {
    current_hash_and_index(snapshot).map(|(_, index)| index)
}

/// The stored tip hash.
pub fn current_hash(snapshot: &DataCache) -> Option<UInt256> {
    current_hash_and_index(snapshot).map(|(hash, _)| hash)
}

/// The tip `(hash, index, timestamp)` for dummy-block synthesis.
pub fn current_block_summary(snapshot: &DataCache) -> Option<(UInt256, u32, u64)> {
    let (hash, index) = current_hash_and_index(snapshot)?;
    let block = get_trimmed_block(snapshot, &hash)?;
    Some((hash, index, block.header.timestamp))
}

/// Reads a trimmed block by hash.
pub fn get_trimmed_block(snapshot: &DataCache, hash: &UInt256) -> Option<TrimmedBlock> {
    let key = KeyBuilder::new(ID, PREFIX_BLOCK).add_hash256(hash).build();
    let item = snapshot.try_get(&key)?;
    TrimmedBlock::from_bytes(item.value()).ok()
}

/// Resolves a block hash from a height.
pub fn get_block_hash(snapshot: &DataCache, index: u32) -> Option<UInt256> {
    let key = KeyBuilder::new(ID, PREFIX_BLOCK_HASH).add_u32(index).build();
    let item = snapshot.try_get(&key)?;
    UInt256::from_bytes(item.value()).ok()
}

/// Reads a stored transaction with its state.
pub fn get_transaction_state(snapshot: &DataCache, hash: &UInt256) -> Option<TransactionState> {
    let key = KeyBuilder::new(ID, PREFIX_TRANSACTION)
        .add_hash256(hash)
        .build();
    let item = snapshot.try_get(&key)?;
    TransactionState::from_bytes(item.value()).ok()
}

/// Whether the chain already contains `hash`.
pub fn contains_transaction(snapshot: &DataCache, hash: &UInt256) -> bool {
    let key = KeyBuilder::new(ID, PREFIX_TRANSACTION)
        .add_hash256(hash)
        .build();
    snapshot.contains(&key)
}

/// Writes the persisting block's rows; called from OnPersist.
pub fn store_block(snapshot: &DataCache, block: &Block) {
    let hash = block.hash();
    let trimmed = TrimmedBlock {
        header: block.header.clone(),
        hashes: block.transactions.iter().map(|tx| tx.hash()).collect(),
    };
    snapshot.put(
        KeyBuilder::new(ID, PREFIX_BLOCK).add_hash256(&hash).build(),
        StorageItem::new(trimmed.to_bytes()),
    );
    snapshot.put(
        KeyBuilder::new(ID, PREFIX_BLOCK_HASH)
            .add_u32(block.index())
            .build(),
        StorageItem::new(hash.to_vec()),
    );
    for tx in &block.transactions {
        let state = TransactionState {
            block_index: block.index(),
            vm_state: VMState::NONE,
            transaction: tx.clone(),
        };
        snapshot.put(
            KeyBuilder::new(ID, PREFIX_TRANSACTION)
                .add_hash256(&tx.hash())
                .build(),
            StorageItem::new(state.to_bytes()),
        );
    }
    let mut writer = BinaryWriter::new();
    hash.serialize(&mut writer).expect("memory write");
    writer.write_u32(block.index());
    snapshot.put(current_block_key(), StorageItem::new(writer.into_bytes()));
}

/// Updates a stored transaction's VM state after its script ran.
pub fn update_transaction_state(snapshot: &DataCache, hash: &UInt256, vm_state: VMState) {
    if let Some(mut state) = get_transaction_state(snapshot, hash) {
        state.vm_state = vm_state;
        snapshot.put(
            KeyBuilder::new(ID, PREFIX_TRANSACTION)
                .add_hash256(hash)
                .build(),
            StorageItem::new(state.to_bytes()),
        );
    }
}

/// The Ledger native contract.
pub struct LedgerContract;

static METHODS: &[NativeMethod] = &[
    NativeMethod::safe("currentHash", 0, 1 << 15),
    NativeMethod::safe("currentIndex", 0, 1 << 15),
    NativeMethod::safe("getBlock", 1, 1 << 15),
    NativeMethod::safe("getTransaction", 1, 1 << 15),
    NativeMethod::safe("getTransactionHeight", 1, 1 << 15),
];

impl NativeContract for LedgerContract {
    fn id(&self) -> i32 {
        ID
    }

    fn name(&self) -> &'static str {
        "LedgerContract"
    }

    fn methods(&self) -> &'static [NativeMethod] {
        METHODS
    }

    fn on_persist(&self, engine: &mut ApplicationEngine) -> ContractResult<()> {
        let block = engine
            .persisting_block()
            .cloned()
            .ok_or_else(|| ContractError::invalid_operation("no persisting block"))?;
        store_block(engine.snapshot(), &block);
        Ok(())
    }

    fn invoke(
        &self,
        engine: &mut ApplicationEngine,
        method: &str,
        args: Vec<StackItem>,
    ) -> ContractResult<Option<StackItem>> {
        let snapshot = engine.snapshot().clone();
        match method {
            "currentHash" => {
                let hash = current_hash(&snapshot)
                    .ok_or_else(|| ContractError::invalid_operation("empty ledger"))?;
                Ok(Some(StackItem::from_bytes(hash.to_vec())))
            }
            "currentIndex" => {
                let index = current_index(&snapshot)
                    .ok_or_else(|| ContractError::invalid_operation("empty ledger"))?;
                Ok(Some(StackItem::from_int(index)))
            }
            "getBlock" => {
                let hash = block_hash_arg(&snapshot, &args)?;
                let item = match hash.and_then(|h| get_trimmed_block(&snapshot, &h)) {
                    Some(block) => trimmed_block_item(&block),
                    None => StackItem::Null,
                };
                Ok(Some(item))
            }
            "getTransaction" => {
                let hash = hash256_arg(&args)?;
                let item = match get_transaction_state(&snapshot, &hash) {
                    Some(state) => transaction_item(&state.transaction),
                    None => StackItem::Null,
                };
                Ok(Some(item))
            }
            "getTransactionHeight" => {
                let hash = hash256_arg(&args)?;
                let item = match get_transaction_state(&snapshot, &hash) {
                    Some(state) => StackItem::from_int(state.block_index),
                    None => StackItem::from_int(-1),
                };
                Ok(Some(item))
            }
            other => Err(ContractError::invalid_operation(format!(
                "unknown Ledger method {other}"
            ))),
        }
    }
}

fn hash256_arg(args: &[StackItem]) -> ContractResult<UInt256> {
    let bytes = args
        .first()
        .ok_or_else(|| ContractError::invalid_operation("missing argument"))?
        .get_bytes()?;
    UInt256::from_bytes(&bytes).map_err(|e| ContractError::invalid_operation(e.to_string()))
}

/// getBlock accepts a 32-byte hash or a little-endian index.
fn block_hash_arg(snapshot: &DataCache, args: &[StackItem]) -> ContractResult<Option<UInt256>> {
    let arg = args
        .first()
        .ok_or_else(|| ContractError::invalid_operation("missing argument"))?;
    let bytes = arg.get_bytes()?;
    if bytes.len() == 32 {
        return Ok(Some(
            UInt256::from_bytes(&bytes)
                .map_err(|e| ContractError::invalid_operation(e.to_string()))?,
        ));
    }
    let index = arg.get_integer()?;
    let index = u32::try_from(&index)
        .map_err(|_| ContractError::invalid_operation("invalid block index"))?;
    Ok(get_block_hash(snapshot, index))
}

fn trimmed_block_item(block: &TrimmedBlock) -> StackItem {
    StackItem::from_array(vec![
        StackItem::from_bytes(block.header.hash().to_vec()),
        StackItem::from_int(block.header.version),
        StackItem::from_bytes(block.header.prev_hash.to_vec()),
        StackItem::from_bytes(block.header.merkle_root.to_vec()),
        StackItem::from_int(block.header.timestamp),
        StackItem::from_int(block.header.nonce),
        StackItem::from_int(block.header.index),
        StackItem::from_int(block.header.primary_index),
        StackItem::from_bytes(block.header.next_consensus.to_vec()),
        StackItem::from_int(block.hashes.len() as i64),
    ])
}

fn transaction_item(tx: &Transaction) -> StackItem {
    StackItem::from_array(vec![
        StackItem::from_bytes(tx.hash().to_vec()),
        StackItem::from_int(tx.version()),
        StackItem::from_int(tx.nonce()),
        StackItem::from_bytes(tx.sender().to_vec()),
        StackItem::from_int(tx.system_fee()),
        StackItem::from_int(tx.network_fee()),
        StackItem::from_int(tx.valid_until_block()),
        StackItem::from_bytes(tx.script().to_vec()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo_core::{Signer, UInt160, Witness};
    use std::sync::Arc;

    fn sample_block() -> Block {
        let tx = Transaction::new(
            1,
            0,
            0,
            100,
            vec![Signer::called_by_entry(UInt160::zero())],
            vec![],
            vec![0x40],
            vec![Witness::empty()],
        );
        let merkle = UInt256::from(*tx.hash().as_bytes());
        let header = Header::new(
            0,
            UInt256::zero(),
            merkle,
            1234,
            5,
            0,
            0,
            UInt160::zero(),
            Witness::empty(),
        );
        Block::new(header, vec![tx])
    }

    #[test]
    fn test_store_and_read_back() {
        let snapshot = Arc::new(DataCache::new());
        let block = sample_block();
        store_block(&snapshot, &block);

        assert_eq!(current_index(&snapshot), Some(0));
        assert_eq!(current_hash(&snapshot), Some(block.hash()));
        assert_eq!(get_block_hash(&snapshot, 0), Some(block.hash()));

        let tx_hash = block.transactions[0].hash();
        assert!(contains_transaction(&snapshot, &tx_hash));
        let state = get_transaction_state(&snapshot, &tx_hash).unwrap();
        assert_eq!(state.block_index, 0);
        assert_eq!(state.vm_state, VMState::NONE);
    }

    #[test]
    fn test_update_transaction_state() {
        let snapshot = Arc::new(DataCache::new());
        let block = sample_block();
        store_block(&snapshot, &block);
        let tx_hash = block.transactions[0].hash();
        update_transaction_state(&snapshot, &tx_hash, VMState::FAULT);
        assert_eq!(
            get_transaction_state(&snapshot, &tx_hash).unwrap().vm_state,
            VMState::FAULT
        );
    }
}
