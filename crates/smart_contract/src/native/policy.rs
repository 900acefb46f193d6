// Copyright (C) 2015-2025 The Neo Project.
//
// policy.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The Policy native contract: committee-adjustable protocol knobs.

use crate::application_engine::ApplicationEngine;
use crate::key_builder::KeyBuilder;
use crate::native::{neo_token, NativeContract, NativeMethod};
use crate::{ContractError, ContractResult};
use neo_core::UInt160;
use neo_persistence::{DataCache, StorageItem};
use neo_vm::StackItem;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

const PREFIX_FEE_PER_BYTE: u8 = 10;
const PREFIX_BLOCKED_ACCOUNT: u8 = 15;
const PREFIX_EXEC_FEE_FACTOR: u8 = 18;
const PREFIX_STORAGE_PRICE: u8 = 19;

/// The default network fee per transaction byte, in datoshi.
pub const DEFAULT_FEE_PER_BYTE: i64 = 1000;
/// The default execution fee multiplier.
pub const DEFAULT_EXEC_FEE_FACTOR: u32 = 30;
/// The default storage price per byte, in datoshi.
pub const DEFAULT_STORAGE_PRICE: u32 = 100_000;

const MAX_EXEC_FEE_FACTOR: u32 = 100;
const MAX_STORAGE_PRICE: u32 = 10_000_000;
const MAX_FEE_PER_BYTE: i64 = 100_000_000;

/// The id of the Policy contract.
pub const ID: i32 = -7;

fn read_u64(snapshot: &DataCache, prefix: u8, default: u64) -> u64 {
    let key = KeyBuilder::new(ID, prefix).build();
    snapshot
        .try_get(&key)
        .map(|item| item.as_int().to_u64().unwrap_or(default))
        .unwrap_or(default)
}

/// The network fee per byte currently in force.
pub fn fee_per_byte(snapshot: &DataCache) -> i64 {
    read_u64(snapshot, PREFIX_FEE_PER_BYTE, DEFAULT_FEE_PER_BYTE as u64) as i64
}

/// The execution fee factor currently in force.
pub fn exec_fee_factor(snapshot: &DataCache) -> u32 {
    read_u64(snapshot, PREFIX_EXEC_FEE_FACTOR, DEFAULT_EXEC_FEE_FACTOR as u64) as u32
}

/// The storage price currently in force.
pub fn storage_price(snapshot: &DataCache) -> u32 {
    read_u64(snapshot, PREFIX_STORAGE_PRICE, DEFAULT_STORAGE_PRICE as u64) as u32
}

/// Whether `account` is on the blocklist.
pub fn is_blocked(snapshot: &DataCache, account: &UInt160) -> bool {
    let key = KeyBuilder::new(ID, PREFIX_BLOCKED_ACCOUNT)
        .add_hash(account)
        .build();
    snapshot.contains(&key)
}

/// Adds `account` to the blocklist; used by ContractManagement on destroy.
pub fn block_account_internal(snapshot: &DataCache, account: &UInt160) -> bool {
    let key = KeyBuilder::new(ID, PREFIX_BLOCKED_ACCOUNT)
        .add_hash(account)
        .build();
    if snapshot.contains(&key) {
        return false;
    }
    snapshot.put(key, StorageItem::new(Vec::new()));
    true
}

/// The Policy native contract.
pub struct PolicyContract;

static METHODS: &[NativeMethod] = &[
    NativeMethod::safe("getFeePerByte", 0, 1 << 15),
    NativeMethod::safe("getExecFeeFactor", 0, 1 << 15),
    NativeMethod::safe("getStoragePrice", 0, 1 << 15),
    NativeMethod::safe("isBlocked", 1, 1 << 15),
    NativeMethod::writing_void("setFeePerByte", 1, 1 << 15),
    NativeMethod::writing_void("setExecFeeFactor", 1, 1 << 15),
    NativeMethod::writing_void("setStoragePrice", 1, 1 << 15),
    NativeMethod::writing("blockAccount", 1, 1 << 15),
    NativeMethod::writing("unblockAccount", 1, 1 << 15),
];

impl PolicyContract {
    fn check_committee(&self, engine: &mut ApplicationEngine) -> ContractResult<()> {
        let committee_address = neo_token::committee_address(engine.snapshot(), engine.settings());
        if !engine.check_witness(&committee_address)? {
            return Err(ContractError::invalid_operation(
                "committee witness required",
            ));
        }
        Ok(())
    }

    fn set_value(
        &self,
        engine: &mut ApplicationEngine,
        prefix: u8,
        value: &BigInt,
        max: u64,
    ) -> ContractResult<()> {
        let value = value
            .to_u64()
            .filter(|&v| v <= max)
            .ok_or_else(|| ContractError::invalid_operation("value out of range"))?;
        self.check_committee(engine)?;
        let key = KeyBuilder::new(ID, prefix).build();
        engine
            .snapshot()
            .put(key, StorageItem::from_int(&BigInt::from(value)));
        Ok(())
    }
}

impl NativeContract for PolicyContract {
    fn id(&self) -> i32 {
        ID
    }

    fn name(&self) -> &'static str {
        "PolicyContract"
    }

    fn methods(&self) -> &'static [NativeMethod] {
        METHODS
    }

    fn invoke(
        &self,
        engine: &mut ApplicationEngine,
        method: &str,
        args: Vec<StackItem>,
    ) -> ContractResult<Option<StackItem>> {
        match method {
            "getFeePerByte" => Ok(Some(StackItem::from_int(fee_per_byte(engine.snapshot())))),
            "getExecFeeFactor" => Ok(Some(StackItem::from_int(exec_fee_factor(
                engine.snapshot(),
            )))),
            "getStoragePrice" => {
                Ok(Some(StackItem::from_int(storage_price(engine.snapshot()))))
            }
            "isBlocked" => {
                let account = account_arg(&args, 0)?;
                Ok(Some(StackItem::from_bool(is_blocked(
                    engine.snapshot(),
                    &account,
                ))))
            }
            "setFeePerByte" => {
                let value = args[0].get_integer()?;
                self.set_value(engine, PREFIX_FEE_PER_BYTE, &value, MAX_FEE_PER_BYTE as u64)?;
                Ok(None)
            }
            "setExecFeeFactor" => {
                let value = args[0].get_integer()?;
                if value == BigInt::from(0) {
                    return Err(ContractError::invalid_operation("value out of range"));
                }
                self.set_value(
                    engine,
                    PREFIX_EXEC_FEE_FACTOR,
                    &value,
                    MAX_EXEC_FEE_FACTOR as u64,
                )?;
                Ok(None)
            }
            "setStoragePrice" => {
                let value = args[0].get_integer()?;
                if value == BigInt::from(0) {
                    return Err(ContractError::invalid_operation("value out of range"));
                }
                self.set_value(engine, PREFIX_STORAGE_PRICE, &value, MAX_STORAGE_PRICE as u64)?;
                Ok(None)
            }
            "blockAccount" => {
                self.check_committee(engine)?;
                let account = account_arg(&args, 0)?;
                if crate::native::contract_management::get_contract(engine.snapshot(), &account)
                    .map(|c| c.id < 0)
                    .unwrap_or(false)
                {
                    return Err(ContractError::invalid_operation(
                        "cannot block a native contract",
                    ));
                }
                Ok(Some(StackItem::from_bool(block_account_internal(
                    engine.snapshot(),
                    &account,
                ))))
            }
            "unblockAccount" => {
                self.check_committee(engine)?;
                let account = account_arg(&args, 0)?;
                let key = KeyBuilder::new(ID, PREFIX_BLOCKED_ACCOUNT)
                    .add_hash(&account)
                    .build();
                let existed = engine.snapshot().contains(&key);
                if existed {
                    engine.snapshot().delete(&key);
                }
                Ok(Some(StackItem::from_bool(existed)))
            }
            other => Err(ContractError::invalid_operation(format!(
                "unknown Policy method {other}"
            ))),
        }
    }
}

pub(crate) fn account_arg(args: &[StackItem], index: usize) -> ContractResult<UInt160> {
    let bytes = args
        .get(index)
        .ok_or_else(|| ContractError::invalid_operation("missing argument"))?
        .get_bytes()?;
    UInt160::from_bytes(&bytes).map_err(|e| ContractError::invalid_operation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_defaults_without_storage() {
        let snapshot = Arc::new(DataCache::new());
        assert_eq!(fee_per_byte(&snapshot), DEFAULT_FEE_PER_BYTE);
        assert_eq!(exec_fee_factor(&snapshot), DEFAULT_EXEC_FEE_FACTOR);
        assert_eq!(storage_price(&snapshot), DEFAULT_STORAGE_PRICE);
        assert!(!is_blocked(&snapshot, &UInt160::zero()));
    }

    #[test]
    fn test_block_account_internal() {
        let snapshot = Arc::new(DataCache::new());
        let account = UInt160::from([9u8; 20]);
        assert!(block_account_internal(&snapshot, &account));
        assert!(!block_account_internal(&snapshot, &account));
        assert!(is_blocked(&snapshot, &account));
    }
}
