// Copyright (C) 2015-2025 The Neo Project.
//
// contract_management.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The ContractManagement native contract: deploy, update, destroy.

use crate::application_engine::{ApplicationEngine, ScriptContainer};
use crate::call_flags::CallFlags;
use crate::contract_state::{create_contract_hash, ContractState};
use crate::key_builder::KeyBuilder;
use crate::manifest::ContractManifest;
use crate::native::{policy, NativeContract, NativeMethod};
use crate::nef::NefFile;
use crate::{ContractError, ContractResult};
use neo_config::GAS_FACTOR;
use neo_core::UInt160;
use neo_io::Serializable;
use neo_persistence::{DataCache, SeekDirection, StorageItem};
use neo_vm::StackItem;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// The id of the ContractManagement contract.
pub const ID: i32 = -1;

const PREFIX_CONTRACT: u8 = 8;
const PREFIX_CONTRACT_HASH: u8 = 12;
const PREFIX_NEXT_AVAILABLE_ID: u8 = 15;
const PREFIX_MINIMUM_DEPLOYMENT_FEE: u8 = 20;

const DEFAULT_MINIMUM_DEPLOYMENT_FEE: i64 = 10 * GAS_FACTOR;

/// Reads a deployed or native contract by hash.
pub fn get_contract(snapshot: &DataCache, hash: &UInt160) -> Option<ContractState> {
    if let Some(native) = crate::native::find_by_hash(hash) {
        return Some(native.contract_state());
    }
    let key = KeyBuilder::new(ID, PREFIX_CONTRACT).add_hash(hash).build();
    let item = snapshot.try_get(&key)?;
    ContractState::from_storage_bytes(item.value()).ok()
}

/// Reads a deployed or native contract by id.
pub fn get_contract_by_id(snapshot: &DataCache, id: i32) -> Option<ContractState> {
    if id < 0 {
        return crate::native::find_by_id(id).map(|n| n.contract_state());
    }
    let key = KeyBuilder::new(ID, PREFIX_CONTRACT_HASH)
        .add(&id.to_be_bytes())
        .build();
    let item = snapshot.try_get(&key)?;
    let hash = UInt160::from_bytes(item.value()).ok()?;
    get_contract(snapshot, &hash)
}

/// All deployed contracts.
pub fn list_contracts(snapshot: &DataCache) -> Vec<ContractState> {
    snapshot
        .find_prefix(ID, &[PREFIX_CONTRACT], SeekDirection::Forward)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(_, item)| ContractState::from_storage_bytes(item.value()).ok())
        .collect()
}

fn minimum_deployment_fee(snapshot: &DataCache) -> i64 {
    snapshot
        .try_get(&KeyBuilder::new(ID, PREFIX_MINIMUM_DEPLOYMENT_FEE).build())
        .map(|item| {
            item.as_int()
                .to_i64()
                .unwrap_or(DEFAULT_MINIMUM_DEPLOYMENT_FEE)
        })
        .unwrap_or(DEFAULT_MINIMUM_DEPLOYMENT_FEE)
}

fn next_available_id(snapshot: &DataCache) -> ContractResult<i32> {
    let key = KeyBuilder::new(ID, PREFIX_NEXT_AVAILABLE_ID).build();
    let id = snapshot.get_and_change(&key, Some(&|| StorageItem::from_int(&BigInt::from(1))), |item| {
        let current = item.as_int();
        item.add_int(&BigInt::from(1));
        current
    })?;
    id.to_i32()
        .ok_or_else(|| ContractError::invalid_operation("contract id overflow"))
}

fn store_contract(snapshot: &DataCache, contract: &ContractState) {
    snapshot.put(
        KeyBuilder::new(ID, PREFIX_CONTRACT)
            .add_hash(&contract.hash)
            .build(),
        StorageItem::new(contract.to_storage_bytes()),
    );
    snapshot.put(
        KeyBuilder::new(ID, PREFIX_CONTRACT_HASH)
            .add(&contract.id.to_be_bytes())
            .build(),
        StorageItem::new(contract.hash.to_vec()),
    );
}

fn contract_item(contract: &ContractState) -> StackItem {
    StackItem::from_array(vec![
        StackItem::from_int(contract.id),
        StackItem::from_int(contract.update_counter),
        StackItem::from_bytes(contract.hash.to_vec()),
        StackItem::from_bytes(contract.nef.to_array()),
        StackItem::from_bytes(contract.manifest.to_json().into_bytes()),
    ])
}

/// The ContractManagement native contract.
pub struct ContractManagement;

static METHODS: &[NativeMethod] = &[
    NativeMethod::safe("getContract", 1, 1 << 15),
    NativeMethod::safe("getContractById", 1, 1 << 15),
    NativeMethod::safe("hasMethod", 3, 1 << 15),
    NativeMethod::safe("getMinimumDeploymentFee", 0, 1 << 15),
    NativeMethod {
        name: "deploy",
        parameters: 2,
        has_return: true,
        cpu_fee: 0,
        storage_fee: 0,
        required_flags: CallFlags::ALL,
        safe: false,
    },
    NativeMethod {
        name: "deploy",
        parameters: 3,
        has_return: true,
        cpu_fee: 0,
        storage_fee: 0,
        required_flags: CallFlags::ALL,
        safe: false,
    },
    NativeMethod {
        name: "update",
        parameters: 3,
        has_return: false,
        cpu_fee: 0,
        storage_fee: 0,
        required_flags: CallFlags::ALL,
        safe: false,
    },
    NativeMethod::writing_void("destroy", 0, 1 << 15).with_notify(),
    NativeMethod::writing_void("setMinimumDeploymentFee", 1, 1 << 15),
];

impl ContractManagement {
    fn deploy(
        &self,
        engine: &mut ApplicationEngine,
        nef_bytes: &[u8],
        manifest_bytes: &[u8],
        data: StackItem,
    ) -> ContractResult<ContractState> {
        let sender = match engine.container() {
            Some(ScriptContainer::Transaction(tx)) => tx.sender(),
            _ => {
                return Err(ContractError::invalid_operation(
                    "deploy requires a transaction",
                ))
            }
        };

        let nef = NefFile::from_bytes(nef_bytes)
            .map_err(|e| ContractError::invalid_contract(format!("invalid nef: {e}")))?;
        let manifest_json = std::str::from_utf8(manifest_bytes)
            .map_err(|_| ContractError::invalid_contract("manifest is not utf-8"))?;
        let manifest = ContractManifest::from_json(manifest_json)?;
        manifest.validate(nef.script.len())?;

        let fee = std::cmp::max(
            engine.storage_price() as i64 * (nef_bytes.len() + manifest_bytes.len()) as i64,
            minimum_deployment_fee(engine.snapshot()),
        );
        engine.add_fee_raw(fee)?;

        let hash = create_contract_hash(&sender, nef.checksum, &manifest.name);
        if policy::is_blocked(engine.snapshot(), &hash) {
            return Err(ContractError::invalid_operation(format!(
                "contract {hash} is blocked"
            )));
        }
        if get_contract(engine.snapshot(), &hash).is_some() {
            return Err(ContractError::invalid_operation(format!(
                "contract {hash} already exists"
            )));
        }

        let contract = ContractState {
            id: next_available_id(engine.snapshot())?,
            update_counter: 0,
            hash,
            nef,
            manifest,
        };
        contract.check_group_signatures()?;
        store_contract(engine.snapshot(), &contract);

        engine.send_notification(
            self.hash(),
            "Deploy".into(),
            vec![StackItem::from_bytes(contract.hash.to_vec())],
        )?;
        self.call_deploy_callback(engine, &contract, data, false)?;
        Ok(contract)
    }

    fn update(
        &self,
        engine: &mut ApplicationEngine,
        nef_bytes: Option<Vec<u8>>,
        manifest_bytes: Option<Vec<u8>>,
        data: StackItem,
    ) -> ContractResult<()> {
        if nef_bytes.is_none() && manifest_bytes.is_none() {
            return Err(ContractError::invalid_operation(
                "update needs a nef or a manifest",
            ));
        }
        let hash = engine
            .calling_script_hash()
            .ok_or_else(|| ContractError::invalid_operation("update outside a contract"))?;
        let mut contract = get_contract(engine.snapshot(), &hash).ok_or_else(|| {
            ContractError::invalid_operation("updating contract does not exist")
        })?;
        if contract.id < 0 {
            return Err(ContractError::invalid_operation(
                "native contracts cannot update",
            ));
        }

        let byte_count =
            nef_bytes.as_ref().map_or(0, Vec::len) + manifest_bytes.as_ref().map_or(0, Vec::len);
        engine.add_fee_raw(engine.storage_price() as i64 * byte_count as i64)?;

        if let Some(bytes) = nef_bytes {
            contract.nef = NefFile::from_bytes(&bytes)
                .map_err(|e| ContractError::invalid_contract(format!("invalid nef: {e}")))?;
        }
        if let Some(bytes) = manifest_bytes {
            let json = std::str::from_utf8(&bytes)
                .map_err(|_| ContractError::invalid_contract("manifest is not utf-8"))?;
            let manifest = ContractManifest::from_json(json)?;
            if manifest.name != contract.manifest.name {
                return Err(ContractError::invalid_contract(
                    "update cannot change the contract name",
                ));
            }
            contract.manifest = manifest;
        }
        contract.manifest.validate(contract.nef.script.len())?;
        contract.check_group_signatures()?;
        contract.update_counter = contract
            .update_counter
            .checked_add(1)
            .ok_or_else(|| ContractError::invalid_operation("update counter overflow"))?;
        store_contract(engine.snapshot(), &contract);

        engine.send_notification(
            self.hash(),
            "Update".into(),
            vec![StackItem::from_bytes(contract.hash.to_vec())],
        )?;
        self.call_deploy_callback(engine, &contract, data, true)?;
        Ok(())
    }

    fn destroy(&self, engine: &mut ApplicationEngine) -> ContractResult<()> {
        let hash = engine
            .calling_script_hash()
            .ok_or_else(|| ContractError::invalid_operation("destroy outside a contract"))?;
        let Some(contract) = get_contract(engine.snapshot(), &hash) else {
            return Ok(());
        };
        if contract.id < 0 {
            return Err(ContractError::invalid_operation(
                "native contracts cannot destroy",
            ));
        }
        let snapshot = engine.snapshot().clone();
        snapshot.delete(
            &KeyBuilder::new(ID, PREFIX_CONTRACT).add_hash(&hash).build(),
        );
        snapshot.delete(
            &KeyBuilder::new(ID, PREFIX_CONTRACT_HASH)
                .add(&contract.id.to_be_bytes())
                .build(),
        );
        // Drop the whole storage region of the destroyed contract.
        for (key, _) in snapshot
            .find(&contract.id.to_be_bytes(), SeekDirection::Forward)?
        {
            snapshot.delete(&key);
        }
        // A destroyed hash can never be redeployed.
        policy::block_account_internal(&snapshot, &hash);

        engine.send_notification(
            self.hash(),
            "Destroy".into(),
            vec![StackItem::from_bytes(hash.to_vec())],
        )?;
        Ok(())
    }

    fn call_deploy_callback(
        &self,
        engine: &mut ApplicationEngine,
        contract: &ContractState,
        data: StackItem,
        update: bool,
    ) -> ContractResult<()> {
        if let Some(method) = contract.manifest.abi.get_method("_deploy", 2).cloned() {
            let args = vec![data, StackItem::from_bool(update)];
            engine.load_contract(contract, &method, CallFlags::ALL, args, false)?;
        }
        Ok(())
    }
}

impl NativeContract for ContractManagement {
    fn id(&self) -> i32 {
        ID
    }

    fn name(&self) -> &'static str {
        "ContractManagement"
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
            "getContract" => {
                let hash = policy::account_arg(&args, 0)?;
                let item = match get_contract(engine.snapshot(), &hash) {
                    Some(contract) => contract_item(&contract),
                    None => StackItem::Null,
                };
                Ok(Some(item))
            }
            "getContractById" => {
                let id = args
                    .first()
                    .ok_or_else(|| ContractError::invalid_operation("missing id"))?
                    .get_integer()?
                    .to_i32()
                    .ok_or_else(|| ContractError::invalid_operation("invalid id"))?;
                let item = match get_contract_by_id(engine.snapshot(), id) {
                    Some(contract) => contract_item(&contract),
                    None => StackItem::Null,
                };
                Ok(Some(item))
            }
            "hasMethod" => {
                let hash = policy::account_arg(&args, 0)?;
                let name = args
                    .get(1)
                    .ok_or_else(|| ContractError::invalid_operation("missing method name"))?
                    .get_string()
                    .map_err(|_| ContractError::invalid_operation("method name must be utf-8"))?;
                let count = args
                    .get(2)
                    .ok_or_else(|| ContractError::invalid_operation("missing parameter count"))?
                    .get_integer()?
                    .to_usize()
                    .ok_or_else(|| ContractError::invalid_operation("invalid parameter count"))?;
                let result = get_contract(engine.snapshot(), &hash)
                    .map(|c| c.has_method(&name, count))
                    .unwrap_or(false);
                Ok(Some(StackItem::from_bool(result)))
            }
            "getMinimumDeploymentFee" => Ok(Some(StackItem::from_int(minimum_deployment_fee(
                engine.snapshot(),
            )))),
            "setMinimumDeploymentFee" => {
                let value = args
                    .first()
                    .ok_or_else(|| ContractError::invalid_operation("missing value"))?
                    .get_integer()?;
                if value < BigInt::from(0) {
                    return Err(ContractError::invalid_operation("negative fee"));
                }
                let committee =
                    crate::native::neo_token::committee_address(engine.snapshot(), engine.settings());
                if !engine.check_witness(&committee)? {
                    return Err(ContractError::invalid_operation(
                        "committee witness required",
                    ));
                }
                engine.snapshot().put(
                    KeyBuilder::new(ID, PREFIX_MINIMUM_DEPLOYMENT_FEE).build(),
                    StorageItem::from_int(&value),
                );
                Ok(None)
            }
            "deploy" => {
                let nef_bytes = args
                    .first()
                    .ok_or_else(|| ContractError::invalid_operation("missing nef"))?
                    .get_bytes()?;
                let manifest_bytes = args
                    .get(1)
                    .ok_or_else(|| ContractError::invalid_operation("missing manifest"))?
                    .get_bytes()?;
                let data = args.get(2).cloned().unwrap_or(StackItem::Null);
                let contract = self.deploy(engine, &nef_bytes, &manifest_bytes, data)?;
                Ok(Some(contract_item(&contract)))
            }
            "update" => {
                let optional_bytes = |item: Option<&StackItem>| -> ContractResult<Option<Vec<u8>>> {
                    match item {
                        None => Ok(None),
                        Some(item) if item.is_null() => Ok(None),
                        Some(item) => Ok(Some(item.get_bytes()?)),
                    }
                };
                let nef_bytes = optional_bytes(args.first())?;
                let manifest_bytes = optional_bytes(args.get(1))?;
                let data = args.get(2).cloned().unwrap_or(StackItem::Null);
                self.update(engine, nef_bytes, manifest_bytes, data)?;
                Ok(None)
            }
            "destroy" => {
                self.destroy(engine)?;
                Ok(None)
            }
            other => Err(ContractError::invalid_operation(format!(
                "unknown ContractManagement method {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_native_lookup_by_hash_and_id() {
        let snapshot = Arc::new(DataCache::new());
        let neo_hash = crate::native::find_by_id(-5).unwrap().hash();
        let state = get_contract(&snapshot, &neo_hash).unwrap();
        assert_eq!(state.id, -5);
        assert_eq!(get_contract_by_id(&snapshot, -5).unwrap().hash, neo_hash);
    }

    #[test]
    fn test_next_available_id_sequences() {
        let snapshot = Arc::new(DataCache::new());
        assert_eq!(next_available_id(&snapshot).unwrap(), 1);
        assert_eq!(next_available_id(&snapshot).unwrap(), 2);
        assert_eq!(next_available_id(&snapshot).unwrap(), 3);
    }
}
