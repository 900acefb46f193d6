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

//! The native contract framework and the built-in contracts.

pub mod contract_management;
pub mod fungible_token;
pub mod gas_token;
pub mod ledger;
pub mod neo_token;
pub mod oracle;
pub mod policy;
pub mod role_management;

use crate::application_engine::ApplicationEngine;
use crate::call_flags::CallFlags;
use crate::contract_state::{create_contract_hash, ContractState};
use crate::interop::interop_hash;
use crate::manifest::{
    ContractAbi, ContractManifest, ContractMethodDescriptor, ContractParameterDefinition,
    ContractParameterType,
};
use crate::nef::NefFile;
use crate::ContractResult;
use neo_config::{Hardfork, ProtocolSettings};
use neo_core::UInt160;
use neo_vm::{OpCode, ScriptBuilder, StackItem};
use std::sync::Arc;

/// The byte length of one method block in a native script:
/// `PUSH0 SYSCALL(CallNative) RET`.
const METHOD_BLOCK_SIZE: usize = 7;

/// A method of a native contract.
pub struct NativeMethod {
    /// The method name as exposed in the ABI.
    pub name: &'static str,
    /// The number of parameters.
    pub parameters: usize,
    /// Whether the method pushes a return value.
    pub has_return: bool,
    /// Base CPU fee, scaled by the exec-fee factor.
    pub cpu_fee: i64,
    /// Base storage fee, scaled by the storage price.
    pub storage_fee: i64,
    /// Call flags the caller must hold.
    pub required_flags: CallFlags,
    /// Whether the method is side-effect free.
    pub safe: bool,
}

impl NativeMethod {
    /// A read-only method.
    pub const fn safe(name: &'static str, parameters: usize, cpu_fee: i64) -> Self {
        Self {
            name,
            parameters,
            has_return: true,
            cpu_fee,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            safe: true,
        }
    }

    /// A state-changing method with a return value.
    pub const fn writing(name: &'static str, parameters: usize, cpu_fee: i64) -> Self {
        Self {
            name,
            parameters,
            has_return: true,
            cpu_fee,
            storage_fee: 0,
            required_flags: CallFlags::STATES,
            safe: false,
        }
    }

    /// A state-changing method without a return value.
    pub const fn writing_void(name: &'static str, parameters: usize, cpu_fee: i64) -> Self {
        Self {
            name,
            parameters,
            has_return: false,
            cpu_fee,
            storage_fee: 0,
            required_flags: CallFlags::STATES,
            safe: false,
        }
    }

    /// Adds a storage fee component.
    pub const fn with_storage_fee(mut self, storage_fee: i64) -> Self {
        self.storage_fee = storage_fee;
        self
    }

    /// Allows the method to notify.
    pub const fn with_notify(mut self) -> Self {
        self.required_flags = CallFlags::STATES.union(CallFlags::ALLOW_NOTIFY);
        self
    }
}

/// An in-process contract callable like a deployed one.
pub trait NativeContract: Send + Sync {
    /// The stable negative id.
    fn id(&self) -> i32;

    /// The contract name.
    fn name(&self) -> &'static str;

    /// The method table, in script-offset order.
    fn methods(&self) -> &'static [NativeMethod];

    /// The hardfork this contract activates in; `None` means genesis.
    fn active_in(&self) -> Option<Hardfork> {
        None
    }

    /// One-time setup at activation height.
    fn initialize(&self, _engine: &mut ApplicationEngine) -> ContractResult<()> {
        Ok(())
    }

    /// Runs before the block's transactions.
    fn on_persist(&self, _engine: &mut ApplicationEngine) -> ContractResult<()> {
        Ok(())
    }

    /// Runs after the block's transactions.
    fn post_persist(&self, _engine: &mut ApplicationEngine) -> ContractResult<()> {
        Ok(())
    }

    /// Dispatches a method call. Arguments arrive in declaration order.
    fn invoke(
        &self,
        engine: &mut ApplicationEngine,
        method: &str,
        args: Vec<StackItem>,
    ) -> ContractResult<Option<StackItem>>;

    /// The contract hash, derived from the name with a zero sender.
    fn hash(&self) -> UInt160 {
        create_contract_hash(&UInt160::zero(), 0, self.name())
    }

    /// Whether the contract is active at `height`.
    fn is_active(&self, settings: &ProtocolSettings, height: u32) -> bool {
        match self.active_in() {
            None => true,
            Some(hardfork) => settings.is_hardfork_enabled(hardfork, height),
        }
    }

    /// The synthetic script: one `PUSH0 SYSCALL(CallNative) RET` block per
    /// method.
    fn script(&self) -> Vec<u8> {
        let mut sb = ScriptBuilder::new();
        for _ in self.methods() {
            sb.emit(OpCode::Push0);
            sb.emit_syscall(interop_hash("System.Contract.CallNative"));
            sb.emit(OpCode::Ret);
        }
        sb.into_bytes()
    }

    /// Resolves a method from the instruction pointer sitting just past
    /// its block's SYSCALL.
    fn method_by_return_address(&self, ip: usize) -> Option<&'static NativeMethod> {
        let past_syscall = METHOD_BLOCK_SIZE - 1;
        if ip < past_syscall || (ip - past_syscall) % METHOD_BLOCK_SIZE != 0 {
            return None;
        }
        self.methods().get((ip - past_syscall) / METHOD_BLOCK_SIZE)
    }

    /// The contract state other components observe.
    fn contract_state(&self) -> ContractState {
        let script = self.script();
        let methods = self
            .methods()
            .iter()
            .enumerate()
            .map(|(i, m)| ContractMethodDescriptor {
                name: m.name.to_string(),
                parameters: (0..m.parameters)
                    .map(|p| ContractParameterDefinition {
                        name: format!("arg{p}"),
                        parameter_type: ContractParameterType::Any,
                    })
                    .collect(),
                return_type: if m.has_return {
                    ContractParameterType::Any
                } else {
                    ContractParameterType::Void
                },
                offset: (i * METHOD_BLOCK_SIZE) as u32,
                safe: m.safe,
            })
            .collect();
        let manifest = ContractManifest::new(
            self.name(),
            ContractAbi {
                methods,
                events: Vec::new(),
            },
        );
        ContractState {
            id: self.id(),
            update_counter: 0,
            hash: self.hash(),
            nef: NefFile::new("neo-core-v3.0".into(), String::new(), Vec::new(), script),
            manifest,
        }
    }
}

lazy_static::lazy_static! {
    static ref REGISTRY: Vec<Arc<dyn NativeContract>> = vec![
        Arc::new(contract_management::ContractManagement),
        Arc::new(ledger::LedgerContract),
        Arc::new(neo_token::NeoToken),
        Arc::new(gas_token::GasToken),
        Arc::new(policy::PolicyContract),
        Arc::new(role_management::RoleManagement),
        Arc::new(oracle::OracleContract),
    ];
}

/// All native contracts, in id order.
pub fn registry() -> &'static [Arc<dyn NativeContract>] {
    &REGISTRY
}

/// Finds a native contract by hash.
pub fn find_by_hash(hash: &UInt160) -> Option<&'static Arc<dyn NativeContract>> {
    REGISTRY.iter().find(|n| n.hash() == *hash)
}

/// Finds a native contract by id.
pub fn find_by_id(id: i32) -> Option<&'static Arc<dyn NativeContract>> {
    REGISTRY.iter().find(|n| n.id() == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_ids_are_unique_and_negative() {
        let mut ids: Vec<i32> = registry().iter().map(|n| n.id()).collect();
        assert!(ids.iter().all(|&id| id < 0));
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), registry().len());
    }

    #[test]
    fn test_hashes_are_stable_and_distinct() {
        let mut hashes: Vec<UInt160> = registry().iter().map(|n| n.hash()).collect();
        hashes.sort();
        hashes.dedup();
        assert_eq!(hashes.len(), registry().len());
        // The hash only depends on the name.
        let neo = find_by_id(-5).unwrap();
        assert_eq!(neo.hash(), create_contract_hash(&UInt160::zero(), 0, "NeoToken"));
    }

    #[test]
    fn test_method_resolution_by_return_address() {
        let neo = find_by_id(-5).unwrap();
        let first = neo.method_by_return_address(6).unwrap();
        assert_eq!(first.name, neo.methods()[0].name);
        let second = neo.method_by_return_address(13).unwrap();
        assert_eq!(second.name, neo.methods()[1].name);
        assert!(neo.method_by_return_address(7).is_none());
    }

    #[test]
    fn test_contract_state_offsets_match_script() {
        let policy = find_by_id(-7).unwrap();
        let state = policy.contract_state();
        assert_eq!(
            state.nef.script.len(),
            policy.methods().len() * METHOD_BLOCK_SIZE
        );
        for (i, method) in state.manifest.abi.methods.iter().enumerate() {
            assert_eq!(method.offset as usize, i * METHOD_BLOCK_SIZE);
        }
    }
}
