// Copyright (C) 2015-2025 The Neo Project.
//
// contract_state.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Deployed contract state.

use crate::manifest::ContractManifest;
use crate::nef::NefFile;
use crate::{ContractError, ContractResult};
use neo_core::UInt160;
use neo_cryptography::hash::hash160;
use neo_vm::ScriptBuilder;

/// The state of a deployed (or native) contract.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractState {
    /// The sequential id; negative for native contracts.
    pub id: i32,
    /// Incremented on every update.
    pub update_counter: u16,
    /// The contract hash, a function of sender, checksum and name.
    pub hash: UInt160,
    /// The executable.
    pub nef: NefFile,
    /// The manifest.
    pub manifest: ContractManifest,
}

impl ContractState {
    /// Serializes for storage: the JSON manifest and the binary NEF under
    /// a small envelope.
    pub fn to_storage_bytes(&self) -> Vec<u8> {
        use neo_io::Serializable;
        let mut writer = neo_io::BinaryWriter::new();
        writer.write_i32(self.id);
        writer.write_u16(self.update_counter);
        self.hash.serialize(&mut writer).expect("memory write");
        writer.write_var_bytes(&self.nef.to_array());
        writer.write_var_string(&self.manifest.to_json());
        writer.into_bytes()
    }

    /// Reverses [`ContractState::to_storage_bytes`].
    pub fn from_storage_bytes(data: &[u8]) -> ContractResult<Self> {
        use neo_io::Serializable;
        let mut reader = neo_io::MemoryReader::new(data);
        let id = reader.read_i32()?;
        let update_counter = reader.read_u16()?;
        let hash = UInt160::deserialize(&mut reader)?;
        // Envelope headroom above the script cap: compiler field, source,
        // method tokens and prefixes.
        let nef_bytes = reader.read_var_bytes(crate::nef::MAX_NEF_SCRIPT_SIZE + 16_384)?;
        let nef = NefFile::from_bytes(&nef_bytes)?;
        let manifest_json = reader.read_var_string(crate::manifest::MAX_MANIFEST_SIZE)?;
        let manifest = ContractManifest::from_json(&manifest_json)?;
        Ok(Self {
            id,
            update_counter,
            hash,
            nef,
            manifest,
        })
    }

    /// Whether the manifest ABI declares `method` with `parameter_count`
    /// parameters.
    pub fn has_method(&self, method: &str, parameter_count: usize) -> bool {
        self.manifest.abi.get_method(method, parameter_count).is_some()
    }

    /// Checks the group signatures against the final hash.
    pub fn check_group_signatures(&self) -> ContractResult<()> {
        for group in &self.manifest.groups {
            if !group.is_valid(&self.hash) {
                return Err(ContractError::invalid_contract(
                    "invalid group signature in manifest",
                ));
            }
        }
        Ok(())
    }
}

/// Computes a contract hash: the script hash of
/// `ABORT ∥ PUSHDATA(sender) ∥ PUSHINT(checksum) ∥ PUSHDATA(name)`.
pub fn create_contract_hash(sender: &UInt160, nef_checksum: u32, name: &str) -> UInt160 {
    let mut sb = ScriptBuilder::new();
    sb.emit(neo_vm::OpCode::Abort);
    sb.emit_push_bytes(sender.as_bytes());
    sb.emit_push_int(nef_checksum as i64);
    sb.emit_push_bytes(name.as_bytes());
    UInt160::from(hash160(&sb.to_array()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ContractAbi;

    fn sample() -> ContractState {
        let nef = NefFile::new("neo-core-v3.0".into(), String::new(), vec![], vec![0x11, 0x40]);
        let hash = create_contract_hash(&UInt160::zero(), nef.checksum, "Sample");
        ContractState {
            id: 1,
            update_counter: 0,
            hash,
            nef,
            manifest: ContractManifest::new("Sample", ContractAbi::default()),
        }
    }

    #[test]
    fn test_storage_round_trip() {
        let state = sample();
        let decoded = ContractState::from_storage_bytes(&state.to_storage_bytes()).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn test_hash_depends_on_all_inputs() {
        let nef_checksum = 42;
        let base = create_contract_hash(&UInt160::zero(), nef_checksum, "A");
        assert_ne!(
            base,
            create_contract_hash(&UInt160::from([1u8; 20]), nef_checksum, "A")
        );
        assert_ne!(base, create_contract_hash(&UInt160::zero(), 43, "A"));
        assert_ne!(base, create_contract_hash(&UInt160::zero(), nef_checksum, "B"));
    }
}
