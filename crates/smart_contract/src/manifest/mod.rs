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

//! The contract manifest.

pub mod abi;
pub mod permissions;

pub use abi::{
    ContractAbi, ContractEventDescriptor, ContractMethodDescriptor,
    ContractParameterDefinition, ContractParameterType,
};
pub use permissions::{ContractPermission, PermissionDescriptor, WildcardMethods};

use crate::{ContractError, ContractResult};
use neo_core::UInt160;
use neo_cryptography::ecc::ECPoint;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The largest serialized manifest accepted.
pub const MAX_MANIFEST_SIZE: usize = 0xffff;

/// A group a contract belongs to: a public key plus a signature of the
/// contract hash by that key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractGroup {
    /// The group's public key.
    #[serde(rename = "pubkey")]
    pub public_key: ECPoint,
    /// Base64-free hex signature over the contract hash.
    pub signature: String,
}

impl ContractGroup {
    /// Verifies the group signature over `hash`.
    pub fn is_valid(&self, hash: &UInt160) -> bool {
        let Ok(signature) = hex::decode(&self.signature) else {
            return false;
        };
        neo_cryptography::ecdsa::verify(hash.as_bytes(), &signature, &self.public_key)
    }
}

/// Contracts trusted by this contract: anything or a listed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WildcardTrusts {
    /// Trust everything.
    Wildcard,
    /// Trust only the listed descriptors.
    List(Vec<PermissionDescriptor>),
}

impl Serialize for WildcardTrusts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            WildcardTrusts::Wildcard => serializer.serialize_str("*"),
            WildcardTrusts::List(items) => items.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for WildcardTrusts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::String(s) if s == "*" => Ok(WildcardTrusts::Wildcard),
            serde_json::Value::Array(_) => {
                let items: Vec<PermissionDescriptor> =
                    serde_json::from_value(value).map_err(D::Error::custom)?;
                Ok(WildcardTrusts::List(items))
            }
            _ => Err(D::Error::custom("invalid trusts wildcard")),
        }
    }
}

/// The manifest: name, groups, standards, ABI, permissions and trusts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractManifest {
    /// The contract name.
    pub name: String,
    /// Groups the contract belongs to.
    #[serde(default)]
    pub groups: Vec<ContractGroup>,
    /// Reserved feature object.
    #[serde(default)]
    pub features: serde_json::Map<String, serde_json::Value>,
    /// NEP standards the contract claims, e.g. `NEP-17`.
    #[serde(default)]
    pub supported_standards: Vec<String>,
    /// The ABI.
    pub abi: ContractAbi,
    /// What this contract may call.
    #[serde(default)]
    pub permissions: Vec<ContractPermission>,
    /// What this contract trusts to call it.
    #[serde(default = "default_trusts")]
    pub trusts: WildcardTrusts,
    /// Arbitrary metadata.
    #[serde(default)]
    pub extra: serde_json::Value,
}

fn default_trusts() -> WildcardTrusts {
    WildcardTrusts::List(Vec::new())
}

impl ContractManifest {
    /// A minimal manifest with one wildcard permission.
    pub fn new(name: impl Into<String>, abi: ContractAbi) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
            features: serde_json::Map::new(),
            supported_standards: Vec::new(),
            abi,
            permissions: vec![ContractPermission::default_wildcard()],
            trusts: default_trusts(),
            extra: serde_json::Value::Null,
        }
    }

    /// Parses a manifest from its JSON form.
    pub fn from_json(json: &str) -> ContractResult<Self> {
        if json.len() > MAX_MANIFEST_SIZE {
            return Err(ContractError::invalid_contract("manifest too large"));
        }
        let manifest: ContractManifest = serde_json::from_str(json)
            .map_err(|e| ContractError::invalid_contract(format!("invalid manifest: {e}")))?;
        if manifest.name.is_empty() {
            return Err(ContractError::invalid_contract("empty contract name"));
        }
        Ok(manifest)
    }

    /// Renders the manifest as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("manifest serialization cannot fail")
    }

    /// The group public keys.
    pub fn group_keys(&self) -> Vec<ECPoint> {
        self.groups.iter().map(|g| g.public_key.clone()).collect()
    }

    /// Whether this manifest allows calling `method` on the contract
    /// identified by `hash` and `groups`.
    pub fn can_call(&self, hash: &UInt160, groups: &[ECPoint], method: &str) -> bool {
        self.permissions
            .iter()
            .any(|p| p.is_allowed(hash, groups, method))
    }

    /// Structural checks against the script the manifest describes: every
    /// method offset must fall inside the script and names must be unique
    /// per arity.
    pub fn validate(&self, script_length: usize) -> ContractResult<()> {
        for method in &self.abi.methods {
            if method.offset as usize >= script_length {
                return Err(ContractError::invalid_contract(format!(
                    "method {} offset {} outside script of {script_length} bytes",
                    method.name, method.offset
                )));
            }
        }
        for (i, a) in self.abi.methods.iter().enumerate() {
            for b in &self.abi.methods[i + 1..] {
                if a.name == b.name && a.parameters.len() == b.parameters.len() {
                    return Err(ContractError::invalid_contract(format!(
                        "duplicate method {}({})",
                        a.name,
                        a.parameters.len()
                    )));
                }
            }
        }
        for group in &self.groups {
            let _ = group; // signatures are checked against the final hash at deploy
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ContractManifest {
        ContractManifest::new(
            "TestContract",
            ContractAbi {
                methods: vec![ContractMethodDescriptor {
                    name: "test".into(),
                    parameters: vec![],
                    return_type: ContractParameterType::Any,
                    offset: 0,
                    safe: true,
                }],
                events: vec![],
            },
        )
    }

    #[test]
    fn test_json_round_trip() {
        let manifest = sample();
        let json = manifest.to_json();
        let decoded = ContractManifest::from_json(&json).unwrap();
        assert_eq!(decoded, manifest);
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut manifest = sample();
        manifest.name = String::new();
        assert!(ContractManifest::from_json(&manifest.to_json()).is_err());
    }

    #[test]
    fn test_offset_validation() {
        let manifest = sample();
        assert!(manifest.validate(10).is_ok());
        let mut bad = sample();
        bad.abi.methods[0].offset = 10;
        assert!(bad.validate(10).is_err());
    }

    #[test]
    fn test_duplicate_method_rejected() {
        let mut manifest = sample();
        manifest.abi.methods.push(manifest.abi.methods[0].clone());
        assert!(manifest.validate(100).is_err());
    }

    #[test]
    fn test_can_call_with_restriction() {
        let mut manifest = sample();
        let target = UInt160::from([9u8; 20]);
        manifest.permissions = vec![ContractPermission {
            contract: PermissionDescriptor::Hash(target),
            methods: WildcardMethods::List(vec!["test".into()]),
        }];
        assert!(manifest.can_call(&target, &[], "test"));
        assert!(!manifest.can_call(&target, &[], "disallowed"));
        assert!(!manifest.can_call(&UInt160::zero(), &[], "test"));
    }
}
