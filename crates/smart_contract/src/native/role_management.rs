// Copyright (C) 2015-2025 The Neo Project.
//
// role_management.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The RoleManagement native contract: node designations per role.

use crate::application_engine::ApplicationEngine;
use crate::key_builder::KeyBuilder;
use crate::native::{neo_token, NativeContract, NativeMethod};
use crate::{ContractError, ContractResult};
use neo_cryptography::ecc::ECPoint;
use neo_io::{BinaryWriter, MemoryReader, Serializable};
use neo_persistence::{DataCache, SeekDirection, StorageItem};
use neo_vm::StackItem;
use num_traits::ToPrimitive;

/// The id of the RoleManagement contract.
pub const ID: i32 = -8;

/// Network roles nodes can be designated into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Role {
    /// State validators.
    StateValidator = 4,
    /// Oracle nodes.
    Oracle = 8,
    /// NeoFS alphabet nodes.
    NeoFsAlphabetNode = 16,
}

impl Role {
    /// Decodes a role byte.
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            4 => Some(Role::StateValidator),
            8 => Some(Role::Oracle),
            16 => Some(Role::NeoFsAlphabetNode),
            _ => None,
        }
    }
}

/// The nodes designated for `role` as of block `index`: the newest
/// designation recorded at a height `<= index`.
pub fn get_designated_by_role(
    snapshot: &DataCache,
    role: Role,
    index: u32,
) -> Vec<ECPoint> {
    let entries = snapshot
        .find_prefix(ID, &[role as u8], SeekDirection::Backward)
        .unwrap_or_default();
    for (key, item) in entries {
        let Some(height_bytes) = key.key.get(1..5) else { continue };
        let height = u32::from_be_bytes(height_bytes.try_into().expect("slice length"));
        if height > index {
            continue;
        }
        let mut reader = MemoryReader::new(item.value());
        if let Ok(nodes) = neo_io::serializable::deserialize_vec::<ECPoint>(&mut reader, 32) {
            return nodes;
        }
    }
    Vec::new()
}

/// The RoleManagement native contract.
pub struct RoleManagement;

static METHODS: &[NativeMethod] = &[
    NativeMethod::safe("getDesignatedByRole", 2, 1 << 15),
    NativeMethod::writing_void("designateAsRole", 2, 1 << 15).with_notify(),
];

impl NativeContract for RoleManagement {
    fn id(&self) -> i32 {
        ID
    }

    fn name(&self) -> &'static str {
        "RoleManagement"
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
            "getDesignatedByRole" => {
                let role = role_arg(&args)?;
                let index = args
                    .get(1)
                    .ok_or_else(|| ContractError::invalid_operation("missing index"))?
                    .get_integer()?
                    .to_u32()
                    .ok_or_else(|| ContractError::invalid_operation("invalid index"))?;
                let current = crate::native::ledger::current_index(engine.snapshot()).unwrap_or(0);
                if index > current + 1 {
                    return Err(ContractError::invalid_operation(
                        "index is past the queryable range",
                    ));
                }
                let nodes = get_designated_by_role(engine.snapshot(), role, index);
                Ok(Some(StackItem::from_array(
                    nodes
                        .into_iter()
                        .map(|k| StackItem::from_bytes(k.encoded().to_vec()))
                        .collect(),
                )))
            }
            "designateAsRole" => {
                let role = role_arg(&args)?;
                let nodes_item = args
                    .get(1)
                    .ok_or_else(|| ContractError::invalid_operation("missing node list"))?;
                let StackItem::Array(list) = nodes_item else {
                    return Err(ContractError::invalid_operation("nodes must be an array"));
                };
                if list.is_empty() || list.len() > 32 {
                    return Err(ContractError::invalid_operation(
                        "designation needs 1..=32 nodes",
                    ));
                }
                let mut nodes = Vec::with_capacity(list.len());
                for item in list.items() {
                    nodes.push(
                        ECPoint::from_bytes(&item.get_bytes()?)
                            .map_err(|e| ContractError::invalid_operation(e.to_string()))?,
                    );
                }
                nodes.sort();

                let committee =
                    neo_token::committee_address(engine.snapshot(), engine.settings());
                if !engine.check_witness(&committee)? {
                    return Err(ContractError::invalid_operation(
                        "committee witness required",
                    ));
                }
                let block = engine
                    .persisting_block()
                    .ok_or_else(|| ContractError::invalid_operation("no persisting block"))?;
                // Designations take effect one block after they land.
                let height = block.index() + 1;

                let mut writer = BinaryWriter::new();
                neo_io::serializable::serialize_vec(&nodes, &mut writer)?;
                let key = KeyBuilder::new(ID, role as u8).add_u32(height).build();
                if engine.snapshot().contains(&key) {
                    return Err(ContractError::invalid_operation(
                        "role already designated at this height",
                    ));
                }
                engine
                    .snapshot()
                    .put(key, StorageItem::new(writer.into_bytes()));

                engine.send_notification(
                    self.hash(),
                    "Designation".into(),
                    vec![
                        StackItem::from_int(role as u8),
                        StackItem::from_int(block.index()),
                    ],
                )?;
                Ok(None)
            }
            other => Err(ContractError::invalid_operation(format!(
                "unknown RoleManagement method {other}"
            ))),
        }
    }
}

fn role_arg(args: &[StackItem]) -> ContractResult<Role> {
    let value = args
        .first()
        .ok_or_else(|| ContractError::invalid_operation("missing role"))?
        .get_integer()?
        .to_u8()
        .ok_or_else(|| ContractError::invalid_operation("invalid role"))?;
    Role::from_byte(value).ok_or_else(|| ContractError::invalid_operation("invalid role"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_designation_lookup_picks_latest_at_or_below() {
        let snapshot = Arc::new(DataCache::new());
        let node_a = ECPoint::from_private_key(&[1u8; 32]).unwrap();
        let node_b = ECPoint::from_private_key(&[2u8; 32]).unwrap();

        for (height, node) in [(5u32, &node_a), (10, &node_b)] {
            let mut writer = BinaryWriter::new();
            neo_io::serializable::serialize_vec(&[node.clone()], &mut writer).unwrap();
            snapshot.put(
                KeyBuilder::new(ID, Role::Oracle as u8).add_u32(height).build(),
                StorageItem::new(writer.into_bytes()),
            );
        }

        assert!(get_designated_by_role(&snapshot, Role::Oracle, 4).is_empty());
        assert_eq!(get_designated_by_role(&snapshot, Role::Oracle, 5), vec![node_a.clone()]);
        assert_eq!(get_designated_by_role(&snapshot, Role::Oracle, 9), vec![node_a]);
        assert_eq!(get_designated_by_role(&snapshot, Role::Oracle, 10), vec![node_b]);
    }
}
