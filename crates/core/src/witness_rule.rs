// Copyright (C) 2015-2025 The Neo Project.
//
// witness_rule.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Witness rules: a bounded condition tree evaluated per execution context.

use crate::UInt160;
use neo_config::MAX_SUBITEMS;
use neo_cryptography::ecc::ECPoint;
use neo_io::serializable::vec_size;
use neo_io::{BinaryWriter, IoError, IoResult, MemoryReader, Serializable};

/// The maximum nesting depth a condition tree may reach.
pub const MAX_CONDITION_NESTING_DEPTH: usize = 2;

/// Whether a matching rule allows or denies the witness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WitnessRuleAction {
    /// The witness is rejected when the condition matches.
    Deny = 0,
    /// The witness is accepted when the condition matches.
    Allow = 1,
}

/// A node in the witness condition tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WitnessCondition {
    /// A constant truth value.
    Boolean(bool),
    /// Negation of a nested condition.
    Not(Box<WitnessCondition>),
    /// Conjunction of nested conditions.
    And(Vec<WitnessCondition>),
    /// Disjunction of nested conditions.
    Or(Vec<WitnessCondition>),
    /// Matches when the current script hash equals the given hash.
    ScriptHash(UInt160),
    /// Matches when the current contract belongs to the given group.
    Group(ECPoint),
    /// Matches when the calling context is the entry script.
    CalledByEntry,
    /// Matches when the calling contract has the given hash.
    CalledByContract(UInt160),
    /// Matches when the calling contract belongs to the given group.
    CalledByGroup(ECPoint),
}

impl WitnessCondition {
    const TYPE_BOOLEAN: u8 = 0x00;
    const TYPE_NOT: u8 = 0x01;
    const TYPE_AND: u8 = 0x02;
    const TYPE_OR: u8 = 0x03;
    const TYPE_SCRIPT_HASH: u8 = 0x18;
    const TYPE_GROUP: u8 = 0x19;
    const TYPE_CALLED_BY_ENTRY: u8 = 0x20;
    const TYPE_CALLED_BY_CONTRACT: u8 = 0x28;
    const TYPE_CALLED_BY_GROUP: u8 = 0x29;

    /// The wire tag of this condition.
    pub fn condition_type(&self) -> u8 {
        match self {
            WitnessCondition::Boolean(_) => Self::TYPE_BOOLEAN,
            WitnessCondition::Not(_) => Self::TYPE_NOT,
            WitnessCondition::And(_) => Self::TYPE_AND,
            WitnessCondition::Or(_) => Self::TYPE_OR,
            WitnessCondition::ScriptHash(_) => Self::TYPE_SCRIPT_HASH,
            WitnessCondition::Group(_) => Self::TYPE_GROUP,
            WitnessCondition::CalledByEntry => Self::TYPE_CALLED_BY_ENTRY,
            WitnessCondition::CalledByContract(_) => Self::TYPE_CALLED_BY_CONTRACT,
            WitnessCondition::CalledByGroup(_) => Self::TYPE_CALLED_BY_GROUP,
        }
    }

    fn serialize_node(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_byte(self.condition_type());
        match self {
            WitnessCondition::Boolean(value) => writer.write_bool(*value),
            WitnessCondition::Not(inner) => inner.serialize_node(writer)?,
            WitnessCondition::And(items) | WitnessCondition::Or(items) => {
                writer.write_var_int(items.len() as u64);
                for item in items {
                    item.serialize_node(writer)?;
                }
            }
            WitnessCondition::ScriptHash(hash) | WitnessCondition::CalledByContract(hash) => {
                hash.serialize(writer)?;
            }
            WitnessCondition::Group(group) | WitnessCondition::CalledByGroup(group) => {
                group.serialize(writer)?;
            }
            WitnessCondition::CalledByEntry => {}
        }
        Ok(())
    }

    fn deserialize_node(reader: &mut MemoryReader<'_>, max_depth: usize) -> IoResult<Self> {
        let tag = reader.read_byte()?;
        match tag {
            Self::TYPE_BOOLEAN => Ok(WitnessCondition::Boolean(reader.read_bool()?)),
            Self::TYPE_NOT => {
                if max_depth == 0 {
                    return Err(IoError::format("WitnessCondition", "nesting too deep"));
                }
                Ok(WitnessCondition::Not(Box::new(Self::deserialize_node(
                    reader,
                    max_depth - 1,
                )?)))
            }
            Self::TYPE_AND | Self::TYPE_OR => {
                if max_depth == 0 {
                    return Err(IoError::format("WitnessCondition", "nesting too deep"));
                }
                let count = reader.read_var_int(MAX_SUBITEMS as u64)? as usize;
                if count == 0 {
                    return Err(IoError::format("WitnessCondition", "empty composite"));
                }
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(Self::deserialize_node(reader, max_depth - 1)?);
                }
                if tag == Self::TYPE_AND {
                    Ok(WitnessCondition::And(items))
                } else {
                    Ok(WitnessCondition::Or(items))
                }
            }
            Self::TYPE_SCRIPT_HASH => Ok(WitnessCondition::ScriptHash(UInt160::deserialize(
                reader,
            )?)),
            Self::TYPE_GROUP => Ok(WitnessCondition::Group(ECPoint::deserialize(reader)?)),
            Self::TYPE_CALLED_BY_ENTRY => Ok(WitnessCondition::CalledByEntry),
            Self::TYPE_CALLED_BY_CONTRACT => Ok(WitnessCondition::CalledByContract(
                UInt160::deserialize(reader)?,
            )),
            Self::TYPE_CALLED_BY_GROUP => {
                Ok(WitnessCondition::CalledByGroup(ECPoint::deserialize(reader)?))
            }
            other => Err(IoError::format(
                "WitnessCondition",
                format!("unknown condition type 0x{other:02x}"),
            )),
        }
    }
}

impl Serializable for WitnessCondition {
    fn size(&self) -> usize {
        1 + match self {
            WitnessCondition::Boolean(_) => 1,
            WitnessCondition::Not(inner) => inner.size(),
            WitnessCondition::And(items) | WitnessCondition::Or(items) => vec_size(items),
            WitnessCondition::ScriptHash(_) | WitnessCondition::CalledByContract(_) => 20,
            WitnessCondition::Group(_) | WitnessCondition::CalledByGroup(_) => 33,
            WitnessCondition::CalledByEntry => 0,
        }
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.serialize_node(writer)
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        Self::deserialize_node(reader, MAX_CONDITION_NESTING_DEPTH)
    }
}

/// A rule pairing an action with a condition tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WitnessRule {
    /// Whether a match allows or denies.
    pub action: WitnessRuleAction,
    /// The condition tree.
    pub condition: WitnessCondition,
}

impl WitnessRule {
    /// Creates a rule.
    pub fn new(action: WitnessRuleAction, condition: WitnessCondition) -> Self {
        Self { action, condition }
    }
}

impl Serializable for WitnessRule {
    fn size(&self) -> usize {
        1 + self.condition.size()
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_byte(self.action as u8);
        self.condition.serialize(writer)
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let action = match reader.read_byte()? {
            0 => WitnessRuleAction::Deny,
            1 => WitnessRuleAction::Allow,
            other => {
                return Err(IoError::format(
                    "WitnessRule",
                    format!("unknown action 0x{other:02x}"),
                ))
            }
        };
        let condition = WitnessCondition::deserialize(reader)?;
        Ok(Self { action, condition })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_leaf_conditions() {
        let conditions = vec![
            WitnessCondition::Boolean(true),
            WitnessCondition::CalledByEntry,
            WitnessCondition::ScriptHash(UInt160::from([9u8; 20])),
        ];
        for condition in conditions {
            let rule = WitnessRule::new(WitnessRuleAction::Allow, condition.clone());
            let decoded = WitnessRule::from_bytes(&rule.to_array()).unwrap();
            assert_eq!(decoded, rule);
            assert_eq!(rule.to_array().len(), rule.size());
        }
    }

    #[test]
    fn test_nested_round_trip() {
        let condition = WitnessCondition::And(vec![
            WitnessCondition::CalledByEntry,
            WitnessCondition::Not(Box::new(WitnessCondition::Boolean(false))),
        ]);
        let rule = WitnessRule::new(WitnessRuleAction::Deny, condition);
        assert_eq!(WitnessRule::from_bytes(&rule.to_array()).unwrap(), rule);
    }

    #[test]
    fn test_depth_limit_enforced() {
        // Depth 3: And(And(Not(bool))) exceeds the limit of 2.
        let condition = WitnessCondition::And(vec![WitnessCondition::And(vec![
            WitnessCondition::Not(Box::new(WitnessCondition::Boolean(true))),
        ])]);
        let rule = WitnessRule::new(WitnessRuleAction::Allow, condition);
        assert!(WitnessRule::from_bytes(&rule.to_array()).is_err());
    }

    #[test]
    fn test_empty_composite_rejected() {
        let rule = WitnessRule::new(WitnessRuleAction::Allow, WitnessCondition::Or(vec![]));
        assert!(WitnessRule::from_bytes(&rule.to_array()).is_err());
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(WitnessCondition::from_bytes(&[0x77]).is_err());
    }
}
