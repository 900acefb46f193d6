// Copyright (C) 2015-2025 The Neo Project.
//
// signer.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Transaction signers and their witness scopes.

use crate::witness_rule::WitnessRule;
use crate::UInt160;
use bitflags::bitflags;
use neo_config::MAX_SUBITEMS;
use neo_cryptography::ecc::ECPoint;
use neo_io::serializable::{deserialize_vec, serialize_vec, vec_size};
use neo_io::{BinaryWriter, IoError, IoResult, MemoryReader, Serializable};

bitflags! {
    /// Restricts where a signer's witness is considered valid.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WitnessScope: u8 {
        /// Only the transaction fee may be charged; no contract sees the witness.
        const NONE = 0x00;
        /// Valid only in the entry context and direct calls from it.
        const CALLED_BY_ENTRY = 0x01;
        /// Valid only inside the listed contracts.
        const CUSTOM_CONTRACTS = 0x10;
        /// Valid only inside contracts of the listed groups.
        const CUSTOM_GROUPS = 0x20;
        /// Valid where the rule tree allows it.
        const WITNESS_RULES = 0x40;
        /// Valid everywhere. Mutually exclusive with every other scope.
        const GLOBAL = 0x80;
    }
}

/// An account whose witness authorizes a transaction, with the scope that
/// bounds where the authorization applies.
#[derive(Debug, Clone, PartialEq)]
pub struct Signer {
    /// The account script hash.
    pub account: UInt160,
    /// The scope bits.
    pub scopes: WitnessScope,
    /// Contracts the witness is valid in, for `CUSTOM_CONTRACTS`.
    pub allowed_contracts: Vec<UInt160>,
    /// Groups the witness is valid in, for `CUSTOM_GROUPS`.
    pub allowed_groups: Vec<ECPoint>,
    /// Rules evaluated per context, for `WITNESS_RULES`.
    pub rules: Vec<WitnessRule>,
}

impl Signer {
    /// Creates a signer with the given scope and no subitems.
    pub fn new(account: UInt160, scopes: WitnessScope) -> Self {
        Self {
            account,
            scopes,
            allowed_contracts: Vec::new(),
            allowed_groups: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// A signer whose witness is valid everywhere.
    pub fn global(account: UInt160) -> Self {
        Self::new(account, WitnessScope::GLOBAL)
    }

    /// A signer whose witness only covers the entry context.
    pub fn called_by_entry(account: UInt160) -> Self {
        Self::new(account, WitnessScope::CALLED_BY_ENTRY)
    }

    fn validate_scopes(scopes: WitnessScope) -> IoResult<()> {
        if scopes.contains(WitnessScope::GLOBAL) && scopes != WitnessScope::GLOBAL {
            return Err(IoError::format(
                "Signer",
                "Global scope cannot combine with others",
            ));
        }
        Ok(())
    }
}

impl Serializable for Signer {
    fn size(&self) -> usize {
        let mut size = 20 + 1;
        if self.scopes.contains(WitnessScope::CUSTOM_CONTRACTS) {
            size += vec_size(&self.allowed_contracts);
        }
        if self.scopes.contains(WitnessScope::CUSTOM_GROUPS) {
            size += vec_size(&self.allowed_groups);
        }
        if self.scopes.contains(WitnessScope::WITNESS_RULES) {
            size += vec_size(&self.rules);
        }
        size
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.account.serialize(writer)?;
        writer.write_byte(self.scopes.bits());
        if self.scopes.contains(WitnessScope::CUSTOM_CONTRACTS) {
            serialize_vec(&self.allowed_contracts, writer)?;
        }
        if self.scopes.contains(WitnessScope::CUSTOM_GROUPS) {
            serialize_vec(&self.allowed_groups, writer)?;
        }
        if self.scopes.contains(WitnessScope::WITNESS_RULES) {
            serialize_vec(&self.rules, writer)?;
        }
        Ok(())
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let account = UInt160::deserialize(reader)?;
        let bits = reader.read_byte()?;
        let scopes = WitnessScope::from_bits(bits).ok_or_else(|| {
            IoError::format("Signer", format!("invalid scope bits 0x{bits:02x}"))
        })?;
        Self::validate_scopes(scopes)?;

        let allowed_contracts = if scopes.contains(WitnessScope::CUSTOM_CONTRACTS) {
            deserialize_vec(reader, MAX_SUBITEMS)?
        } else {
            Vec::new()
        };
        let allowed_groups = if scopes.contains(WitnessScope::CUSTOM_GROUPS) {
            deserialize_vec(reader, MAX_SUBITEMS)?
        } else {
            Vec::new()
        };
        let rules = if scopes.contains(WitnessScope::WITNESS_RULES) {
            deserialize_vec(reader, MAX_SUBITEMS)?
        } else {
            Vec::new()
        };

        Ok(Self {
            account,
            scopes,
            allowed_contracts,
            allowed_groups,
            rules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::witness_rule::{WitnessCondition, WitnessRuleAction};

    #[test]
    fn test_round_trip_simple() {
        let signer = Signer::called_by_entry(UInt160::from([1u8; 20]));
        let decoded = Signer::from_bytes(&signer.to_array()).unwrap();
        assert_eq!(decoded, signer);
        assert_eq!(signer.to_array().len(), signer.size());
    }

    #[test]
    fn test_round_trip_with_subitems() {
        let mut signer = Signer::new(
            UInt160::from([2u8; 20]),
            WitnessScope::CUSTOM_CONTRACTS | WitnessScope::WITNESS_RULES,
        );
        signer.allowed_contracts = vec![UInt160::from([3u8; 20]), UInt160::from([4u8; 20])];
        signer.rules = vec![WitnessRule::new(
            WitnessRuleAction::Allow,
            WitnessCondition::CalledByEntry,
        )];
        let decoded = Signer::from_bytes(&signer.to_array()).unwrap();
        assert_eq!(decoded, signer);
    }

    #[test]
    fn test_global_exclusive() {
        let mut writer = BinaryWriter::new();
        UInt160::zero().serialize(&mut writer).unwrap();
        writer.write_byte(WitnessScope::GLOBAL.bits() | WitnessScope::CALLED_BY_ENTRY.bits());
        let bytes = writer.into_bytes();
        assert!(Signer::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_invalid_scope_bits_rejected() {
        let mut writer = BinaryWriter::new();
        UInt160::zero().serialize(&mut writer).unwrap();
        writer.write_byte(0x02);
        assert!(Signer::from_bytes(&writer.into_bytes()).is_err());
    }
}
