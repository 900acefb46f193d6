// Copyright (C) 2015-2025 The Neo Project.
//
// protocol_settings.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Protocol settings loaded at node startup.

use crate::constants;
use crate::hardfork::Hardfork;
use crate::{ConfigError, ConfigResult};
use neo_cryptography::ecc::ECPoint;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Represents the protocol settings of the Neo system.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolSettings {
    /// The magic number identifying the network.
    pub network: u32,

    /// The address version byte used when rendering script hashes.
    pub address_version: u8,

    /// The public keys of the standby committee members.
    pub standby_committee: Vec<ECPoint>,

    /// The number of validators participating in consensus.
    pub validators_count: usize,

    /// The default seed nodes.
    pub seed_list: Vec<String>,

    /// The time in milliseconds between two blocks.
    pub milliseconds_per_block: u32,

    /// The maximum increment of a transaction's `valid_until_block` field.
    pub max_valid_until_block_increment: u32,

    /// The maximum number of transactions per block.
    pub max_transactions_per_block: u32,

    /// The capacity of the memory pool.
    pub memory_pool_max_transactions: i32,

    /// The number of blocks contract storage stays traceable for.
    pub max_traceable_blocks: u32,

    /// Heights at which each hardfork activates.
    pub hardforks: HashMap<Hardfork, u32>,

    /// The amount of GAS (in datoshi) distributed at genesis.
    pub initial_gas_distribution: u64,
}

/// On-disk shape of the settings document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ProtocolSettingsDocument {
    network: Option<u32>,
    address_version: Option<u8>,
    #[serde(default)]
    standby_committee: Vec<String>,
    validators_count: Option<usize>,
    #[serde(default)]
    seed_list: Vec<String>,
    milliseconds_per_block: Option<u32>,
    max_valid_until_block_increment: Option<u32>,
    max_transactions_per_block: Option<u32>,
    memory_pool_max_transactions: Option<i32>,
    max_traceable_blocks: Option<u32>,
    #[serde(default)]
    hardforks: HashMap<String, u32>,
    initial_gas_distribution: Option<u64>,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            network: 0,
            address_version: constants::ADDRESS_VERSION,
            standby_committee: Vec::new(),
            validators_count: 0,
            seed_list: Vec::new(),
            milliseconds_per_block: constants::MILLISECONDS_PER_BLOCK,
            max_valid_until_block_increment: 86_400_000 / constants::MILLISECONDS_PER_BLOCK,
            max_transactions_per_block: constants::MAX_TRANSACTIONS_PER_BLOCK,
            memory_pool_max_transactions: constants::MEMORY_POOL_MAX_TRANSACTIONS,
            max_traceable_blocks: constants::MAX_TRACEABLE_BLOCKS,
            hardforks: Self::ensure_omitted_hardforks(HashMap::new()),
            initial_gas_distribution: constants::INITIAL_GAS_DISTRIBUTION,
        }
    }
}

impl ProtocolSettings {
    /// The number of committee members.
    pub fn committee_members_count(&self) -> usize {
        self.standby_committee.len()
    }

    /// The time between two blocks.
    pub fn time_per_block(&self) -> Duration {
        Duration::from_millis(self.milliseconds_per_block as u64)
    }

    /// The public keys of the standby validators, the committee prefix.
    pub fn standby_validators(&self) -> Vec<ECPoint> {
        self.standby_committee
            .iter()
            .take(self.validators_count)
            .cloned()
            .collect()
    }

    /// Returns whether the given hardfork is active at `block_height`.
    pub fn is_hardfork_enabled(&self, hardfork: Hardfork, block_height: u32) -> bool {
        self.hardforks
            .get(&hardfork)
            .map(|&activation| block_height >= activation)
            .unwrap_or(false)
    }

    /// Loads the settings from a JSON document at `path`, falling back to the
    /// defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::InvalidSettings(e.to_string()))?;
        Self::from_json(&data)
    }

    /// Parses the settings from a JSON string.
    pub fn from_json(data: &str) -> ConfigResult<Self> {
        let doc: ProtocolSettingsDocument =
            serde_json::from_str(data).map_err(|e| ConfigError::InvalidSettings(e.to_string()))?;

        let defaults = Self::default();
        let mut standby_committee = Vec::with_capacity(doc.standby_committee.len());
        for encoded in &doc.standby_committee {
            let point = ECPoint::from_hex(encoded)
                .map_err(|e| ConfigError::InvalidCommitteeKey(format!("{encoded}: {e}")))?;
            standby_committee.push(point);
        }

        let mut hardforks = HashMap::new();
        for (name, height) in doc.hardforks {
            let hardfork =
                Hardfork::from_str(&name).map_err(ConfigError::InvalidHardfork)?;
            hardforks.insert(hardfork, height);
        }
        Self::check_hardfork_continuity(&hardforks)?;

        let validators_count = doc.validators_count.unwrap_or(standby_committee.len());
        if validators_count > standby_committee.len() {
            return Err(ConfigError::InvalidSettings(format!(
                "validators count {} exceeds committee size {}",
                validators_count,
                standby_committee.len()
            )));
        }

        Ok(Self {
            network: doc.network.unwrap_or(defaults.network),
            address_version: doc.address_version.unwrap_or(defaults.address_version),
            standby_committee,
            validators_count,
            seed_list: doc.seed_list,
            milliseconds_per_block: doc
                .milliseconds_per_block
                .unwrap_or(defaults.milliseconds_per_block),
            max_valid_until_block_increment: doc
                .max_valid_until_block_increment
                .unwrap_or(defaults.max_valid_until_block_increment),
            max_transactions_per_block: doc
                .max_transactions_per_block
                .unwrap_or(defaults.max_transactions_per_block),
            memory_pool_max_transactions: doc
                .memory_pool_max_transactions
                .unwrap_or(defaults.memory_pool_max_transactions),
            max_traceable_blocks: doc
                .max_traceable_blocks
                .unwrap_or(defaults.max_traceable_blocks),
            hardforks: Self::ensure_omitted_hardforks(hardforks),
            initial_gas_distribution: doc
                .initial_gas_distribution
                .unwrap_or(defaults.initial_gas_distribution),
        })
    }

    /// A configured fork implies every earlier fork; omitted ones inherit
    /// height 0 so the ABI composition sees a contiguous prefix.
    fn ensure_omitted_hardforks(mut hardforks: HashMap<Hardfork, u32>) -> HashMap<Hardfork, u32> {
        let mut configured_seen = false;
        for hardfork in Hardfork::all().iter().rev() {
            if hardforks.contains_key(hardfork) {
                configured_seen = true;
            } else if configured_seen {
                hardforks.insert(*hardfork, 0);
            }
        }
        hardforks
    }

    fn check_hardfork_continuity(hardforks: &HashMap<Hardfork, u32>) -> ConfigResult<()> {
        let mut previous: Option<(Hardfork, u32)> = None;
        for hardfork in Hardfork::all() {
            if let Some(&height) = hardforks.get(&hardfork) {
                if let Some((prev_fork, prev_height)) = previous {
                    if height < prev_height {
                        return Err(ConfigError::InvalidHardfork(format!(
                            "{hardfork} activates at {height}, below {prev_fork} at {prev_height}"
                        )));
                    }
                }
                previous = Some((hardfork, height));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMMITTEE_KEY: &str =
        "02486fd15732395eb47d048b3936194ffdbb44c70d37e5ef2e2eecf2d46bfa2beb";

    #[test]
    fn test_default_settings() {
        let settings = ProtocolSettings::default();
        assert_eq!(settings.address_version, 0x35);
        assert_eq!(settings.max_valid_until_block_increment, 5760);
        assert!(settings.standby_committee.is_empty());
    }

    #[test]
    fn test_from_json() {
        let json = format!(
            r#"{{
                "Network": 860833102,
                "ValidatorsCount": 1,
                "StandbyCommittee": ["{COMMITTEE_KEY}"],
                "MillisecondsPerBlock": 5000,
                "Hardforks": {{ "HF_Aspidochelone": 0, "HF_Basilisk": 100 }}
            }}"#
        );
        let settings = ProtocolSettings::from_json(&json).unwrap();
        assert_eq!(settings.network, 860833102);
        assert_eq!(settings.validators_count, 1);
        assert_eq!(settings.milliseconds_per_block, 5000);
        assert!(settings.is_hardfork_enabled(Hardfork::Aspidochelone, 0));
        assert!(!settings.is_hardfork_enabled(Hardfork::Basilisk, 99));
        assert!(settings.is_hardfork_enabled(Hardfork::Basilisk, 100));
        assert!(!settings.is_hardfork_enabled(Hardfork::Echidna, u32::MAX));
    }

    #[test]
    fn test_hardfork_continuity_rejected() {
        let json = format!(
            r#"{{
                "ValidatorsCount": 1,
                "StandbyCommittee": ["{COMMITTEE_KEY}"],
                "Hardforks": {{ "HF_Aspidochelone": 200, "HF_Basilisk": 100 }}
            }}"#
        );
        assert!(ProtocolSettings::from_json(&json).is_err());
    }

    #[test]
    fn test_omitted_hardforks_backfilled() {
        let json = format!(
            r#"{{
                "ValidatorsCount": 1,
                "StandbyCommittee": ["{COMMITTEE_KEY}"],
                "Hardforks": {{ "HF_Cockatrice": 300 }}
            }}"#
        );
        let settings = ProtocolSettings::from_json(&json).unwrap();
        assert!(settings.is_hardfork_enabled(Hardfork::Aspidochelone, 0));
        assert!(settings.is_hardfork_enabled(Hardfork::Basilisk, 0));
        assert!(!settings.is_hardfork_enabled(Hardfork::Cockatrice, 299));
    }

    #[test]
    fn test_validators_count_bound() {
        let json = format!(
            r#"{{ "ValidatorsCount": 2, "StandbyCommittee": ["{COMMITTEE_KEY}"] }}"#
        );
        assert!(ProtocolSettings::from_json(&json).is_err());
    }
}
