// Copyright (C) 2015-2025 The Neo Project.
//
// lib.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Protocol configuration for the Neo blockchain.
//!
//! This crate provides the protocol settings loaded at node startup,
//! the hardfork height map, and the network-wide constants shared by
//! every other crate in the workspace.

pub mod constants;
pub mod hardfork;
pub mod protocol_settings;

pub use constants::*;
pub use hardfork::Hardfork;
pub use protocol_settings::ProtocolSettings;

use thiserror::Error;

/// Errors produced while loading or validating protocol settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings document could not be parsed.
    #[error("invalid protocol settings: {0}")]
    InvalidSettings(String),

    /// A hardfork entry violates the continuity rules.
    #[error("invalid hardfork configuration: {0}")]
    InvalidHardfork(String),

    /// An embedded public key could not be decoded.
    #[error("invalid committee key: {0}")]
    InvalidCommitteeKey(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
