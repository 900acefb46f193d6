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

//! Core data types for the Neo blockchain.
//!
//! Fixed-width unsigned integers, witnesses, signers, transactions,
//! blocks and the extensible payload, each with its canonical binary
//! encoding.

pub mod address;
pub mod block;
pub mod extensible;
pub mod signer;
pub mod transaction;
pub mod uint160;
pub mod uint256;
pub mod uint512;
pub mod witness;
pub mod witness_rule;

pub use block::{Block, Header};
pub use extensible::ExtensiblePayload;
pub use signer::{Signer, WitnessScope};
pub use transaction::{OracleResponseCode, Transaction, TransactionAttribute};
pub use uint160::UInt160;
pub use uint256::UInt256;
pub use uint512::UInt512;
pub use witness::Witness;
pub use witness_rule::{WitnessCondition, WitnessRule, WitnessRuleAction};

use thiserror::Error;

/// Errors produced by core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A value violated its format rules.
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// What was wrong.
        message: String,
    },

    /// A binary decoding failure bubbled up from the IO layer.
    #[error("deserialization failed: {0}")]
    Io(#[from] neo_io::IoError),
}

impl CoreError {
    /// Creates an invalid-format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        CoreError::InvalidFormat {
            message: message.into(),
        }
    }
}

/// Result type for core operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;
