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

//! dBFT consensus: message types, the per-round context, and the service
//! state machine driven by timers and received payloads.

pub mod context;
pub mod messages;
pub mod service;

pub use context::ConsensusContext;
pub use messages::{
    ChangeView, ChangeViewReason, Commit, ConsensusMessage, ConsensusMessagePayload,
    PrepareRequest, PrepareResponse, RecoveryMessage, RecoveryRequest,
};
pub use service::{ConsensusEvent, ConsensusNetwork, ConsensusSigner, DbftService};

use thiserror::Error;

/// The extensible-payload category consensus messages travel under.
pub const DBFT_CATEGORY: &str = "dBFT";

/// Errors raised by the consensus layer.
#[derive(Debug, Error)]
pub enum ConsensusError {
    /// A message failed validation.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// This node is not a validator for the current round.
    #[error("not a validator")]
    NotValidator,

    /// Signing failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// A wire decoding failure.
    #[error("decode error: {0}")]
    Io(#[from] neo_io::IoError),

    /// A ledger failure.
    #[error("ledger error: {0}")]
    Ledger(#[from] neo_ledger::LedgerError),
}

/// Result type for consensus operations.
pub type ConsensusResult<T> = std::result::Result<T, ConsensusError>;
