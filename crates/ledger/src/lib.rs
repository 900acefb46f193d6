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

//! The ledger: transaction verification, the memory pool and the block
//! persistence pipeline.

pub mod blockchain;
pub mod memory_pool;
pub mod pool_item;
pub mod verification;
pub mod verification_context;
pub mod verify_result;

pub use blockchain::{ApplicationExecuted, Blockchain};
pub use memory_pool::{MemoryPool, TransactionRemovalReason};
pub use pool_item::PoolItem;
pub use verification_context::TransactionVerificationContext;
pub use verify_result::VerifyResult;

use thiserror::Error;

/// Errors raised by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A block failed validation against the current tip.
    #[error("invalid block: {0}")]
    InvalidBlock(String),

    /// An internal contract was broken; the block cannot be applied.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A contract-layer failure.
    #[error("contract error: {0}")]
    Contract(#[from] neo_smart_contract::ContractError),

    /// A storage failure.
    #[error("storage error: {0}")]
    Storage(#[from] neo_persistence::StorageError),
}

/// Result type for ledger operations.
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
