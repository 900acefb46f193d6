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

//! Smart-contract execution for the Neo blockchain.
//!
//! The [`ApplicationEngine`] hosts the VM, dispatches system calls,
//! meters gas and enforces call flags and manifest permissions. The
//! [`native`] module holds the built-in contracts; [`nef`] and
//! [`manifest`] define the deployment artifacts.

pub mod application_engine;
pub mod call_flags;
pub mod contract;
pub mod contract_state;
pub mod interop;
pub mod interoperable;
pub mod key_builder;
pub mod manifest;
pub mod native;
pub mod nef;
pub mod storage_context;
pub mod trigger;

pub use application_engine::{ApplicationEngine, NotifyEventArgs, ScriptContainer};
pub use call_flags::CallFlags;
pub use contract_state::ContractState;
pub use key_builder::KeyBuilder;
pub use manifest::ContractManifest;
pub use nef::NefFile;
pub use trigger::TriggerType;

use thiserror::Error;

/// Errors raised by contract execution and the native layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ContractError {
    /// A deployment artifact failed validation.
    #[error("invalid contract: {0}")]
    InvalidContract(String),

    /// A system call or native method was used incorrectly.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The context lacks the call flags an operation requires.
    #[error("missing call flags: {0}")]
    MissingCallFlags(String),

    /// A manifest permission forbids the call.
    #[error("{0}")]
    PermissionDenied(String),

    /// The execution budget is exhausted.
    #[error("gas limit exceeded: consumed {consumed} of {limit}")]
    OutOfGas {
        /// Datoshi consumed so far.
        consumed: i64,
        /// The budget.
        limit: i64,
    },

    /// The underlying VM failed.
    #[error("vm error: {0}")]
    Vm(#[from] neo_vm::VmError),

    /// A storage operation failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A serialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ContractError {
    /// Creates an invalid-operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        ContractError::InvalidOperation(message.into())
    }

    /// Creates an invalid-contract error.
    pub fn invalid_contract(message: impl Into<String>) -> Self {
        ContractError::InvalidContract(message.into())
    }
}

impl From<neo_persistence::StorageError> for ContractError {
    fn from(err: neo_persistence::StorageError) -> Self {
        ContractError::Storage(err.to_string())
    }
}

impl From<neo_io::IoError> for ContractError {
    fn from(err: neo_io::IoError) -> Self {
        ContractError::Serialization(err.to_string())
    }
}

/// Result type for contract operations.
pub type ContractResult<T> = std::result::Result<T, ContractError>;
