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

//! IO primitives for the Neo blockchain.
//!
//! This crate provides the binary serialization layer shared by every
//! wire-facing type: a bounds-checked [`MemoryReader`], a [`BinaryWriter`]
//! and the [`Serializable`] trait with its var-int helpers.

pub mod binary_writer;
pub mod memory_reader;
pub mod serializable;

pub use binary_writer::BinaryWriter;
pub use memory_reader::MemoryReader;
pub use serializable::Serializable;

use thiserror::Error;

/// Errors produced by IO operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IoError {
    /// A read ran past the end of the input.
    #[error("end of stream: needed {needed} more bytes")]
    EndOfStream {
        /// How many additional bytes the read required.
        needed: usize,
    },

    /// The encoded data violates the format rules.
    #[error("format error in {operation}: {reason}")]
    Format {
        /// The operation that rejected the data.
        operation: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// An operation was used in an invalid way.
    #[error("invalid operation {operation}: {reason}")]
    InvalidOperation {
        /// The operation.
        operation: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl IoError {
    /// Creates a format error.
    pub fn format(operation: &'static str, reason: impl Into<String>) -> Self {
        IoError::Format {
            operation,
            reason: reason.into(),
        }
    }

    /// Creates an end-of-stream error.
    pub fn end_of_stream(needed: usize) -> Self {
        IoError::EndOfStream { needed }
    }

    /// Creates an invalid-operation error.
    pub fn invalid_operation(operation: &'static str, reason: impl Into<String>) -> Self {
        IoError::InvalidOperation {
            operation,
            reason: reason.into(),
        }
    }
}

/// Result type for IO operations.
pub type IoResult<T> = std::result::Result<T, IoError>;
