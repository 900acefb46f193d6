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

//! Storage abstraction and the layered data cache.
//!
//! The [`Store`] trait is the seam a key-value backend implements;
//! [`MemoryStore`] is the in-tree reference backend. [`DataCache`] layers
//! copy-on-write change tracking over a store or over another cache, and
//! commits atomically into its backing layer.

pub mod data_cache;
pub mod storage_item;
pub mod storage_key;
pub mod store;
pub mod track_state;

pub use data_cache::DataCache;
pub use storage_item::StorageItem;
pub use storage_key::StorageKey;
pub use store::{MemoryStore, SeekDirection, Store};
pub use track_state::{TrackState, Trackable};

use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The requested key does not exist.
    #[error("key not found")]
    NotFound,

    /// An `add` hit a key that already exists in this layer.
    #[error("key already exists with state {state}")]
    AlreadyExists {
        /// The conflicting tracked state.
        state: &'static str,
    },

    /// A seek prefix cannot be advanced past (all bytes 0xff).
    #[error("invalid seek prefix")]
    InvalidPrefix,
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
