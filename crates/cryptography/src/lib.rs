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

//! Cryptographic primitives for the Neo blockchain.
//!
//! Hashing, Base58Check, elliptic-curve points and ECDSA signatures,
//! the canonical multi-signature matcher and merkle-root computation.
//! All functions here are deterministic except key generation, which
//! draws from the operating system RNG.

pub mod base58;
pub mod ecc;
pub mod ecdsa;
pub mod hash;
pub mod merkle;

pub use ecc::{ECCurve, ECPoint};

use thiserror::Error;

/// Errors produced by cryptographic operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// A point or key could not be decoded.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A signature could not be decoded or failed structural checks.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// A Base58 or Base58Check string was malformed.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    /// A checksum did not match.
    #[error("checksum mismatch")]
    ChecksumMismatch,
}

/// Result type for cryptographic operations.
pub type CryptoResult<T> = std::result::Result<T, CryptoError>;
