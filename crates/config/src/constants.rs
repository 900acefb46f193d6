// Copyright (C) 2015-2025 The Neo Project.
//
// constants.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Network-wide constants.

/// The default address version byte for Neo N3 addresses.
pub const ADDRESS_VERSION: u8 = 0x35;

/// Milliseconds between two consecutive blocks.
pub const MILLISECONDS_PER_BLOCK: u32 = 15_000;

/// The maximum size of a serialized transaction in bytes.
pub const MAX_TRANSACTION_SIZE: usize = 102_400;

/// The maximum size of a transaction script in bytes.
pub const MAX_SCRIPT_LENGTH: usize = 65_535;

/// The maximum number of transactions a single block may carry.
pub const MAX_TRANSACTIONS_PER_BLOCK: u32 = 512;

/// The maximum serialized size of a block in bytes.
pub const MAX_BLOCK_SIZE: usize = 262_144;

/// The maximum cumulative system fee of a block, in datoshi.
pub const MAX_BLOCK_SYSTEM_FEE: i64 = 150_000_000_000;

/// The default capacity of the memory pool.
pub const MEMORY_POOL_MAX_TRANSACTIONS: i32 = 50_000;

/// The default number of blocks state stays traceable for.
pub const MAX_TRACEABLE_BLOCKS: u32 = 2_102_400;

/// The number of signers a transaction may declare.
pub const MAX_TRANSACTION_ATTRIBUTES: usize = 16;

/// The maximum number of subitems carried by a signer scope.
pub const MAX_SUBITEMS: usize = 16;

/// The maximum witness invocation or verification script size in bytes.
pub const MAX_WITNESS_SCRIPT_SIZE: usize = 1_024;

/// The amount of GAS distributed at genesis, in whole GAS.
pub const INITIAL_GAS_DISTRIBUTION: u64 = 5_200_000_000_000_000;

/// The number of datoshi making up one GAS.
pub const GAS_FACTOR: i64 = 100_000_000;

/// The maximum number of hashes carried by an inventory payload.
pub const MAX_INV_HASHES: usize = 500;
