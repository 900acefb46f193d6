// Copyright (C) 2015-2025 The Neo Project.
//
// address.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Script-hash to address conversion.

use crate::{CoreError, CoreResult, UInt160};
use neo_cryptography::base58;

/// Renders a script hash as a Base58Check address with the given version byte.
pub fn to_address(script_hash: &UInt160, address_version: u8) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(address_version);
    payload.extend_from_slice(script_hash.as_bytes());
    base58::encode_check(&payload)
}

/// Parses a Base58Check address back into a script hash, checking the
/// version byte.
pub fn from_address(address: &str, address_version: u8) -> CoreResult<UInt160> {
    let payload = base58::decode_check(address)
        .map_err(|e| CoreError::invalid_format(format!("invalid address: {e}")))?;
    if payload.len() != 21 {
        return Err(CoreError::invalid_format(format!(
            "invalid address payload length {}",
            payload.len()
        )));
    }
    if payload[0] != address_version {
        return Err(CoreError::invalid_format(format!(
            "address version 0x{:02x} does not match 0x{:02x}",
            payload[0], address_version
        )));
    }
    UInt160::from_bytes(&payload[1..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo_config::ADDRESS_VERSION;

    #[test]
    fn test_round_trip() {
        let hash = UInt160::from([0x17u8; 20]);
        let address = to_address(&hash, ADDRESS_VERSION);
        assert!(address.starts_with('N'));
        assert_eq!(from_address(&address, ADDRESS_VERSION).unwrap(), hash);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let hash = UInt160::zero();
        let address = to_address(&hash, 0x35);
        assert!(from_address(&address, 0x17).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(from_address("not-an-address", ADDRESS_VERSION).is_err());
    }
}
