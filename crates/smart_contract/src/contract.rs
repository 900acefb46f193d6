// Copyright (C) 2015-2025 The Neo Project.
//
// contract.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Standard verification contracts: single-signature and multi-signature
//! script templates, and their recognizers.

use crate::interop::interop_hash;
use crate::{ContractError, ContractResult};
use neo_core::UInt160;
use neo_cryptography::ecc::ECPoint;
use neo_cryptography::hash::hash160;
use neo_vm::{OpCode, ScriptBuilder};

/// The name whose hash single-signature scripts invoke.
pub const CHECK_SIG: &str = "System.Crypto.CheckSig";

/// The name whose hash multi-signature scripts invoke.
pub const CHECK_MULTISIG: &str = "System.Crypto.CheckMultisig";

/// Builds the verification script for one public key:
/// `PUSHDATA(key) SYSCALL CheckSig`.
pub fn create_signature_redeem_script(public_key: &ECPoint) -> Vec<u8> {
    let mut sb = ScriptBuilder::new();
    sb.emit_push_bytes(public_key.encoded());
    sb.emit_syscall(interop_hash(CHECK_SIG));
    sb.into_bytes()
}

/// Builds the m-of-n verification script:
/// `PUSHINT(m) PUSHDATA(key)... PUSHINT(n) SYSCALL CheckMultisig`.
/// Keys are sorted into canonical order first.
pub fn create_multisig_redeem_script(
    m: usize,
    public_keys: &[ECPoint],
) -> ContractResult<Vec<u8>> {
    let n = public_keys.len();
    if m == 0 || m > n || n > 1024 {
        return Err(ContractError::invalid_operation(format!(
            "invalid multisig shape {m}-of-{n}"
        )));
    }
    let mut sorted = public_keys.to_vec();
    sorted.sort();
    let mut sb = ScriptBuilder::new();
    sb.emit_push_int(m as i64);
    for key in &sorted {
        sb.emit_push_bytes(key.encoded());
    }
    sb.emit_push_int(n as i64);
    sb.emit_syscall(interop_hash(CHECK_MULTISIG));
    Ok(sb.into_bytes())
}

/// The script hash of a single-signature account for `public_key`.
pub fn create_signature_account(public_key: &ECPoint) -> UInt160 {
    UInt160::from(hash160(&create_signature_redeem_script(public_key)))
}

/// The script hash of an m-of-n multi-signature account.
pub fn create_multisig_account(m: usize, public_keys: &[ECPoint]) -> ContractResult<UInt160> {
    Ok(UInt160::from(hash160(&create_multisig_redeem_script(
        m,
        public_keys,
    )?)))
}

/// Recognizes a single-signature template, returning the embedded key.
pub fn parse_signature_contract(script: &[u8]) -> Option<ECPoint> {
    // PUSHDATA1 33 <key> SYSCALL <4>
    if script.len() != 40 {
        return None;
    }
    if script[0] != OpCode::PushData1 as u8 || script[1] != 33 {
        return None;
    }
    if script[35] != OpCode::Syscall as u8 {
        return None;
    }
    let id = u32::from_le_bytes(script[36..40].try_into().ok()?);
    if id != interop_hash(CHECK_SIG) {
        return None;
    }
    ECPoint::from_bytes(&script[2..35]).ok()
}

/// Recognizes an m-of-n template, returning `(m, keys)`.
pub fn parse_multisig_contract(script: &[u8]) -> Option<(usize, Vec<ECPoint>)> {
    let mut position = 0;
    let m = read_small_int(script, &mut position)?;

    let mut keys = Vec::new();
    while position + 2 <= script.len()
        && script[position] == OpCode::PushData1 as u8
        && script.get(position + 1) == Some(&33)
    {
        let key_bytes = script.get(position + 2..position + 35)?;
        keys.push(ECPoint::from_bytes(key_bytes).ok()?);
        position += 35;
    }

    let n = read_small_int(script, &mut position)?;
    if script.get(position) != Some(&(OpCode::Syscall as u8)) {
        return None;
    }
    let id_bytes = script.get(position + 1..position + 5)?;
    if position + 5 != script.len() {
        return None;
    }
    let id = u32::from_le_bytes(id_bytes.try_into().ok()?);
    if id != interop_hash(CHECK_MULTISIG) {
        return None;
    }

    if n != keys.len() || m == 0 || m > n {
        return None;
    }
    Some((m, keys))
}

/// Whether the script matches the single-signature template.
pub fn is_signature_contract(script: &[u8]) -> bool {
    parse_signature_contract(script).is_some()
}

/// Whether the script matches the multi-signature template.
pub fn is_multisig_contract(script: &[u8]) -> bool {
    parse_multisig_contract(script).is_some()
}

/// Reads PUSH1..PUSH16 or PUSHINT8/16 at `position`.
fn read_small_int(script: &[u8], position: &mut usize) -> Option<usize> {
    let opcode = *script.get(*position)?;
    if (OpCode::Push1 as u8..=OpCode::Push16 as u8).contains(&opcode) {
        *position += 1;
        return Some((opcode - OpCode::Push0 as u8) as usize);
    }
    if opcode == OpCode::PushInt8 as u8 {
        let value = *script.get(*position + 1)? as usize;
        *position += 2;
        return Some(value);
    }
    if opcode == OpCode::PushInt16 as u8 {
        let bytes = script.get(*position + 1..*position + 3)?;
        let value = u16::from_le_bytes(bytes.try_into().ok()?) as usize;
        *position += 3;
        return Some(value);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(seed: u8) -> ECPoint {
        ECPoint::from_private_key(&[seed; 32]).unwrap()
    }

    #[test]
    fn test_signature_contract_round_trip() {
        let k = key(1);
        let script = create_signature_redeem_script(&k);
        assert!(is_signature_contract(&script));
        assert_eq!(parse_signature_contract(&script).unwrap(), k);
        assert!(!is_multisig_contract(&script));
    }

    #[test]
    fn test_multisig_contract_round_trip() {
        let keys: Vec<ECPoint> = (1u8..=4).map(key).collect();
        let script = create_multisig_redeem_script(2, &keys).unwrap();
        assert!(is_multisig_contract(&script));
        let (m, parsed) = parse_multisig_contract(&script).unwrap();
        assert_eq!(m, 2);
        assert_eq!(parsed.len(), 4);
        // Keys come back in canonical sorted order.
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(parsed, sorted);
        assert!(!is_signature_contract(&script));
    }

    #[test]
    fn test_invalid_shapes_rejected() {
        assert!(create_multisig_redeem_script(0, &[key(1)]).is_err());
        assert!(create_multisig_redeem_script(3, &[key(1), key(2)]).is_err());
    }

    #[test]
    fn test_tampered_script_not_recognized() {
        let k = key(1);
        let mut script = create_signature_redeem_script(&k);
        let last = script.len() - 1;
        script[last] ^= 1;
        assert!(!is_signature_contract(&script));
    }

    #[test]
    fn test_accounts_differ_per_key() {
        assert_ne!(create_signature_account(&key(1)), create_signature_account(&key(2)));
    }
}
