// Copyright (C) 2015-2025 The Neo Project.
//
// verification.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Transaction verification: the state-independent checks safe without a
//! snapshot, and the state-dependent checks run against one.

use crate::verification_context::TransactionVerificationContext;
use crate::verify_result::VerifyResult;
use neo_config::{ProtocolSettings, Hardfork, MAX_TRANSACTION_SIZE};
use neo_core::{Transaction, TransactionAttribute, UInt160};
use neo_cryptography::ecdsa;
use neo_io::Serializable;
use neo_persistence::DataCache;
use neo_smart_contract::application_engine::{ApplicationEngine, ScriptContainer};
use neo_smart_contract::contract::{parse_multisig_contract, parse_signature_contract};
use neo_smart_contract::native;
use neo_smart_contract::{CallFlags, TriggerType};
use neo_vm::{OpCode, Script, VMState};
use std::sync::Arc;

/// Checks everything that needs no chain state: size, script decoding,
/// and the signatures of recognizable witness templates.
pub fn verify_state_independent(tx: &Transaction, settings: &ProtocolSettings) -> VerifyResult {
    if tx.size() > MAX_TRANSACTION_SIZE {
        return VerifyResult::OverSize;
    }
    if Script::new_strict(tx.script().to_vec()).is_err() {
        return VerifyResult::InvalidScript;
    }

    let sign_data = tx.sign_data(settings.network);
    for (signer, witness) in tx.signers().iter().zip(tx.witnesses()) {
        let verification = &witness.verification_script;
        if verification.is_empty() {
            // Contract-based witness; only verifiable against a snapshot.
            continue;
        }
        if witness.script_hash() != signer.account {
            return VerifyResult::Invalid;
        }
        if let Some(public_key) = parse_signature_contract(verification) {
            let Some(signature) = parse_invocation_signatures(&witness.invocation_script, 1)
            else {
                return VerifyResult::InvalidSignature;
            };
            if !ecdsa::verify(&sign_data, &signature[0], &public_key) {
                return VerifyResult::InvalidSignature;
            }
        } else if let Some((m, public_keys)) = parse_multisig_contract(verification) {
            let Some(signatures) = parse_invocation_signatures(&witness.invocation_script, m)
            else {
                return VerifyResult::InvalidSignature;
            };
            if !ecdsa::verify_multisig(&sign_data, &signatures, &public_keys) {
                return VerifyResult::InvalidSignature;
            }
        }
    }
    VerifyResult::Succeed
}

/// An invocation script carrying exactly `count` 64-byte PUSHDATA1
/// signatures and nothing else.
fn parse_invocation_signatures(script: &[u8], count: usize) -> Option<Vec<Vec<u8>>> {
    let mut signatures = Vec::with_capacity(count);
    let mut position = 0;
    while position < script.len() {
        if script[position] != OpCode::PushData1 as u8 || script.get(position + 1) != Some(&64) {
            return None;
        }
        signatures.push(script.get(position + 2..position + 66)?.to_vec());
        position += 66;
    }
    (signatures.len() == count).then_some(signatures)
}

/// Checks everything that needs a snapshot: expiry window, Policy
/// blocklist, per-sender fee accounting, attribute rules and the network
/// fee covering size plus witness execution.
pub fn verify_state_dependent(
    tx: &Transaction,
    snapshot: &Arc<DataCache>,
    settings: &ProtocolSettings,
    context: &TransactionVerificationContext,
    conflicting: &[&Transaction],
) -> VerifyResult {
    // VUB must open strictly after the tip and stay within the window.
    let tip = native::ledger::current_index(snapshot).unwrap_or(0);
    let height = tip + 1;
    if tx.valid_until_block() <= tip
        || tx.valid_until_block() > tip + settings.max_valid_until_block_increment
    {
        return VerifyResult::Expired;
    }

    for signer in tx.signers() {
        if native::policy::is_blocked(snapshot, &signer.account) {
            return VerifyResult::PolicyFail;
        }
    }

    if !context.check_transaction(tx, conflicting, snapshot) {
        return VerifyResult::InsufficientFunds;
    }

    for attribute in tx.attributes() {
        if let Err(result) = verify_attribute(attribute, tx, snapshot, settings, height) {
            return result;
        }
    }

    // Network fee = size fee + attribute fees + witness execution cost.
    let attribute_fees: i64 = tx.attributes().iter().map(|a| a.network_fee()).sum();
    let size_fee = tx.size() as i64 * native::policy::fee_per_byte(snapshot);
    let mut remaining_fee = tx.network_fee() - size_fee - attribute_fees;
    if remaining_fee < 0 {
        return VerifyResult::InsufficientFunds;
    }

    match verify_witnesses(tx, snapshot, settings, remaining_fee) {
        Ok(consumed) => {
            remaining_fee -= consumed;
            if remaining_fee < 0 {
                return VerifyResult::InsufficientFunds;
            }
            VerifyResult::Succeed
        }
        Err(result) => result,
    }
}

fn verify_attribute(
    attribute: &TransactionAttribute,
    tx: &Transaction,
    snapshot: &Arc<DataCache>,
    settings: &ProtocolSettings,
    height: u32,
) -> Result<(), VerifyResult> {
    match attribute {
        TransactionAttribute::HighPriority => {
            let committee = native::neo_token::committee_address(snapshot, settings);
            if tx.signers().iter().any(|s| s.account == committee) {
                Ok(())
            } else {
                Err(VerifyResult::InvalidAttribute)
            }
        }
        TransactionAttribute::OracleResponse { id, .. } => {
            if native::oracle::get_request(snapshot, *id).is_some() {
                Ok(())
            } else {
                Err(VerifyResult::InvalidAttribute)
            }
        }
        TransactionAttribute::Conflicts { hash } => {
            // A conflict target already on chain invalidates this
            // transaction only when it shares a signer with it.
            if let Some(state) = native::ledger::get_transaction_state(snapshot, hash) {
                let on_chain_signers: Vec<UInt160> = state
                    .transaction
                    .signers()
                    .iter()
                    .map(|s| s.account)
                    .collect();
                if tx
                    .signers()
                    .iter()
                    .any(|s| on_chain_signers.contains(&s.account))
                {
                    return Err(VerifyResult::InvalidAttribute);
                }
            }
            Ok(())
        }
        TransactionAttribute::NotaryAssisted { .. } => {
            if settings.is_hardfork_enabled(Hardfork::Echidna, height) {
                Ok(())
            } else {
                Err(VerifyResult::InvalidAttribute)
            }
        }
    }
}

/// Runs every witness under the Verification trigger with `gas_limit`
/// datoshi, returning the total execution cost.
pub fn verify_witnesses(
    tx: &Transaction,
    snapshot: &Arc<DataCache>,
    settings: &ProtocolSettings,
    gas_limit: i64,
) -> Result<i64, VerifyResult> {
    let mut total = 0i64;
    for (signer, witness) in tx.signers().iter().zip(tx.witnesses()) {
        let consumed = verify_witness(tx, signer.account, witness, snapshot, settings, gas_limit - total)?;
        total += consumed;
    }
    Ok(total)
}

fn verify_witness(
    tx: &Transaction,
    account: UInt160,
    witness: &neo_core::Witness,
    snapshot: &Arc<DataCache>,
    settings: &ProtocolSettings,
    gas_limit: i64,
) -> Result<i64, VerifyResult> {
    if gas_limit < 0 {
        return Err(VerifyResult::InsufficientFunds);
    }
    let mut engine = ApplicationEngine::new(
        TriggerType::Verification,
        Some(ScriptContainer::Transaction(tx.clone())),
        snapshot.clone(),
        None,
        settings.clone(),
        gas_limit,
    );

    if witness.verification_script.is_empty() {
        // Deployed-contract witness: run the contract's `verify` method.
        let Some(contract) = native::contract_management::get_contract(snapshot, &account) else {
            return Err(VerifyResult::UnableToVerify);
        };
        let Some(method) = contract.manifest.abi.get_method_any_arity("verify").cloned() else {
            return Err(VerifyResult::UnableToVerify);
        };
        if !method.parameters.is_empty() {
            // Parameters come from the invocation script; push-only.
            if !is_push_only(&witness.invocation_script) {
                return Err(VerifyResult::Invalid);
            }
        }
        if engine
            .load_contract(&contract, &method, CallFlags::READ_ONLY, vec![], false)
            .is_err()
        {
            return Err(VerifyResult::UnableToVerify);
        }
        if !witness.invocation_script.is_empty()
            && engine
                .load_script(witness.invocation_script.clone(), CallFlags::NONE)
                .is_err()
        {
            return Err(VerifyResult::Invalid);
        }
    } else {
        if witness.script_hash() != account {
            return Err(VerifyResult::Invalid);
        }
        if Script::new_strict(witness.verification_script.clone()).is_err() {
            return Err(VerifyResult::InvalidScript);
        }
        if engine
            .load_script_with_hash(
                witness.verification_script.clone(),
                account,
                CallFlags::READ_ONLY,
                None,
                -1,
            )
            .is_err()
        {
            return Err(VerifyResult::UnableToVerify);
        }
        if !witness.invocation_script.is_empty() {
            if !is_push_only(&witness.invocation_script) {
                return Err(VerifyResult::Invalid);
            }
            if engine
                .load_script(witness.invocation_script.clone(), CallFlags::NONE)
                .is_err()
            {
                return Err(VerifyResult::Invalid);
            }
        }
    }

    if engine.execute() != VMState::HALT {
        return Err(VerifyResult::InvalidSignature);
    }
    let truthy = engine
        .result_stack()
        .peek(0)
        .map(|item| item.get_bool())
        .unwrap_or(false);
    if engine.result_stack().len() != 1 || !truthy {
        return Err(VerifyResult::InvalidSignature);
    }
    Ok(engine.fee_consumed())
}

fn is_push_only(script: &[u8]) -> bool {
    let Ok(parsed) = Script::new_strict(script.to_vec()) else {
        return false;
    };
    let mut position = 0;
    while position < parsed.len() {
        let Ok(instruction) = parsed.instruction_at(position) else {
            return false;
        };
        if instruction.opcode() as u8 > OpCode::Push16 as u8 {
            return false;
        }
        position += instruction.size();
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo_core::{Signer, Witness};
    use neo_cryptography::ecc::ECPoint;
    use neo_smart_contract::contract::{
        create_multisig_redeem_script, create_signature_redeem_script,
    };
    use neo_vm::ScriptBuilder;

    fn settings() -> ProtocolSettings {
        ProtocolSettings {
            network: 860_833_102,
            validators_count: 1,
            standby_committee: vec![ECPoint::from_private_key(&[0x42u8; 32]).unwrap()],
            ..ProtocolSettings::default()
        }
    }

    fn signed_tx(private_keys: &[[u8; 32]], m: usize) -> Transaction {
        let keys: Vec<ECPoint> = private_keys
            .iter()
            .map(|sk| ECPoint::from_private_key(sk).unwrap())
            .collect();
        let (verification, signing_keys): (Vec<u8>, Vec<[u8; 32]>) = if keys.len() == 1 {
            (
                create_signature_redeem_script(&keys[0]),
                private_keys.to_vec(),
            )
        } else {
            let script = create_multisig_redeem_script(m, &keys).unwrap();
            // Sign with the first m keys in canonical order.
            let mut sorted: Vec<[u8; 32]> = private_keys.to_vec();
            sorted.sort_by_key(|sk| ECPoint::from_private_key(sk).unwrap());
            (script, sorted[..m].to_vec())
        };
        let account = neo_core::UInt160::from(neo_cryptography::hash::hash160(&verification));

        let mut tx = Transaction::new(
            7,
            0,
            0,
            100,
            vec![Signer::called_by_entry(account)],
            vec![],
            vec![0x40],
            vec![Witness::empty()],
        );
        let sign_data = tx.sign_data(settings().network);
        let mut invocation = ScriptBuilder::new();
        for sk in &signing_keys {
            let signature = ecdsa::sign(&sign_data, sk).unwrap();
            invocation.emit_push_bytes(&signature);
        }
        tx.set_witnesses(vec![Witness::new(invocation.into_bytes(), verification)]);
        tx
    }

    #[test]
    fn test_single_sig_template_verifies() {
        let tx = signed_tx(&[[0x11u8; 32]], 1);
        assert_eq!(
            verify_state_independent(&tx, &settings()),
            VerifyResult::Succeed
        );
    }

    #[test]
    fn test_multisig_template_verifies() {
        let tx = signed_tx(&[[0x11u8; 32], [0x22u8; 32], [0x33u8; 32]], 2);
        assert_eq!(
            verify_state_independent(&tx, &settings()),
            VerifyResult::Succeed
        );
    }

    #[test]
    fn test_wrong_signature_rejected() {
        let mut tx = signed_tx(&[[0x11u8; 32]], 1);
        let verification = tx.witnesses()[0].verification_script.clone();
        // A signature by the wrong key.
        let bad_signature = ecdsa::sign(&tx.sign_data(settings().network), &[0x99u8; 32]).unwrap();
        let mut invocation = ScriptBuilder::new();
        invocation.emit_push_bytes(&bad_signature);
        tx.set_witnesses(vec![Witness::new(invocation.into_bytes(), verification)]);
        assert_eq!(
            verify_state_independent(&tx, &settings()),
            VerifyResult::InvalidSignature
        );
    }

    #[test]
    fn test_oversize_rejected() {
        let account = neo_core::UInt160::from([1u8; 20]);
        let tx = Transaction::new(
            1,
            0,
            0,
            100,
            vec![Signer::called_by_entry(account)],
            vec![],
            vec![0x0c; 60_000], // strict decode would also fail, size fails first
            vec![Witness::new(vec![0u8; 50_000], vec![])],
        );
        assert_eq!(verify_state_independent(&tx, &settings()), VerifyResult::OverSize);
    }

    #[test]
    fn test_undecodable_script_rejected() {
        let account = neo_core::UInt160::from([1u8; 20]);
        let tx = Transaction::new(
            1,
            0,
            0,
            100,
            vec![Signer::called_by_entry(account)],
            vec![],
            vec![0x42], // unknown opcode
            vec![Witness::empty()],
        );
        assert_eq!(
            verify_state_independent(&tx, &settings()),
            VerifyResult::InvalidScript
        );
    }

    #[test]
    fn test_push_only_check() {
        assert!(is_push_only(&[OpCode::Push1 as u8, OpCode::Push2 as u8]));
        assert!(!is_push_only(&[OpCode::Push1 as u8, OpCode::Add as u8]));
    }
}
