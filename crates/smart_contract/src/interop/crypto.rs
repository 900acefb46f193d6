//! `System.Crypto.*` system calls.

use crate::application_engine::ApplicationEngine;
use crate::interop::CHECK_SIG_PRICE;
use crate::{ContractError, ContractResult};
use neo_cryptography::ecc::ECPoint;
use neo_cryptography::ecdsa;
use neo_vm::StackItem;

fn sign_data(engine: &ApplicationEngine) -> ContractResult<Vec<u8>> {
    let network = engine.settings().network;
    engine
        .container()
        .map(|c| c.sign_data(network))
        .ok_or_else(|| ContractError::invalid_operation("no script container to verify"))
}

pub(super) fn check_sig(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let public_key = engine.vm.pop()?.get_bytes()?;
    let signature = engine.vm.pop()?.get_bytes()?;
    let message = sign_data(engine)?;
    let result = match ECPoint::from_bytes(&public_key) {
        Ok(key) => ecdsa::verify(&message, &signature, &key),
        Err(_) => false,
    };
    engine.vm.push(StackItem::from_bool(result))?;
    Ok(())
}

pub(super) fn check_multisig(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let key_items = pop_byte_array(engine)?;
    let signature_items = pop_byte_array(engine)?;
    if key_items.is_empty() || signature_items.is_empty() {
        return Err(ContractError::invalid_operation(
            "empty multisig key or signature list",
        ));
    }
    // Priced per candidate key.
    engine.add_fee(CHECK_SIG_PRICE.saturating_mul(key_items.len() as i64))?;

    let mut keys = Vec::with_capacity(key_items.len());
    for bytes in &key_items {
        match ECPoint::from_bytes(bytes) {
            Ok(key) => keys.push(key),
            Err(_) => {
                engine.vm.push(StackItem::from_bool(false))?;
                return Ok(());
            }
        }
    }
    let message = sign_data(engine)?;
    let result = ecdsa::verify_multisig(&message, &signature_items, &keys);
    engine.vm.push(StackItem::from_bool(result))?;
    Ok(())
}

/// Accepts either an Array item or the count-prefixed form the standard
/// redeem scripts push (an integer `n` followed by `n` loose items).
/// Either way, index 0 is the first-pushed element.
fn pop_byte_array(engine: &mut ApplicationEngine) -> ContractResult<Vec<Vec<u8>>> {
    let item = engine.vm.pop()?;
    match &item {
        StackItem::Array(list) => list
            .items()
            .iter()
            .map(|i| i.get_bytes().map_err(ContractError::from))
            .collect(),
        StackItem::Integer(count) => {
            let count = i64::try_from(count)
                .ok()
                .filter(|&c| (0..=1024).contains(&c))
                .ok_or_else(|| ContractError::invalid_operation("invalid element count"))?;
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                items.push(engine.vm.pop()?.get_bytes()?);
            }
            items.reverse();
            Ok(items)
        }
        _ => Err(ContractError::invalid_operation(
            "expected an array or a count",
        )),
    }
}
