//! `System.Contract.*` system calls.

use crate::application_engine::ApplicationEngine;
use crate::call_flags::CallFlags;
use crate::contract;
use crate::native;
use crate::trigger::TriggerType;
use crate::{ContractError, ContractResult};
use neo_core::UInt160;
use neo_cryptography::ecc::ECPoint;
use neo_vm::StackItem;

pub(super) fn call(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let hash_bytes = engine.vm.pop()?.get_bytes()?;
    let method = engine.vm.pop()?.get_string()
        .map_err(|_| ContractError::invalid_operation("method name must be utf-8"))?;
    let flag_bits = engine.vm.pop_i32()?;
    let args_item = engine.vm.pop()?;

    let hash = UInt160::from_bytes(&hash_bytes)
        .map_err(|e| ContractError::invalid_operation(e.to_string()))?;
    let flags = u8::try_from(flag_bits)
        .ok()
        .and_then(CallFlags::from_bits)
        .ok_or_else(|| ContractError::invalid_operation("invalid call flags"))?;
    let StackItem::Array(list) = &args_item else {
        return Err(ContractError::invalid_operation("arguments must be an array"));
    };
    let args = list.items();

    engine.call_contract(&hash, &method, flags, args, true)
}

pub(super) fn call_native(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let version = engine.vm.pop_i32()?;
    if version != 0 {
        return Err(ContractError::invalid_operation(format!(
            "unsupported native version {version}"
        )));
    }
    let current_hash = engine.current_script_hash()?;
    let native = native::find_by_hash(&current_hash).ok_or_else(|| {
        ContractError::invalid_operation("CallNative outside a native contract")
    })?;

    // The instruction pointer sits just past this method's SYSCALL; the
    // method blocks are fixed-size, so it identifies the method.
    let ip = engine.vm.current_context()?.instruction_pointer();
    let method = native.method_by_return_address(ip).ok_or_else(|| {
        ContractError::invalid_operation(format!("no native method at offset {ip}"))
    })?;

    if let Some(hardfork) = native.active_in() {
        let height = engine.execution_height();
        if !engine.settings().is_hardfork_enabled(hardfork, height) {
            return Err(ContractError::invalid_operation(format!(
                "native contract {} is not active yet",
                native.name()
            )));
        }
    }
    engine.check_call_flags(method.required_flags, method.name)?;
    let storage_fee = method.storage_fee.saturating_mul(engine.storage_price() as i64);
    engine.add_fee(method.cpu_fee)?;
    engine.add_fee_raw(storage_fee)?;

    let mut args = Vec::with_capacity(method.parameters);
    for _ in 0..method.parameters {
        args.push(engine.vm.pop()?);
    }

    // The method may load callback contexts (e.g. `_deploy`) on top of
    // this one; its return value still belongs on the native frame.
    let native_context_id = engine.vm.current_context()?.id();
    let result = native.invoke(engine, method.name, args)?;
    match (method.has_return, result) {
        (true, Some(item)) => {
            let frame = engine
                .vm
                .invocation_stack()
                .iter()
                .find(|c| c.id() == native_context_id)
                .ok_or_else(|| {
                    ContractError::invalid_operation("native frame vanished during call")
                })?;
            frame.with_stack(|stack| stack.push(item));
            Ok(())
        }
        (true, None) => Err(ContractError::invalid_operation(format!(
            "native method {} returned nothing",
            method.name
        ))),
        (false, None) => Ok(()),
        (false, Some(_)) => Err(ContractError::invalid_operation(format!(
            "native method {} returned unexpectedly",
            method.name
        ))),
    }
}

pub(super) fn get_call_flags(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let flags = engine.current_state()?.call_flags.bits();
    engine.vm.push(StackItem::from_int(flags))?;
    Ok(())
}

pub(super) fn create_standard_account(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let key_bytes = engine.vm.pop()?.get_bytes()?;
    let key = ECPoint::from_bytes(&key_bytes)
        .map_err(|e| ContractError::invalid_operation(e.to_string()))?;
    let account = contract::create_signature_account(&key);
    engine.vm.push(StackItem::from_bytes(account.to_vec()))?;
    Ok(())
}

pub(super) fn create_multisig_account(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let m = engine.vm.pop_i32()?;
    let keys_item = engine.vm.pop()?;
    let StackItem::Array(list) = &keys_item else {
        return Err(ContractError::invalid_operation("keys must be an array"));
    };
    let mut keys = Vec::with_capacity(list.len());
    for item in list.items() {
        let bytes = item.get_bytes()?;
        keys.push(
            ECPoint::from_bytes(&bytes)
                .map_err(|e| ContractError::invalid_operation(e.to_string()))?,
        );
    }
    if m < 1 {
        return Err(ContractError::invalid_operation("invalid signature count"));
    }
    let account = contract::create_multisig_account(m as usize, &keys)?;
    engine.vm.push(StackItem::from_bytes(account.to_vec()))?;
    Ok(())
}

pub(super) fn native_on_persist(engine: &mut ApplicationEngine) -> ContractResult<()> {
    if engine.trigger() != TriggerType::OnPersist {
        return Err(ContractError::invalid_operation(
            "NativeOnPersist outside OnPersist",
        ));
    }
    let height = engine.execution_height();
    for native in native::registry() {
        if native.is_active(engine.settings(), height) {
            if height == 0 {
                native.initialize(engine)?;
            }
            native.on_persist(engine)?;
        }
    }
    Ok(())
}

pub(super) fn native_post_persist(engine: &mut ApplicationEngine) -> ContractResult<()> {
    if engine.trigger() != TriggerType::PostPersist {
        return Err(ContractError::invalid_operation(
            "NativePostPersist outside PostPersist",
        ));
    }
    let height = engine.execution_height();
    for native in native::registry() {
        if native.is_active(engine.settings(), height) {
            native.post_persist(engine)?;
        }
    }
    Ok(())
}
