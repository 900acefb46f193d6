//! `System.Storage.*` system calls.

use crate::application_engine::ApplicationEngine;
use crate::storage_context::{FindOptions, StorageContext, StorageIterator};
use crate::{ContractError, ContractResult};
use neo_persistence::{SeekDirection, StorageItem, StorageKey};
use neo_vm::StackItem;

/// The longest storage key.
pub const MAX_STORAGE_KEY_SIZE: usize = 64;

/// The longest storage value.
pub const MAX_STORAGE_VALUE_SIZE: usize = 0xffff;

fn pop_context(engine: &mut ApplicationEngine) -> ContractResult<StorageContext> {
    let item = engine.vm.pop()?;
    let StackItem::Interop(handle) = item else {
        return Err(ContractError::invalid_operation("expected a storage context"));
    };
    handle
        .as_any()
        .downcast_ref::<StorageContext>()
        .copied()
        .ok_or_else(|| ContractError::invalid_operation("expected a storage context"))
}

fn current_contract_id(engine: &ApplicationEngine) -> ContractResult<i32> {
    engine
        .current_state()?
        .contract_id
        .ok_or_else(|| ContractError::invalid_operation("context is not a deployed contract"))
}

pub(super) fn get_context(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let id = current_contract_id(engine)?;
    engine.vm.push(StackItem::from_interop(StorageContext {
        id,
        is_read_only: false,
    }))?;
    Ok(())
}

pub(super) fn get_read_only_context(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let id = current_contract_id(engine)?;
    engine.vm.push(StackItem::from_interop(StorageContext {
        id,
        is_read_only: true,
    }))?;
    Ok(())
}

pub(super) fn as_read_only(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let mut context = pop_context(engine)?;
    context.is_read_only = true;
    engine.vm.push(StackItem::from_interop(context))?;
    Ok(())
}

pub(super) fn get(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let context = pop_context(engine)?;
    let key = engine.vm.pop()?.get_bytes()?;
    let storage_key = StorageKey::new(context.id, key);
    let item = match engine.snapshot().try_get(&storage_key) {
        Some(item) => StackItem::from_bytes(item.into_value()),
        None => StackItem::Null,
    };
    engine.vm.push(item)?;
    Ok(())
}

pub(super) fn put(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let context = pop_context(engine)?;
    let key = engine.vm.pop()?.get_bytes()?;
    let value = engine.vm.pop()?.get_bytes()?;
    if context.is_read_only {
        return Err(ContractError::invalid_operation(
            "cannot write through a read-only context",
        ));
    }
    if key.len() > MAX_STORAGE_KEY_SIZE {
        return Err(ContractError::invalid_operation("storage key too long"));
    }
    if value.len() > MAX_STORAGE_VALUE_SIZE {
        return Err(ContractError::invalid_operation("storage value too long"));
    }

    let storage_key = StorageKey::new(context.id, key);
    // Charge for new bytes only: a shrinking overwrite costs one byte.
    let existing_len = engine
        .snapshot()
        .try_get(&storage_key)
        .map(|item| item.len());
    let billable = match existing_len {
        None => storage_key.key.len() + value.len(),
        Some(old_len) => value.len().saturating_sub(old_len).max(1),
    };
    engine.add_fee_raw(billable as i64 * engine.storage_price() as i64)?;

    engine.snapshot().put(storage_key, StorageItem::new(value));
    Ok(())
}

pub(super) fn delete(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let context = pop_context(engine)?;
    let key = engine.vm.pop()?.get_bytes()?;
    if context.is_read_only {
        return Err(ContractError::invalid_operation(
            "cannot delete through a read-only context",
        ));
    }
    engine.snapshot().delete(&StorageKey::new(context.id, key));
    Ok(())
}

pub(super) fn find(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let context = pop_context(engine)?;
    let prefix = engine.vm.pop()?.get_bytes()?;
    let options = u8::try_from(engine.vm.pop_i32()?)
        .map_err(|_| ContractError::invalid_operation("invalid find options"))?;
    if !FindOptions(options).is_valid() {
        return Err(ContractError::invalid_operation("invalid find options"));
    }
    let direction = if FindOptions(options).has(FindOptions::BACKWARDS) {
        SeekDirection::Backward
    } else {
        SeekDirection::Forward
    };
    let entries = engine
        .snapshot()
        .find_prefix(context.id, &prefix, direction)?;
    let prefix_length = 4 + prefix.len();
    engine.vm.push(StackItem::from_interop(StorageIterator::new(
        entries,
        prefix_length,
        options,
    )))?;
    Ok(())
}
