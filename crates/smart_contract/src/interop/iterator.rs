//! `System.Iterator.*` system calls.

use crate::application_engine::ApplicationEngine;
use crate::interoperable::deserialize_stack_item;
use crate::storage_context::{FindOptions, StorageIterator};
use crate::{ContractError, ContractResult};
use neo_vm::StackItem;
use std::sync::Arc;

fn pop_iterator(
    engine: &mut ApplicationEngine,
) -> ContractResult<Arc<dyn neo_vm::stack_item::InteropInterface>> {
    let item = engine.vm.pop()?;
    let StackItem::Interop(handle) = item else {
        return Err(ContractError::invalid_operation("expected an iterator"));
    };
    if handle.as_any().downcast_ref::<StorageIterator>().is_none() {
        return Err(ContractError::invalid_operation("expected an iterator"));
    }
    Ok(handle)
}

pub(super) fn next(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let handle = pop_iterator(engine)?;
    let iterator = handle
        .as_any()
        .downcast_ref::<StorageIterator>()
        .expect("checked above");
    let advanced = iterator.next();
    engine.vm.push(StackItem::from_bool(advanced))?;
    Ok(())
}

pub(super) fn value(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let handle = pop_iterator(engine)?;
    let iterator = handle
        .as_any()
        .downcast_ref::<StorageIterator>()
        .expect("checked above");
    let (key_bytes, item, _, options) = iterator
        .value()
        .ok_or_else(|| ContractError::invalid_operation("iterator has no current element"))?;
    let options = FindOptions(options);

    let value_item = if options.has(FindOptions::DESERIALIZE_VALUES) {
        let deserialized = deserialize_stack_item(item.value())?;
        if options.has(FindOptions::PICK_FIELD_0) {
            crate::interoperable::struct_field(&deserialized, 0)?
        } else if options.has(FindOptions::PICK_FIELD_1) {
            crate::interoperable::struct_field(&deserialized, 1)?
        } else {
            deserialized
        }
    } else {
        StackItem::from_bytes(item.into_value())
    };

    let result = if options.has(FindOptions::KEYS_ONLY) {
        StackItem::from_bytes(key_bytes)
    } else if options.has(FindOptions::VALUES_ONLY) {
        value_item
    } else {
        StackItem::from_struct(vec![StackItem::from_bytes(key_bytes), value_item])
    };
    engine.vm.push(result)?;
    Ok(())
}
