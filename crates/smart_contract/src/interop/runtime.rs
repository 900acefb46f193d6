//! `System.Runtime.*` system calls.

use crate::application_engine::{ApplicationEngine, ScriptContainer};
use crate::{ContractError, ContractResult};
use neo_core::UInt160;
use neo_vm::StackItem;

pub(super) fn platform(engine: &mut ApplicationEngine) -> ContractResult<()> {
    engine.vm.push(StackItem::from_bytes(b"NEO".to_vec()))?;
    Ok(())
}

pub(super) fn get_network(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let network = engine.settings().network;
    engine.vm.push(StackItem::from_int(network))?;
    Ok(())
}

pub(super) fn get_trigger(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let trigger = engine.trigger() as u8;
    engine.vm.push(StackItem::from_int(trigger))?;
    Ok(())
}

pub(super) fn get_time(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let timestamp = engine
        .persisting_block()
        .map(|b| b.header.timestamp)
        .ok_or_else(|| ContractError::invalid_operation("no block context"))?;
    engine.vm.push(StackItem::from_int(timestamp))?;
    Ok(())
}

pub(super) fn get_script_container(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let item = match engine.container() {
        Some(ScriptContainer::Transaction(tx)) => StackItem::from_array(vec![
            StackItem::from_bytes(tx.hash().to_vec()),
            StackItem::from_int(tx.version()),
            StackItem::from_int(tx.nonce()),
            StackItem::from_bytes(tx.sender().to_vec()),
            StackItem::from_int(tx.system_fee()),
            StackItem::from_int(tx.network_fee()),
            StackItem::from_int(tx.valid_until_block()),
            StackItem::from_bytes(tx.script().to_vec()),
        ]),
        Some(_) => {
            return Err(ContractError::invalid_operation(
                "container is not a transaction",
            ))
        }
        None => return Err(ContractError::invalid_operation("no script container")),
    };
    engine.vm.push(item)?;
    Ok(())
}

pub(super) fn get_executing_script_hash(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let hash = engine.current_script_hash()?;
    engine.vm.push(StackItem::from_bytes(hash.to_vec()))?;
    Ok(())
}

pub(super) fn get_calling_script_hash(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let item = match engine.calling_script_hash() {
        Some(hash) => StackItem::from_bytes(hash.to_vec()),
        None => StackItem::Null,
    };
    engine.vm.push(item)?;
    Ok(())
}

pub(super) fn get_entry_script_hash(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let hash = engine
        .entry_script_hash()
        .ok_or_else(|| ContractError::invalid_operation("no entry context"))?;
    engine.vm.push(StackItem::from_bytes(hash.to_vec()))?;
    Ok(())
}

pub(super) fn check_witness(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let data = engine.vm.pop()?.get_bytes()?;
    let account = match data.len() {
        20 => UInt160::from_bytes(&data)
            .map_err(|e| ContractError::invalid_operation(e.to_string()))?,
        33 => {
            let key = neo_cryptography::ecc::ECPoint::from_bytes(&data)
                .map_err(|e| ContractError::invalid_operation(e.to_string()))?;
            crate::contract::create_signature_account(&key)
        }
        other => {
            return Err(ContractError::invalid_operation(format!(
                "invalid witness target of {other} bytes"
            )))
        }
    };
    let result = engine.check_witness(&account)?;
    engine.vm.push(StackItem::from_bool(result))?;
    Ok(())
}

pub(super) fn gas_left(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let left = engine.gas_left();
    engine.vm.push(StackItem::from_int(left))?;
    Ok(())
}

pub(super) fn log(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let message = engine.vm.pop()?.get_string()
        .map_err(|_| ContractError::invalid_operation("log message must be utf-8"))?;
    let hash = engine.current_script_hash()?;
    engine.write_log(hash, message)
}

pub(super) fn notify(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let event_name = engine.vm.pop()?.get_string()
        .map_err(|_| ContractError::invalid_operation("event name must be utf-8"))?;
    let state_item = engine.vm.pop()?;
    let StackItem::Array(list) = &state_item else {
        return Err(ContractError::invalid_operation(
            "notification state must be an array",
        ));
    };
    if engine.notifications().len() >= crate::application_engine::MAX_NOTIFICATION_COUNT {
        return Err(ContractError::invalid_operation(
            "notification count exceeded",
        ));
    }
    // Notifications freeze their payload at emission time.
    let state = list
        .items()
        .iter()
        .map(|item| item.deep_copy(16))
        .collect::<Result<Vec<_>, _>>()?;
    let hash = engine.current_script_hash()?;
    engine.send_notification(hash, event_name, state)
}

pub(super) fn get_notifications(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let filter = engine.vm.pop()?;
    let filter_hash = if filter.is_null() {
        None
    } else {
        Some(
            UInt160::from_bytes(&filter.get_bytes()?)
                .map_err(|e| ContractError::invalid_operation(e.to_string()))?,
        )
    };
    let entries: Vec<StackItem> = engine
        .notifications()
        .iter()
        .filter(|n| filter_hash.map_or(true, |h| n.script_hash == h))
        .map(|n| {
            StackItem::from_array(vec![
                StackItem::from_bytes(n.script_hash.to_vec()),
                StackItem::from_bytes(n.event_name.as_bytes().to_vec()),
                StackItem::from_array(n.state.clone()),
            ])
        })
        .collect();
    engine.vm.push(StackItem::from_array(entries))?;
    Ok(())
}

pub(super) fn burn_gas(engine: &mut ApplicationEngine) -> ContractResult<()> {
    let amount = engine.vm.pop_int()?;
    let datoshi = i64::try_from(&amount)
        .map_err(|_| ContractError::invalid_operation("gas amount out of range"))?;
    if datoshi <= 0 {
        return Err(ContractError::invalid_operation(
            "burned gas must be positive",
        ));
    }
    engine.add_fee_raw(datoshi)
}
