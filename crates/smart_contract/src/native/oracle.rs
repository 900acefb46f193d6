// Copyright (C) 2015-2025 The Neo Project.
//
// oracle.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The Oracle native contract: request bookkeeping for off-chain data.
//!
//! The HTTP fetcher lives outside the core; this contract owns the
//! request queue, the response attachment rules, and the price the
//! verification pipeline checks.

use crate::application_engine::ApplicationEngine;
use crate::key_builder::KeyBuilder;
use crate::native::{NativeContract, NativeMethod};
use crate::{ContractError, ContractResult};
use neo_config::GAS_FACTOR;
use neo_core::UInt160;
use neo_io::{BinaryWriter, MemoryReader, Serializable};
use neo_persistence::{DataCache, StorageItem};
use neo_vm::StackItem;
use num_traits::ToPrimitive;

/// The id of the Oracle contract.
pub const ID: i32 = -9;

const PREFIX_REQUEST_ID: u8 = 9;
const PREFIX_REQUEST: u8 = 7;

/// The fixed price of placing one oracle request, in datoshi.
pub const ORACLE_REQUEST_PRICE: i64 = GAS_FACTOR / 2;

/// The longest request URL accepted.
pub const MAX_URL_LENGTH: usize = 256;

/// The longest filter expression accepted.
pub const MAX_FILTER_LENGTH: usize = 128;

/// A pending oracle request.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
    /// The transaction that created the request.
    pub original_tx_hash: neo_core::UInt256,
    /// Gas reserved for the response execution.
    pub gas_for_response: i64,
    /// The requested URL.
    pub url: String,
    /// An optional JSONPath filter over the response body.
    pub filter: String,
    /// The contract awaiting the callback.
    pub callback_contract: UInt160,
    /// The callback method.
    pub callback_method: String,
    /// Caller-defined state echoed into the callback.
    pub user_data: Vec<u8>,
}

impl OracleRequest {
    fn to_bytes(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::new();
        self.original_tx_hash.serialize(&mut writer).expect("memory write");
        writer.write_i64(self.gas_for_response);
        writer.write_var_string(&self.url);
        writer.write_var_string(&self.filter);
        self.callback_contract.serialize(&mut writer).expect("memory write");
        writer.write_var_string(&self.callback_method);
        writer.write_var_bytes(&self.user_data);
        writer.into_bytes()
    }

    fn from_bytes(data: &[u8]) -> ContractResult<Self> {
        let mut reader = MemoryReader::new(data);
        Ok(Self {
            original_tx_hash: neo_core::UInt256::deserialize(&mut reader)?,
            gas_for_response: reader.read_i64()?,
            url: reader.read_var_string(MAX_URL_LENGTH)?,
            filter: reader.read_var_string(MAX_FILTER_LENGTH)?,
            callback_contract: UInt160::deserialize(&mut reader)?,
            callback_method: reader.read_var_string(32)?,
            user_data: reader.read_var_bytes(0xffff)?,
        })
    }
}

fn request_key(id: u64) -> neo_persistence::StorageKey {
    KeyBuilder::new(ID, PREFIX_REQUEST)
        .add(&id.to_be_bytes())
        .build()
}

/// Reads a pending request by id.
pub fn get_request(snapshot: &DataCache, id: u64) -> Option<OracleRequest> {
    let item = snapshot.try_get(&request_key(id))?;
    OracleRequest::from_bytes(item.value()).ok()
}

/// Removes a request once its response lands on chain.
pub fn remove_request(snapshot: &DataCache, id: u64) {
    snapshot.delete(&request_key(id));
}

fn next_request_id(snapshot: &DataCache) -> ContractResult<u64> {
    let key = KeyBuilder::new(ID, PREFIX_REQUEST_ID).build();
    let id = snapshot.get_and_change(&key, Some(&StorageItem::default), |item| {
        let current = item.as_int();
        item.add_int(&num_bigint::BigInt::from(1));
        current
    })?;
    id.to_u64()
        .ok_or_else(|| ContractError::invalid_operation("request id overflow"))
}

/// The Oracle native contract.
pub struct OracleContract;

static METHODS: &[NativeMethod] = &[
    NativeMethod::safe("getPrice", 0, 1 << 15),
    NativeMethod {
        name: "request",
        parameters: 5,
        has_return: false,
        cpu_fee: 0,
        storage_fee: 0,
        required_flags: crate::call_flags::CallFlags::STATES
            .union(crate::call_flags::CallFlags::ALLOW_NOTIFY),
        safe: false,
    },
];

impl NativeContract for OracleContract {
    fn id(&self) -> i32 {
        ID
    }

    fn name(&self) -> &'static str {
        "OracleContract"
    }

    fn methods(&self) -> &'static [NativeMethod] {
        METHODS
    }

    fn invoke(
        &self,
        engine: &mut ApplicationEngine,
        method: &str,
        args: Vec<StackItem>,
    ) -> ContractResult<Option<StackItem>> {
        match method {
            "getPrice" => Ok(Some(StackItem::from_int(ORACLE_REQUEST_PRICE))),
            "request" => {
                let url = args
                    .first()
                    .ok_or_else(|| ContractError::invalid_operation("missing url"))?
                    .get_string()
                    .map_err(|_| ContractError::invalid_operation("url must be utf-8"))?;
                if url.len() > MAX_URL_LENGTH {
                    return Err(ContractError::invalid_operation("url too long"));
                }
                let filter = match args.get(1) {
                    Some(item) if !item.is_null() => item
                        .get_string()
                        .map_err(|_| ContractError::invalid_operation("filter must be utf-8"))?,
                    _ => String::new(),
                };
                if filter.len() > MAX_FILTER_LENGTH {
                    return Err(ContractError::invalid_operation("filter too long"));
                }
                let callback_method = args
                    .get(2)
                    .ok_or_else(|| ContractError::invalid_operation("missing callback"))?
                    .get_string()
                    .map_err(|_| ContractError::invalid_operation("callback must be utf-8"))?;
                if callback_method.starts_with('_') {
                    return Err(ContractError::invalid_operation(
                        "callback cannot be a reserved method",
                    ));
                }
                let user_data = args
                    .get(3)
                    .map(|item| {
                        crate::interoperable::serialize_stack_item(item, 0xffff)
                    })
                    .transpose()?
                    .unwrap_or_default();
                let gas_for_response = args
                    .get(4)
                    .ok_or_else(|| ContractError::invalid_operation("missing response gas"))?
                    .get_integer()?
                    .to_i64()
                    .filter(|&g| g >= 10_000_000)
                    .ok_or_else(|| ContractError::invalid_operation("response gas too low"))?;

                engine.add_fee_raw(ORACLE_REQUEST_PRICE)?;
                engine.add_fee_raw(gas_for_response)?;

                let tx_hash = match engine.container() {
                    Some(crate::application_engine::ScriptContainer::Transaction(tx)) => tx.hash(),
                    _ => {
                        return Err(ContractError::invalid_operation(
                            "oracle requests need a transaction",
                        ))
                    }
                };
                let callback_contract = engine
                    .calling_script_hash()
                    .ok_or_else(|| ContractError::invalid_operation("request outside a contract"))?;

                let id = next_request_id(engine.snapshot())?;
                let request = OracleRequest {
                    original_tx_hash: tx_hash,
                    gas_for_response,
                    url: url.clone(),
                    filter,
                    callback_contract,
                    callback_method,
                    user_data,
                };
                engine
                    .snapshot()
                    .put(request_key(id), StorageItem::new(request.to_bytes()));

                engine.send_notification(
                    self.hash(),
                    "OracleRequest".into(),
                    vec![
                        StackItem::from_int(id),
                        StackItem::from_bytes(callback_contract.to_vec()),
                        StackItem::from_bytes(url.into_bytes()),
                    ],
                )?;
                Ok(None)
            }
            other => Err(ContractError::invalid_operation(format!(
                "unknown Oracle method {other}"
            ))),
        }
    }
}
