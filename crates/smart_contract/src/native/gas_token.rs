// Copyright (C) 2015-2025 The Neo Project.
//
// gas_token.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The GAS token: divisible utility token fueling execution.

use crate::application_engine::ApplicationEngine;
use crate::native::fungible_token::FungibleToken;
use crate::native::{neo_token, policy, NativeContract, NativeMethod};
use crate::{ContractError, ContractResult};
use neo_core::UInt160;
use neo_vm::StackItem;
use num_bigint::BigInt;

/// The id of the GAS contract.
pub const ID: i32 = -6;

/// The GAS token.
pub struct GasToken;

static METHODS: &[NativeMethod] = &[
    NativeMethod::safe("symbol", 0, 1 << 5),
    NativeMethod::safe("decimals", 0, 1 << 5),
    NativeMethod::safe("totalSupply", 0, 1 << 15),
    NativeMethod::safe("balanceOf", 1, 1 << 15),
    NativeMethod {
        name: "transfer",
        parameters: 4,
        has_return: true,
        cpu_fee: 1 << 17,
        storage_fee: 50,
        required_flags: crate::call_flags::CallFlags::STATES
            .union(crate::call_flags::CallFlags::ALLOW_CALL)
            .union(crate::call_flags::CallFlags::ALLOW_NOTIFY),
        safe: false,
    },
];

impl FungibleToken for GasToken {
    fn symbol(&self) -> &'static str {
        "GAS"
    }

    fn decimals(&self) -> u8 {
        8
    }
}

impl NativeContract for GasToken {
    fn id(&self) -> i32 {
        ID
    }

    fn name(&self) -> &'static str {
        "GasToken"
    }

    fn methods(&self) -> &'static [NativeMethod] {
        METHODS
    }

    fn initialize(&self, engine: &mut ApplicationEngine) -> ContractResult<()> {
        // The whole genesis distribution lands on the standby validators'
        // consensus account.
        let account = neo_token::standby_validators_account(engine.settings())?;
        let amount = BigInt::from(engine.settings().initial_gas_distribution);
        self.mint(engine, &account, &amount, false)
    }

    fn on_persist(&self, engine: &mut ApplicationEngine) -> ContractResult<()> {
        let block = engine
            .persisting_block()
            .cloned()
            .ok_or_else(|| ContractError::invalid_operation("no persisting block"))?;

        let mut network_fees: i64 = 0;
        for tx in &block.transactions {
            let total = BigInt::from(tx.system_fee() + tx.network_fee());
            self.burn(engine, &tx.sender(), &total)?;
            network_fees += tx.network_fee();
        }

        if network_fees > 0 {
            let primary = primary_account(engine, &block)?;
            self.mint(engine, &primary, &BigInt::from(network_fees), false)?;
        }
        Ok(())
    }

    fn invoke(
        &self,
        engine: &mut ApplicationEngine,
        method: &str,
        args: Vec<StackItem>,
    ) -> ContractResult<Option<StackItem>> {
        match method {
            "symbol" => Ok(Some(StackItem::from_bytes(self.symbol().as_bytes().to_vec()))),
            "decimals" => Ok(Some(StackItem::from_int(self.decimals()))),
            "totalSupply" => Ok(Some(StackItem::Integer(
                self.total_supply(engine.snapshot()),
            ))),
            "balanceOf" => {
                let account = policy::account_arg(&args, 0)?;
                Ok(Some(StackItem::Integer(
                    self.balance_of(engine.snapshot(), &account),
                )))
            }
            "transfer" => {
                let from = policy::account_arg(&args, 0)?;
                let to = policy::account_arg(&args, 1)?;
                let amount = args
                    .get(2)
                    .ok_or_else(|| ContractError::invalid_operation("missing amount"))?
                    .get_integer()?;
                let data = args.get(3).cloned().unwrap_or(StackItem::Null);
                let result = self.transfer(engine, &from, &to, &amount, data)?;
                Ok(Some(StackItem::from_bool(result)))
            }
            other => Err(ContractError::invalid_operation(format!(
                "unknown GAS method {other}"
            ))),
        }
    }
}

/// The signature account of the block's primary validator.
fn primary_account(
    engine: &ApplicationEngine,
    block: &neo_core::Block,
) -> ContractResult<UInt160> {
    let validators = neo_token::next_block_validators(engine.snapshot(), engine.settings());
    let primary = validators
        .get(block.header.primary_index as usize)
        .ok_or_else(|| ContractError::invalid_operation("invalid primary index"))?;
    Ok(crate::contract::create_signature_account(primary))
}
