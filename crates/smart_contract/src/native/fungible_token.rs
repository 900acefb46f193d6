// Copyright (C) 2015-2025 The Neo Project.
//
// fungible_token.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The NEP-17 base shared by the NEO and GAS tokens.

use crate::application_engine::ApplicationEngine;
use crate::interoperable::{deserialize_stack_item, serialize_stack_item};
use crate::key_builder::KeyBuilder;
use crate::native::NativeContract;
use crate::{ContractError, ContractResult};
use neo_core::UInt160;
use neo_persistence::{DataCache, StorageItem, StorageKey};
use neo_vm::StackItem;
use num_bigint::BigInt;
use num_traits::{Signed, Zero};

/// Account-state storage prefix shared by the fungible natives.
pub const PREFIX_ACCOUNT: u8 = 20;
/// Total-supply storage prefix shared by the fungible natives.
pub const PREFIX_TOTAL_SUPPLY: u8 = 11;

/// The NEP-17 surface layered over a native contract.
///
/// Account state is a serialized struct whose field 0 is the balance;
/// tokens append their own fields after it and hook
/// [`FungibleToken::on_balance_changing`] to settle them before any
/// delta lands.
pub trait FungibleToken: NativeContract {
    /// The token symbol.
    fn symbol(&self) -> &'static str;

    /// The number of decimals.
    fn decimals(&self) -> u8;

    /// A fresh account struct; field 0 must be the zero balance.
    fn new_account_fields(&self) -> Vec<StackItem> {
        vec![StackItem::from_int(0)]
    }

    /// Hook running before `amount` is applied to `fields`.
    fn on_balance_changing(
        &self,
        _engine: &mut ApplicationEngine,
        _account: &UInt160,
        _fields: &mut Vec<StackItem>,
        _amount: &BigInt,
    ) -> ContractResult<()> {
        Ok(())
    }

    /// The storage key of an account.
    fn account_key(&self, account: &UInt160) -> StorageKey {
        KeyBuilder::new(self.id(), PREFIX_ACCOUNT)
            .add_hash(account)
            .build()
    }

    /// The storage key of the total supply.
    fn total_supply_key(&self) -> StorageKey {
        KeyBuilder::new(self.id(), PREFIX_TOTAL_SUPPLY).build()
    }

    /// The current total supply.
    fn total_supply(&self, snapshot: &DataCache) -> BigInt {
        snapshot
            .try_get(&self.total_supply_key())
            .map(|item| item.as_int())
            .unwrap_or_else(BigInt::zero)
    }

    /// The account fields, if the account exists.
    fn account_fields(&self, snapshot: &DataCache, account: &UInt160) -> Option<Vec<StackItem>> {
        let item = snapshot.try_get(&self.account_key(account))?;
        match deserialize_stack_item(item.value()).ok()? {
            StackItem::Struct(fields) => Some(fields.items()),
            _ => None,
        }
    }

    /// The balance of an account; zero when absent.
    fn balance_of(&self, snapshot: &DataCache, account: &UInt160) -> BigInt {
        self.account_fields(snapshot, account)
            .and_then(|fields| fields.first().and_then(|f| f.get_integer().ok()))
            .unwrap_or_else(BigInt::zero)
    }

    /// Applies a signed balance delta, running the settling hook first.
    /// Accounts reaching zero balance are removed.
    fn apply_balance_change(
        &self,
        engine: &mut ApplicationEngine,
        account: &UInt160,
        amount: &BigInt,
    ) -> ContractResult<()> {
        let key = self.account_key(account);
        let mut fields = match self.account_fields(engine.snapshot(), account) {
            Some(fields) => fields,
            None => {
                if amount.is_negative() {
                    return Err(ContractError::invalid_operation("insufficient balance"));
                }
                if amount.is_zero() {
                    return Ok(());
                }
                self.new_account_fields()
            }
        };
        self.on_balance_changing(engine, account, &mut fields, amount)?;

        let balance = fields
            .first()
            .ok_or_else(|| ContractError::invalid_operation("corrupt account state"))?
            .get_integer()?;
        let new_balance = &balance + amount;
        if new_balance.is_negative() {
            return Err(ContractError::invalid_operation("insufficient balance"));
        }
        if new_balance.is_zero() && self.prune_empty_accounts() {
            engine.snapshot().delete(&key);
            return Ok(());
        }
        fields[0] = StackItem::Integer(new_balance);
        let serialized = serialize_stack_item(&StackItem::from_struct(fields), usize::MAX)?;
        engine.snapshot().put(key, StorageItem::new(serialized));
        Ok(())
    }

    /// Whether zero-balance accounts are deleted from storage.
    fn prune_empty_accounts(&self) -> bool {
        true
    }

    /// Creates tokens in `account`.
    fn mint(
        &self,
        engine: &mut ApplicationEngine,
        account: &UInt160,
        amount: &BigInt,
        call_on_payment: bool,
    ) -> ContractResult<()> {
        if amount.is_negative() {
            return Err(ContractError::invalid_operation("negative mint amount"));
        }
        if amount.is_zero() {
            return Ok(());
        }
        self.apply_balance_change(engine, account, amount)?;
        let supply_key = self.total_supply_key();
        engine
            .snapshot()
            .get_and_change(&supply_key, Some(&StorageItem::default), |item| {
                item.add_int(amount)
            })?;
        self.post_transfer(engine, None, Some(*account), amount, call_on_payment)
    }

    /// Destroys tokens held by `account`.
    fn burn(
        &self,
        engine: &mut ApplicationEngine,
        account: &UInt160,
        amount: &BigInt,
    ) -> ContractResult<()> {
        if amount.is_negative() {
            return Err(ContractError::invalid_operation("negative burn amount"));
        }
        if amount.is_zero() {
            return Ok(());
        }
        self.apply_balance_change(engine, account, &(-amount))?;
        let supply_key = self.total_supply_key();
        engine
            .snapshot()
            .get_and_change(&supply_key, None, |item| item.add_int(&(-amount)))?;
        self.post_transfer(engine, Some(*account), None, amount, false)
    }

    /// The NEP-17 transfer. The sender's witness (or a direct call from
    /// the sender contract) authorizes it.
    fn transfer(
        &self,
        engine: &mut ApplicationEngine,
        from: &UInt160,
        to: &UInt160,
        amount: &BigInt,
        data: StackItem,
    ) -> ContractResult<bool> {
        if amount.is_negative() {
            return Err(ContractError::invalid_operation("negative transfer amount"));
        }
        if !engine.check_witness(from)? {
            return Ok(false);
        }
        if self.balance_of(engine.snapshot(), from) < *amount {
            return Ok(false);
        }
        if !amount.is_zero() && from != to {
            self.apply_balance_change(engine, from, &(-amount))?;
            self.apply_balance_change(engine, to, amount)?;
        } else if !amount.is_zero() {
            // Self transfer still settles pending rewards.
            self.apply_balance_change(engine, from, &BigInt::zero())?;
        }
        self.post_transfer_with_data(engine, Some(*from), Some(*to), amount, data, true)?;
        Ok(true)
    }

    /// Emits the `Transfer` notification and invokes `onNEP17Payment` on
    /// contract recipients.
    fn post_transfer(
        &self,
        engine: &mut ApplicationEngine,
        from: Option<UInt160>,
        to: Option<UInt160>,
        amount: &BigInt,
        call_on_payment: bool,
    ) -> ContractResult<()> {
        self.post_transfer_with_data(engine, from, to, amount, StackItem::Null, call_on_payment)
    }

    /// [`FungibleToken::post_transfer`] with explicit callback data.
    fn post_transfer_with_data(
        &self,
        engine: &mut ApplicationEngine,
        from: Option<UInt160>,
        to: Option<UInt160>,
        amount: &BigInt,
        data: StackItem,
        call_on_payment: bool,
    ) -> ContractResult<()> {
        let hash_item = |hash: Option<UInt160>| match hash {
            Some(hash) => StackItem::from_bytes(hash.to_vec()),
            None => StackItem::Null,
        };
        engine.send_notification(
            self.hash(),
            "Transfer".into(),
            vec![
                hash_item(from),
                hash_item(to),
                StackItem::Integer(amount.clone()),
            ],
        )?;

        if call_on_payment {
            if let Some(to) = to {
                let recipient =
                    crate::native::contract_management::get_contract(engine.snapshot(), &to);
                if let Some(recipient) = recipient {
                    let method = recipient
                        .manifest
                        .abi
                        .get_method("onNEP17Payment", 3)
                        .cloned()
                        .ok_or_else(|| {
                            ContractError::invalid_operation(format!(
                                "contract {to} does not accept NEP-17 payments"
                            ))
                        })?;
                    let args = vec![
                        hash_item(from),
                        StackItem::Integer(amount.clone()),
                        data,
                    ];
                    let flags = crate::call_flags::CallFlags::ALL;
                    engine.load_contract(&recipient, &method, flags, args, false)?;
                }
            }
        }
        Ok(())
    }
}
