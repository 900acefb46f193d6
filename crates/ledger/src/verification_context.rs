// Copyright (C) 2015-2025 The Neo Project.
//
// verification_context.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Per-sender fee accounting across the pool.

use neo_core::{Transaction, TransactionAttribute, UInt160};
use neo_persistence::DataCache;
use neo_smart_contract::native::fungible_token::FungibleToken;
use neo_smart_contract::native::gas_token::GasToken;
use num_bigint::BigInt;
use num_traits::Zero;
use std::collections::{HashMap, HashSet};

/// Tracks the fees pool-resident transactions commit each sender to, and
/// the oracle-response ids already answered in the pool.
#[derive(Debug, Clone, Default)]
pub struct TransactionVerificationContext {
    sender_fee: HashMap<UInt160, BigInt>,
    oracle_responses: HashMap<u64, neo_core::UInt256>,
}

fn total_fee(tx: &Transaction) -> BigInt {
    let attribute_fees: i64 = tx.attributes().iter().map(|a| a.network_fee()).sum();
    BigInt::from(tx.system_fee() + tx.network_fee() + attribute_fees)
}

fn oracle_id(tx: &Transaction) -> Option<u64> {
    tx.attributes().iter().find_map(|a| match a {
        TransactionAttribute::OracleResponse { id, .. } => Some(*id),
        _ => None,
    })
}

impl TransactionVerificationContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the sender can afford `tx` on top of the fees already
    /// committed, after the fees of `conflicting` pooled transactions are
    /// released. A second oracle response for a pooled id fails.
    pub fn check_transaction(
        &self,
        tx: &Transaction,
        conflicting: &[&Transaction],
        snapshot: &DataCache,
    ) -> bool {
        if let Some(id) = oracle_id(tx) {
            if self.oracle_responses.contains_key(&id) {
                return false;
            }
        }

        let sender = tx.sender();
        let mut expected = self
            .sender_fee
            .get(&sender)
            .cloned()
            .unwrap_or_else(BigInt::zero);
        // Fees of conflicting transactions from the same sender free up.
        let mut seen = HashSet::new();
        for conflict in conflicting {
            if conflict.sender() == sender && seen.insert(conflict.hash()) {
                expected -= total_fee(conflict);
            }
        }
        expected += total_fee(tx);
        if expected.is_zero() {
            return true;
        }

        let balance = GasToken.balance_of(snapshot, &sender);
        balance >= expected
    }

    /// Records a pooled transaction.
    pub fn add_transaction(&mut self, tx: &Transaction) {
        *self
            .sender_fee
            .entry(tx.sender())
            .or_insert_with(BigInt::zero) += total_fee(tx);
        if let Some(id) = oracle_id(tx) {
            self.oracle_responses.insert(id, tx.hash());
        }
    }

    /// Releases a transaction leaving the pool.
    pub fn remove_transaction(&mut self, tx: &Transaction) {
        let sender = tx.sender();
        if let Some(fee) = self.sender_fee.get_mut(&sender) {
            *fee -= total_fee(tx);
            if fee.is_zero() {
                self.sender_fee.remove(&sender);
            }
        }
        if let Some(id) = oracle_id(tx) {
            self.oracle_responses.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo_core::{OracleResponseCode, Signer, Witness};
    use neo_persistence::StorageItem;
    use neo_smart_contract::interoperable::serialize_stack_item;
    use neo_vm::StackItem;
    use std::sync::Arc;

    fn tx_with_fees(nonce: u32, system_fee: i64, network_fee: i64) -> Transaction {
        Transaction::new(
            nonce,
            system_fee,
            network_fee,
            100,
            vec![Signer::called_by_entry(UInt160::from([1u8; 20]))],
            vec![],
            vec![0x40],
            vec![Witness::empty()],
        )
    }

    fn fund(snapshot: &DataCache, account: &UInt160, datoshi: i64) {
        let fields = StackItem::from_struct(vec![StackItem::from_int(datoshi)]);
        let key = GasToken.account_key(account);
        snapshot.put(
            key,
            StorageItem::new(serialize_stack_item(&fields, usize::MAX).unwrap()),
        );
    }

    #[test]
    fn test_sender_fee_accumulation() {
        let snapshot = Arc::new(DataCache::new());
        let sender = UInt160::from([1u8; 20]);
        // Balance of 7: two transactions of 3 fit, a third does not.
        fund(&snapshot, &sender, 7);

        let mut context = TransactionVerificationContext::new();
        let tx1 = tx_with_fees(1, 1, 2);
        let tx2 = tx_with_fees(2, 1, 2);
        let tx3 = tx_with_fees(3, 1, 2);

        assert!(context.check_transaction(&tx1, &[], &snapshot));
        context.add_transaction(&tx1);
        assert!(context.check_transaction(&tx2, &[], &snapshot));
        context.add_transaction(&tx2);
        assert!(!context.check_transaction(&tx3, &[], &snapshot));

        // A conflict releasing 3 datoshi of pending fees makes room.
        assert!(context.check_transaction(&tx3, &[&tx2], &snapshot));

        context.remove_transaction(&tx1);
        assert!(context.check_transaction(&tx3, &[], &snapshot));
    }

    #[test]
    fn test_oracle_response_uniqueness() {
        let snapshot = Arc::new(DataCache::new());
        let sender = UInt160::from([1u8; 20]);
        fund(&snapshot, &sender, 1_000_000_000);

        let oracle_tx = |nonce: u32| {
            Transaction::new(
                nonce,
                0,
                0,
                100,
                vec![Signer::called_by_entry(sender)],
                vec![TransactionAttribute::OracleResponse {
                    id: 1,
                    code: OracleResponseCode::Success,
                    result: vec![],
                }],
                vec![0x40],
                vec![Witness::empty()],
            )
        };

        let mut context = TransactionVerificationContext::new();
        let tx1 = oracle_tx(1);
        assert!(context.check_transaction(&tx1, &[], &snapshot));
        context.add_transaction(&tx1);

        let tx2 = oracle_tx(2);
        assert!(!context.check_transaction(&tx2, &[], &snapshot));

        context.remove_transaction(&tx1);
        assert!(context.check_transaction(&tx2, &[], &snapshot));
    }
}
