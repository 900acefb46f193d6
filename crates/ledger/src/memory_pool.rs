// Copyright (C) 2015-2025 The Neo Project.
//
// memory_pool.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The memory pool: verified and unverified transaction sets.

use crate::pool_item::PoolItem;
use crate::verification::{verify_state_dependent, verify_state_independent};
use crate::verification_context::TransactionVerificationContext;
use crate::verify_result::VerifyResult;
use neo_config::ProtocolSettings;
use neo_core::{Transaction, TransactionAttribute, UInt256};
use neo_persistence::DataCache;
use neo_smart_contract::native;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// Why a transaction left the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionRemovalReason {
    /// The pool was full and this transaction ranked lowest.
    CapacityExceeded,
    /// A better-paying conflicting transaction replaced it.
    Conflict,
    /// It no longer verifies against the new chain state.
    NoLongerValid,
}

/// Observer of pool removals.
pub type RemovalObserver = Box<dyn Fn(&Transaction, TransactionRemovalReason) + Send + Sync>;

struct PoolInner {
    /// Every verified transaction by hash.
    verified: HashMap<UInt256, PoolItem>,
    /// The verified set ordered by priority, lowest first.
    sorted: BTreeSet<PoolItem>,
    /// Transactions awaiting re-verification, FIFO.
    unverified: HashMap<UInt256, PoolItem>,
    unverified_order: VecDeque<UInt256>,
    /// Conflict targets declared by pooled transactions.
    conflicts: HashMap<UInt256, HashSet<UInt256>>,
    context: TransactionVerificationContext,
    sequence: u64,
}

impl PoolInner {
    fn conflict_hashes(tx: &Transaction) -> Vec<UInt256> {
        tx.attributes()
            .iter()
            .filter_map(|a| match a {
                TransactionAttribute::Conflicts { hash } => Some(*hash),
                _ => None,
            })
            .collect()
    }

    fn register_conflicts(&mut self, tx: &Transaction) {
        for target in Self::conflict_hashes(tx) {
            self.conflicts.entry(target).or_default().insert(tx.hash());
        }
    }

    fn unregister_conflicts(&mut self, tx: &Transaction) {
        for target in Self::conflict_hashes(tx) {
            if let Some(set) = self.conflicts.get_mut(&target) {
                set.remove(&tx.hash());
                if set.is_empty() {
                    self.conflicts.remove(&target);
                }
            }
        }
    }

    fn remove_verified(&mut self, hash: &UInt256) -> Option<PoolItem> {
        let item = self.verified.remove(hash)?;
        self.sorted.remove(&item);
        self.context.remove_transaction(&item.tx);
        self.unregister_conflicts(&item.tx);
        Some(item)
    }
}

/// A size-capped pool of verified transactions with conflict, sender-fee
/// and oracle accounting, plus an unverified holding area refilled on
/// every persisted block.
pub struct MemoryPool {
    capacity: usize,
    inner: Mutex<PoolInner>,
    removal_observers: Mutex<Vec<RemovalObserver>>,
}

impl MemoryPool {
    /// Creates a pool holding at most `capacity` transactions.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(PoolInner {
                verified: HashMap::new(),
                sorted: BTreeSet::new(),
                unverified: HashMap::new(),
                unverified_order: VecDeque::new(),
                conflicts: HashMap::new(),
                context: TransactionVerificationContext::new(),
                sequence: 0,
            }),
            removal_observers: Mutex::new(Vec::new()),
        }
    }

    /// The configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Verified plus unverified count.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock();
        inner.verified.len() + inner.unverified.len()
    }

    /// Whether the pool holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of verified transactions.
    pub fn verified_count(&self) -> usize {
        self.inner.lock().verified.len()
    }

    /// The number of unverified transactions.
    pub fn unverified_count(&self) -> usize {
        self.inner.lock().unverified.len()
    }

    /// Whether the pool holds `hash` in either set.
    pub fn contains(&self, hash: &UInt256) -> bool {
        let inner = self.inner.lock();
        inner.verified.contains_key(hash) || inner.unverified.contains_key(hash)
    }

    /// A clone of the pooled transaction with `hash`, from either set.
    pub fn get(&self, hash: &UInt256) -> Option<Transaction> {
        let inner = self.inner.lock();
        inner
            .verified
            .get(hash)
            .or_else(|| inner.unverified.get(hash))
            .map(|item| item.tx.clone())
    }

    /// Registers a removal observer.
    pub fn on_removed(&self, observer: RemovalObserver) {
        self.removal_observers.lock().push(observer);
    }

    fn notify_removed(&self, tx: &Transaction, reason: TransactionRemovalReason) {
        debug!(hash = %tx.hash(), ?reason, "transaction removed from pool");
        for observer in self.removal_observers.lock().iter() {
            observer(tx, reason);
        }
    }

    /// The verified transactions in descending priority order, up to
    /// `count`.
    pub fn top_verified(&self, count: usize) -> Vec<Transaction> {
        let inner = self.inner.lock();
        inner
            .sorted
            .iter()
            .rev()
            .take(count)
            .map(|item| item.tx.clone())
            .collect()
    }

    /// Attempts to add a verified transaction.
    pub fn try_add(
        &self,
        tx: Transaction,
        snapshot: &Arc<DataCache>,
        settings: &ProtocolSettings,
    ) -> VerifyResult {
        let hash = tx.hash();
        if self.contains(&hash) {
            return VerifyResult::AlreadyInPool;
        }
        if native::ledger::contains_transaction(snapshot, &hash) {
            return VerifyResult::AlreadyExists;
        }
        let result = verify_state_independent(&tx, settings);
        if !result.is_ok() {
            return result;
        }

        let mut inner = self.inner.lock();

        // Pooled transactions conflicting with this one, in either
        // direction.
        let mut conflict_hashes: HashSet<UInt256> =
            PoolInner::conflict_hashes(&tx).into_iter().collect();
        if let Some(declared_against) = inner.conflicts.get(&hash) {
            conflict_hashes.extend(declared_against.iter().copied());
        }
        let conflicting: Vec<Transaction> = conflict_hashes
            .iter()
            .filter_map(|h| inner.verified.get(h))
            .map(|item| item.tx.clone())
            .collect();

        if !conflicting.is_empty() {
            // The newcomer must outbid the aggregate network fee of what
            // it displaces.
            let displaced_fee: i64 = conflicting.iter().map(Transaction::network_fee).sum();
            if tx.network_fee() <= displaced_fee {
                return VerifyResult::HasConflicts;
            }
        }

        let conflict_refs: Vec<&Transaction> = conflicting.iter().collect();
        let result =
            verify_state_dependent(&tx, snapshot, settings, &inner.context, &conflict_refs);
        if !result.is_ok() {
            return result;
        }

        // Evict the displaced conflicts.
        for conflict in &conflicting {
            if inner.remove_verified(&conflict.hash()).is_some() {
                drop_lock_and_notify(self, &mut inner, conflict, TransactionRemovalReason::Conflict);
            }
        }

        let sequence = inner.sequence;
        inner.sequence += 1;
        let item = PoolItem::new(tx, sequence);
        inner.context.add_transaction(&item.tx);
        inner.register_conflicts(&item.tx);
        inner.verified.insert(hash, item.clone());
        inner.sorted.insert(item);

        // Capacity: evict the minimum-priority element.
        while inner.verified.len() + inner.unverified.len() > self.capacity {
            let victim = match inner.sorted.iter().next() {
                Some(lowest) => lowest.tx.hash(),
                None => break,
            };
            let evicted = inner.remove_verified(&victim);
            if let Some(evicted) = evicted {
                drop_lock_and_notify(
                    self,
                    &mut inner,
                    &evicted.tx,
                    TransactionRemovalReason::CapacityExceeded,
                );
                if victim == hash {
                    // The newcomer itself ranked lowest.
                    return VerifyResult::OutOfMemory;
                }
            }
        }

        VerifyResult::Succeed
    }

    /// Updates the pool after `block` persists: included transactions
    /// leave, survivors move to the unverified set, and the verification
    /// context is rebuilt.
    pub fn update_pool_for_block_persisted(
        &self,
        block: &neo_core::Block,
        snapshot: &Arc<DataCache>,
        settings: &ProtocolSettings,
    ) {
        let mut inner = self.inner.lock();
        for tx in &block.transactions {
            let hash = tx.hash();
            inner.remove_verified(&hash);
            if inner.unverified.remove(&hash).is_some() {
                inner.unverified_order.retain(|h| *h != hash);
            }
            // Conflict targets of a persisted tx also leave the pool.
            for target in PoolInner::conflict_hashes(tx) {
                if let Some(item) = inner.remove_verified(&target) {
                    drop_lock_and_notify(
                        self,
                        &mut inner,
                        &item.tx,
                        TransactionRemovalReason::Conflict,
                    );
                }
            }
        }

        // Everything left is unverified until it passes against the new
        // state.
        let survivors: Vec<PoolItem> = inner.sorted.iter().cloned().collect();
        inner.verified.clear();
        inner.sorted.clear();
        inner.context = TransactionVerificationContext::new();
        inner.conflicts.clear();
        for item in survivors {
            let hash = item.tx.hash();
            if !inner.unverified.contains_key(&hash) {
                inner.unverified_order.push_back(hash);
                inner.unverified.insert(hash, item);
            }
        }
        drop(inner);

        self.reverify_transactions(usize::MAX, snapshot, settings);
    }

    /// Re-verifies up to `max_count` unverified transactions against the
    /// current snapshot, dropping those that no longer pass.
    pub fn reverify_transactions(
        &self,
        max_count: usize,
        snapshot: &Arc<DataCache>,
        settings: &ProtocolSettings,
    ) {
        let mut processed = 0;
        loop {
            if processed >= max_count {
                return;
            }
            let item = {
                let mut inner = self.inner.lock();
                let Some(hash) = inner.unverified_order.pop_front() else {
                    return;
                };
                match inner.unverified.remove(&hash) {
                    Some(item) => item,
                    None => continue,
                }
            };
            processed += 1;

            let result = {
                let inner = self.inner.lock();
                verify_state_dependent(&item.tx, snapshot, settings, &inner.context, &[])
            };
            if result.is_ok() {
                let mut inner = self.inner.lock();
                let hash = item.tx.hash();
                inner.context.add_transaction(&item.tx);
                inner.register_conflicts(&item.tx);
                inner.verified.insert(hash, item.clone());
                inner.sorted.insert(item);
            } else {
                self.notify_removed(&item.tx, TransactionRemovalReason::NoLongerValid);
            }
        }
    }
}

/// Fires removal observers without holding the pool lock.
fn drop_lock_and_notify(
    pool: &MemoryPool,
    inner: &mut parking_lot::MutexGuard<'_, PoolInner>,
    tx: &Transaction,
    reason: TransactionRemovalReason,
) {
    // Observers must not reenter the pool; the guard stays held and the
    // callback list is independent of it.
    let _ = inner;
    pool.notify_removed(tx, reason);
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo_core::{Signer, UInt160, Witness};
    use neo_cryptography::ecc::ECPoint;
    use neo_cryptography::ecdsa;
    use neo_persistence::StorageItem;
    use neo_smart_contract::contract::create_signature_redeem_script;
    use neo_smart_contract::interoperable::serialize_stack_item;
    use neo_smart_contract::native::fungible_token::FungibleToken;
    use neo_smart_contract::native::gas_token::GasToken;
    use neo_vm::{ScriptBuilder, StackItem};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const GAS: i64 = 100_000_000;
    const TEST_KEY: [u8; 32] = [0x42u8; 32];

    fn settings() -> ProtocolSettings {
        ProtocolSettings {
            // Generous window so plain test transactions never expire.
            max_valid_until_block_increment: 10_000,
            ..ProtocolSettings::default()
        }
    }

    fn verification_script() -> Vec<u8> {
        let key = ECPoint::from_private_key(&TEST_KEY).unwrap();
        create_signature_redeem_script(&key)
    }

    fn sender() -> UInt160 {
        UInt160::from(neo_cryptography::hash::hash160(&verification_script()))
    }

    fn fund(snapshot: &DataCache, account: &UInt160, datoshi: i64) {
        let fields = StackItem::from_struct(vec![StackItem::from_int(datoshi)]);
        snapshot.put(
            GasToken.account_key(account),
            StorageItem::new(serialize_stack_item(&fields, usize::MAX).unwrap()),
        );
    }

    fn sign(mut tx: Transaction) -> Transaction {
        let signature = ecdsa::sign(&tx.sign_data(settings().network), &TEST_KEY).unwrap();
        let mut invocation = ScriptBuilder::new();
        invocation.emit_push_bytes(&signature);
        tx.set_witnesses(vec![Witness::new(
            invocation.into_bytes(),
            verification_script(),
        )]);
        tx
    }

    fn plain_tx(nonce: u32, network_fee: i64) -> Transaction {
        sign(Transaction::new(
            nonce,
            0,
            network_fee,
            100,
            vec![Signer::called_by_entry(sender())],
            vec![],
            vec![neo_vm::OpCode::Ret as u8],
            vec![Witness::empty()],
        ))
    }

    fn conflicting_tx(nonce: u32, network_fee: i64, target: UInt256) -> Transaction {
        sign(Transaction::new(
            nonce,
            0,
            network_fee,
            100,
            vec![Signer::called_by_entry(sender())],
            vec![TransactionAttribute::Conflicts { hash: target }],
            vec![neo_vm::OpCode::Ret as u8],
            vec![Witness::empty()],
        ))
    }

    fn funded_snapshot(gas: i64) -> Arc<DataCache> {
        let snapshot = Arc::new(DataCache::new());
        fund(&snapshot, &sender(), gas);
        snapshot
    }

    #[test]
    fn test_add_and_contains() {
        let pool = MemoryPool::new(10);
        let snapshot = funded_snapshot(1000 * GAS);
        let tx = plain_tx(1, GAS);
        assert_eq!(pool.try_add(tx.clone(), &snapshot, &settings()), VerifyResult::Succeed);
        assert!(pool.contains(&tx.hash()));
        assert_eq!(
            pool.try_add(tx, &snapshot, &settings()),
            VerifyResult::AlreadyInPool
        );
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_minimum_priority() {
        let pool = MemoryPool::new(3);
        let snapshot = funded_snapshot(100_000 * GAS);
        let evicted = Arc::new(AtomicUsize::new(0));
        let counter = evicted.clone();
        pool.on_removed(Box::new(move |_, reason| {
            if reason == TransactionRemovalReason::CapacityExceeded {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));

        let low = plain_tx(1, GAS);
        let low_hash = low.hash();
        pool.try_add(low, &snapshot, &settings());
        for nonce in 2..=4 {
            let tx = plain_tx(nonce, GAS * nonce as i64 * 10);
            assert_eq!(pool.try_add(tx, &snapshot, &settings()), VerifyResult::Succeed);
        }
        assert_eq!(pool.len(), 3);
        assert!(!pool.contains(&low_hash), "lowest priority must be evicted");
        assert_eq!(evicted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lowest_newcomer_rejected() {
        let pool = MemoryPool::new(2);
        let snapshot = funded_snapshot(100_000 * GAS);
        pool.try_add(plain_tx(1, 10 * GAS), &snapshot, &settings());
        pool.try_add(plain_tx(2, 20 * GAS), &snapshot, &settings());
        // Enough to cover size and witness costs, far below the others.
        let cheap = plain_tx(3, GAS / 10);
        assert_eq!(
            pool.try_add(cheap.clone(), &snapshot, &settings()),
            VerifyResult::OutOfMemory
        );
        assert!(!pool.contains(&cheap.hash()));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_insufficient_sender_balance() {
        let pool = MemoryPool::new(10);
        // Balance covers one transaction only.
        let snapshot = funded_snapshot(GAS + GAS / 2);
        assert_eq!(
            pool.try_add(plain_tx(1, GAS), &snapshot, &settings()),
            VerifyResult::Succeed
        );
        assert_eq!(
            pool.try_add(plain_tx(2, GAS), &snapshot, &settings()),
            VerifyResult::InsufficientFunds
        );
    }

    #[test]
    fn test_conflicts_replacement() {
        let pool = MemoryPool::new(10);
        let snapshot = funded_snapshot(1000 * GAS);
        let victim = plain_tx(1, GAS);
        let victim_hash = victim.hash();
        assert_eq!(pool.try_add(victim, &snapshot, &settings()), VerifyResult::Succeed);

        // An underbidding challenger is refused.
        let cheap_challenger = conflicting_tx(2, GAS / 2, victim_hash);
        assert_eq!(
            pool.try_add(cheap_challenger, &snapshot, &settings()),
            VerifyResult::HasConflicts
        );
        assert!(pool.contains(&victim_hash));

        // A better-paying challenger evicts the victim.
        let challenger = conflicting_tx(3, 2 * GAS, victim_hash);
        let challenger_hash = challenger.hash();
        assert_eq!(
            pool.try_add(challenger, &snapshot, &settings()),
            VerifyResult::Succeed
        );
        assert!(!pool.contains(&victim_hash));
        assert!(pool.contains(&challenger_hash));
    }

    #[test]
    fn test_top_verified_orders_by_priority() {
        let pool = MemoryPool::new(10);
        let snapshot = funded_snapshot(100_000 * GAS);
        pool.try_add(plain_tx(1, GAS), &snapshot, &settings());
        pool.try_add(plain_tx(2, 50 * GAS), &snapshot, &settings());
        pool.try_add(plain_tx(3, 10 * GAS), &snapshot, &settings());

        let top = pool.top_verified(2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].network_fee(), 50 * GAS);
        assert_eq!(top[1].network_fee(), 10 * GAS);
    }
}
