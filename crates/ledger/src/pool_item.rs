//! Pool entries and their priority order.

use neo_core::Transaction;
use std::cmp::Ordering;

/// A transaction resident in the memory pool.
#[derive(Debug, Clone)]
pub struct PoolItem {
    /// The transaction.
    pub tx: Transaction,
    /// Monotonic arrival sequence, for FIFO handling of unverified items.
    pub sequence: u64,
}

impl PoolItem {
    /// Creates a pool item.
    pub fn new(tx: Transaction, sequence: u64) -> Self {
        Self { tx, sequence }
    }

    /// Compares by pool priority: fee per byte, then network fee, then
    /// hash. `Greater` means higher priority.
    pub fn compare_priority(&self, other: &Self) -> Ordering {
        self.tx
            .fee_per_byte()
            .cmp(&other.tx.fee_per_byte())
            .then_with(|| self.tx.network_fee().cmp(&other.tx.network_fee()))
            .then_with(|| self.tx.hash().cmp(&other.tx.hash()))
    }
}

impl PartialEq for PoolItem {
    fn eq(&self, other: &Self) -> bool {
        self.tx.hash() == other.tx.hash()
    }
}

impl Eq for PoolItem {}

impl Ord for PoolItem {
    /// Ascending priority: the first element of a sorted set is the
    /// eviction victim.
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare_priority(other)
    }
}

impl PartialOrd for PoolItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo_core::{Signer, UInt160, Witness};

    fn tx(nonce: u32, network_fee: i64) -> Transaction {
        Transaction::new(
            nonce,
            0,
            network_fee,
            100,
            vec![Signer::called_by_entry(UInt160::from([1u8; 20]))],
            vec![],
            vec![0x40],
            vec![Witness::empty()],
        )
    }

    #[test]
    fn test_fee_per_byte_dominates() {
        let cheap = PoolItem::new(tx(1, 100), 0);
        let rich = PoolItem::new(tx(2, 1_000_000), 1);
        assert_eq!(cheap.cmp(&rich), Ordering::Less);
    }

    #[test]
    fn test_hash_breaks_ties() {
        // Same fees, same size: distinct nonces produce distinct hashes,
        // compared by the unsigned total order of the hash.
        let a = PoolItem::new(tx(1, 100), 0);
        let b = PoolItem::new(tx(2, 100), 1);
        assert_ne!(a.cmp(&b), Ordering::Equal);
        let expected = a.tx.hash().cmp(&b.tx.hash());
        assert_eq!(a.cmp(&b), expected);
    }
}
