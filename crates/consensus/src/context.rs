// Copyright (C) 2015-2025 The Neo Project.
//
// context.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The per-round consensus context.

use crate::messages::{ChangeViewCompact, PrepareRequest};
use crate::{ConsensusError, ConsensusResult, DBFT_CATEGORY};
use neo_config::{ProtocolSettings, MAX_BLOCK_SIZE, MAX_BLOCK_SYSTEM_FEE};
use neo_core::{Block, ExtensiblePayload, Header, Transaction, UInt160, UInt256, Witness};
use neo_cryptography::ecc::ECPoint;
use neo_cryptography::merkle::merkle_root;
use neo_io::Serializable;
use neo_ledger::MemoryPool;
use std::collections::HashMap;

/// The state a validator's round is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    /// Nothing sent yet.
    Initial,
    /// The primary sent its proposal, or a backup acknowledged one.
    RequestSent,
    /// The proposal is acknowledged; a response went out.
    ResponseSent,
    /// This validator signed the block; it may no longer change views.
    CommitSent,
    /// The block was assembled and relayed.
    BlockSent,
}

/// Everything one consensus round tracks.
pub struct ConsensusContext {
    /// The validator set, in canonical order.
    pub validators: Vec<ECPoint>,
    /// This node's seat in the validator set, if any.
    pub my_index: Option<usize>,
    /// The height being decided.
    pub block_index: u32,
    /// The current view.
    pub view_number: u8,
    /// The tip the proposed block builds on.
    pub prev_hash: UInt256,
    /// The proposed timestamp, from the prepare request.
    pub timestamp: u64,
    /// The proposed nonce.
    pub nonce: u64,
    /// The proposed transaction hashes, once a proposal is known.
    pub transaction_hashes: Option<Vec<UInt256>>,
    /// The proposed transactions themselves.
    pub transactions: HashMap<UInt256, Transaction>,
    /// The preparation-payload hash acknowledged per validator; the
    /// primary's slot holds its own proposal hash.
    pub preparations: Vec<Option<UInt256>>,
    /// Commit signatures per validator.
    pub commit_signatures: Vec<Option<Vec<u8>>>,
    /// Change-view evidence per validator.
    pub change_views: Vec<Option<ChangeViewCompact>>,
    /// Where this validator's round stands.
    pub state: RoundState,
    /// The consensus address of the next round, fixed per block.
    pub next_consensus: UInt160,
}

impl ConsensusContext {
    /// Creates the context for a new height.
    pub fn new(
        validators: Vec<ECPoint>,
        my_public_key: Option<&ECPoint>,
        block_index: u32,
        prev_hash: UInt256,
        next_consensus: UInt160,
    ) -> Self {
        let count = validators.len();
        let my_index = my_public_key.and_then(|key| validators.iter().position(|v| v == key));
        Self {
            validators,
            my_index,
            block_index,
            view_number: 0,
            prev_hash,
            timestamp: 0,
            nonce: 0,
            transaction_hashes: None,
            transactions: HashMap::new(),
            preparations: vec![None; count],
            commit_signatures: vec![None; count],
            change_views: vec![None; count],
            state: RoundState::Initial,
            next_consensus,
        }
    }

    /// The validator count.
    pub fn n(&self) -> usize {
        self.validators.len()
    }

    /// The fault tolerance: `(n - 1) / 3`.
    pub fn f(&self) -> usize {
        (self.n().saturating_sub(1)) / 3
    }

    /// The safety threshold: `n - f`.
    pub fn m(&self) -> usize {
        self.n() - self.f()
    }

    /// The primary seat of `view`: `(index - view) mod n`.
    pub fn primary_index(&self, view: u8) -> usize {
        let n = self.n() as i64;
        (((self.block_index as i64 - view as i64) % n) + n) as usize % n as usize
    }

    /// Whether this node is the primary of the current view.
    pub fn is_primary(&self) -> bool {
        self.my_index == Some(self.primary_index(self.view_number))
    }

    /// Whether this node is a backup of the current view.
    pub fn is_backup(&self) -> bool {
        matches!(self.my_index, Some(index) if index != self.primary_index(self.view_number))
    }

    /// The number of preparations seen, the primary's proposal included.
    pub fn preparation_count(&self) -> usize {
        self.preparations.iter().flatten().count()
    }

    /// The number of commits seen.
    pub fn commit_count(&self) -> usize {
        self.commit_signatures.iter().flatten().count()
    }

    /// The number of validators asking for a view above the current one.
    pub fn change_view_count(&self, target_view: u8) -> usize {
        self.change_views
            .iter()
            .flatten()
            .filter(|compact| compact.original_view_number + 1 >= target_view)
            .count()
    }

    /// Whether enough preparations arrived and every proposed transaction
    /// is on hand.
    pub fn preparations_complete(&self) -> bool {
        let Some(hashes) = &self.transaction_hashes else {
            return false;
        };
        self.preparation_count() >= self.m()
            && hashes.iter().all(|h| self.transactions.contains_key(h))
    }

    /// Moves to `view`, clearing per-view evidence. Commit evidence
    /// survives: a committed validator stays locked.
    pub fn reset_for_view(&mut self, view: u8) {
        self.view_number = view;
        self.timestamp = 0;
        self.nonce = 0;
        self.transaction_hashes = None;
        self.transactions.clear();
        self.preparations = vec![None; self.n()];
        if self.state != RoundState::CommitSent {
            self.state = RoundState::Initial;
        }
    }

    /// Assembles the primary's proposal from the pool under the block
    /// caps: count, cumulative size, cumulative system fee.
    pub fn make_prepare_request(
        &mut self,
        mempool: &MemoryPool,
        settings: &ProtocolSettings,
        timestamp: u64,
        nonce: u64,
    ) -> PrepareRequest {
        let candidates = mempool.top_verified(settings.max_transactions_per_block as usize);
        let mut hashes = Vec::new();
        let mut total_size = 0usize;
        let mut total_system_fee = 0i64;
        for tx in candidates {
            let size = tx.size();
            if total_size + size > MAX_BLOCK_SIZE {
                break;
            }
            if total_system_fee + tx.system_fee() > MAX_BLOCK_SYSTEM_FEE {
                break;
            }
            total_size += size;
            total_system_fee += tx.system_fee();
            let hash = tx.hash();
            self.transactions.insert(hash, tx);
            hashes.push(hash);
        }
        self.timestamp = timestamp;
        self.nonce = nonce;
        self.transaction_hashes = Some(hashes.clone());
        PrepareRequest {
            version: 0,
            prev_hash: self.prev_hash,
            timestamp,
            nonce,
            transaction_hashes: hashes,
        }
    }

    /// The header of the block under agreement.
    pub fn make_header(&self) -> ConsensusResult<Header> {
        let hashes = self
            .transaction_hashes
            .as_ref()
            .ok_or_else(|| ConsensusError::InvalidMessage("no proposal yet".into()))?;
        let leaves: Vec<[u8; 32]> = hashes.iter().map(|h| *h.as_bytes()).collect();
        Ok(Header::new(
            0,
            self.prev_hash,
            UInt256::from(merkle_root(&leaves)),
            self.timestamp,
            self.nonce,
            self.block_index,
            self.primary_index(self.view_number) as u8,
            self.next_consensus,
            Witness::empty(),
        ))
    }

    /// The finished block, with the multi-signature witness built from
    /// the collected commits.
    pub fn make_block(&self, network: u32) -> ConsensusResult<Block> {
        let mut header = self.make_header()?;
        let message = header.sign_data(network);

        // Pair signatures with validator keys in canonical order and keep
        // the first m.
        let mut sorted: Vec<(ECPoint, Vec<u8>)> = self
            .validators
            .iter()
            .zip(&self.commit_signatures)
            .filter_map(|(key, signature)| {
                signature.as_ref().map(|s| (key.clone(), s.clone()))
            })
            .collect();
        if sorted.len() < self.m() {
            return Err(ConsensusError::InvalidMessage(format!(
                "{} commits of {} required",
                sorted.len(),
                self.m()
            )));
        }
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        sorted.truncate(self.m());
        for (key, signature) in &sorted {
            if !neo_cryptography::ecdsa::verify(&message, signature, key) {
                return Err(ConsensusError::InvalidMessage(
                    "invalid commit signature".into(),
                ));
            }
        }

        let verification = neo_smart_contract::contract::create_multisig_redeem_script(
            self.m(),
            &self.validators,
        )
        .map_err(|e| ConsensusError::InvalidMessage(e.to_string()))?;
        let mut invocation = neo_vm::ScriptBuilder::new();
        for (_, signature) in &sorted {
            invocation.emit_push_bytes(signature);
        }
        header.witness = Witness::new(invocation.into_bytes(), verification);

        let hashes = self.transaction_hashes.as_ref().expect("checked above");
        let transactions = hashes
            .iter()
            .map(|h| {
                self.transactions.get(h).cloned().ok_or_else(|| {
                    ConsensusError::InvalidMessage(format!("missing transaction {h}"))
                })
            })
            .collect::<ConsensusResult<Vec<_>>>()?;
        Ok(Block::new(header, transactions))
    }

    /// Wraps a serialized message in the extensible envelope this node
    /// signs and broadcasts.
    pub fn make_payload(
        &self,
        settings: &ProtocolSettings,
        data: Vec<u8>,
        sender: UInt160,
    ) -> ExtensiblePayload {
        ExtensiblePayload::new(
            DBFT_CATEGORY.into(),
            self.block_index.saturating_sub(settings.max_valid_until_block_increment),
            self.block_index + 1,
            sender,
            data,
            Witness::empty(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validators(count: usize) -> Vec<ECPoint> {
        let mut keys: Vec<ECPoint> = (1..=count as u8)
            .map(|i| ECPoint::from_private_key(&[i; 32]).unwrap())
            .collect();
        keys.sort();
        keys
    }

    fn context(count: usize, block_index: u32) -> ConsensusContext {
        let keys = validators(count);
        let me = keys[0].clone();
        ConsensusContext::new(
            keys,
            Some(&me),
            block_index,
            UInt256::zero(),
            UInt160::zero(),
        )
    }

    #[test]
    fn test_thresholds() {
        let ctx = context(7, 1);
        assert_eq!(ctx.f(), 2);
        assert_eq!(ctx.m(), 5);
        let ctx = context(4, 1);
        assert_eq!(ctx.f(), 1);
        assert_eq!(ctx.m(), 3);
    }

    #[test]
    fn test_primary_rotates_with_view() {
        let ctx = context(7, 10);
        assert_eq!(ctx.primary_index(0), 10 % 7);
        assert_eq!(ctx.primary_index(1), 9 % 7);
        // Views beyond the index wrap around instead of going negative.
        let ctx = context(7, 1);
        assert_eq!(ctx.primary_index(3), ((1i64 - 3).rem_euclid(7)) as usize);
    }

    #[test]
    fn test_change_view_counting() {
        let mut ctx = context(4, 1);
        ctx.change_views[1] = Some(ChangeViewCompact {
            validator_index: 1,
            original_view_number: 0,
            timestamp: 1,
        });
        ctx.change_views[2] = Some(ChangeViewCompact {
            validator_index: 2,
            original_view_number: 1,
            timestamp: 2,
        });
        assert_eq!(ctx.change_view_count(1), 2);
        assert_eq!(ctx.change_view_count(2), 1);
    }

    #[test]
    fn test_reset_preserves_commit_lock() {
        let mut ctx = context(4, 1);
        ctx.state = RoundState::CommitSent;
        ctx.transaction_hashes = Some(vec![]);
        ctx.reset_for_view(1);
        assert_eq!(ctx.state, RoundState::CommitSent);
        assert_eq!(ctx.view_number, 1);
        assert!(ctx.transaction_hashes.is_none());
    }
}
