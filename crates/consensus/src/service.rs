// Copyright (C) 2015-2025 The Neo Project.
//
// service.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The dBFT service: a message-driven state machine with a view timer.

use crate::context::{ConsensusContext, RoundState};
use crate::messages::{
    ChangeView, ChangeViewCompact, ChangeViewReason, Commit, CommitCompact, ConsensusMessage,
    ConsensusMessagePayload, PrepareRequest, PrepareResponse, PreparationCompact,
    RecoveryMessage, RecoveryRequest,
};
use crate::{ConsensusError, ConsensusResult, DBFT_CATEGORY};
use neo_core::{ExtensiblePayload, UInt160, Witness};
use neo_cryptography::ecc::ECPoint;
use neo_io::Serializable;
use neo_ledger::Blockchain;
use neo_smart_contract::contract::create_signature_account;
use neo_smart_contract::native;
use neo_vm::ScriptBuilder;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Signs consensus data with this validator's key. The wallet stays
/// outside the core; only this seam crosses it.
pub trait ConsensusSigner: Send + Sync {
    /// The validator public key.
    fn public_key(&self) -> ECPoint;

    /// Signs `data`, returning the 64-byte signature.
    fn sign(&self, data: &[u8]) -> ConsensusResult<Vec<u8>>;
}

/// Delivers consensus output to the gossip layer.
pub trait ConsensusNetwork: Send + Sync {
    /// Broadcasts a consensus payload.
    fn broadcast(&self, payload: ExtensiblePayload);

    /// Announces a freshly assembled block.
    fn relay_block(&self, block: neo_core::Block);
}

/// Events the service loop consumes.
#[derive(Debug)]
pub enum ConsensusEvent {
    /// The view timer fired for `(height, view)`.
    Timer {
        /// The height the timer was armed for.
        height: u32,
        /// The view the timer was armed for.
        view: u8,
    },
    /// A consensus payload arrived from the network.
    Payload(ExtensiblePayload),
    /// A block was persisted outside this service; start the next round.
    BlockPersisted,
}

struct TimerState {
    height: u32,
    view: u8,
    deadline: Instant,
}

/// The dBFT consensus service.
pub struct DbftService {
    chain: Arc<Blockchain>,
    signer: Arc<dyn ConsensusSigner>,
    network: Arc<dyn ConsensusNetwork>,
    context: Mutex<ConsensusContext>,
    timer: Mutex<TimerState>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl DbftService {
    /// Creates the service and initializes the first round.
    pub fn new(
        chain: Arc<Blockchain>,
        signer: Arc<dyn ConsensusSigner>,
        network: Arc<dyn ConsensusNetwork>,
    ) -> ConsensusResult<Self> {
        let context = Self::new_round_context(&chain, &signer)?;
        let block_time = chain.settings().time_per_block();
        let service = Self {
            chain,
            signer,
            network,
            timer: Mutex::new(TimerState {
                height: context.block_index,
                view: 0,
                deadline: Instant::now() + block_time,
            }),
            context: Mutex::new(context),
        };
        Ok(service)
    }

    fn new_round_context(
        chain: &Arc<Blockchain>,
        signer: &Arc<dyn ConsensusSigner>,
    ) -> ConsensusResult<ConsensusContext> {
        let validators =
            native::neo_token::next_block_validators(chain.snapshot(), chain.settings());
        if validators.is_empty() {
            return Err(ConsensusError::NotValidator);
        }
        let context = ConsensusContext::new(
            validators,
            Some(&signer.public_key()),
            chain.height() + 1,
            chain.current_hash(),
            chain.next_consensus_address(),
        );
        Ok(context)
    }

    /// The per-round context, for inspection.
    pub fn context(&self) -> &Mutex<ConsensusContext> {
        &self.context
    }

    fn my_account(&self) -> UInt160 {
        create_signature_account(&self.signer.public_key())
    }

    /// Arms the view timer: the base block interval, doubling per view.
    fn arm_timer(&self, height: u32, view: u8) {
        let base = self.chain.settings().time_per_block();
        let delay = base * (1u32 << view.min(6));
        let mut timer = self.timer.lock();
        timer.height = height;
        timer.view = view;
        timer.deadline = Instant::now() + delay;
    }

    /// Starts the round for the current chain tip.
    pub fn initialize(&self) -> ConsensusResult<()> {
        let fresh = Self::new_round_context(&self.chain, &self.signer)?;
        let height = fresh.block_index;
        *self.context.lock() = fresh;
        self.arm_timer(height, 0);
        debug!(height, "consensus round initialized");
        Ok(())
    }

    /// Drives the service until the event channel closes.
    pub async fn run(&self, mut events: mpsc::Receiver<ConsensusEvent>) {
        loop {
            let deadline = self.timer.lock().deadline;
            tokio::select! {
                _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {
                    let (height, view) = {
                        let timer = self.timer.lock();
                        (timer.height, timer.view)
                    };
                    if let Err(err) = self.on_timer(height, view) {
                        warn!(%err, "timer handling failed");
                    }
                    // A stale timer (height or view moved on) must not spin.
                    let mut timer = self.timer.lock();
                    if timer.deadline <= Instant::now() {
                        timer.deadline =
                            Instant::now() + self.chain.settings().time_per_block();
                    }
                }
                event = events.recv() => {
                    match event {
                        Some(ConsensusEvent::Timer { height, view }) => {
                            if let Err(err) = self.on_timer(height, view) {
                                warn!(%err, "timer handling failed");
                            }
                        }
                        Some(ConsensusEvent::Payload(payload)) => {
                            if let Err(err) = self.on_payload(&payload) {
                                debug!(%err, "payload rejected");
                            }
                        }
                        Some(ConsensusEvent::BlockPersisted) => {
                            if let Err(err) = self.initialize() {
                                warn!(%err, "round initialization failed");
                            }
                        }
                        None => return,
                    }
                }
            }
        }
    }

    /// Handles a timer expiry: the primary proposes, backups ask for a
    /// view change; either way recovery evidence is re-requested.
    pub fn on_timer(&self, height: u32, view: u8) -> ConsensusResult<()> {
        {
            let context = self.context.lock();
            if context.block_index != height || context.view_number != view {
                return Ok(());
            }
        }
        let is_primary_initial = {
            let context = self.context.lock();
            context.is_primary() && context.state == RoundState::Initial
        };
        if is_primary_initial {
            self.send_prepare_request()?;
            // With a single validator the proposal alone completes the
            // round; larger sets wait for responses.
            self.check_preparations()?;
            self.arm_timer(height, view);
            return Ok(());
        }

        let committed = self.context.lock().state == RoundState::CommitSent;
        if committed {
            // A committed node only asks the others to help it finish.
            self.broadcast_message(ConsensusMessagePayload::RecoveryRequest(RecoveryRequest {
                timestamp: now_ms(),
            }))?;
        } else {
            self.request_change_view(ChangeViewReason::Timeout)?;
        }
        self.arm_timer(height, view + 1);
        Ok(())
    }

    fn send_prepare_request(&self) -> ConsensusResult<()> {
        let request = {
            let mut context = self.context.lock();
            let request = context.make_prepare_request(
                self.chain.mempool(),
                self.chain.settings(),
                now_ms(),
                now_ms() ^ 0x5851_f42d_4c95_7f2d,
            );
            context.state = RoundState::RequestSent;
            request
        };
        info!(
            txs = request.transaction_hashes.len(),
            "broadcasting prepare request"
        );
        let payload = self.broadcast_message(ConsensusMessagePayload::PrepareRequest(request))?;
        // The primary's proposal counts as its own preparation.
        let mut context = self.context.lock();
        if let Some(my_index) = context.my_index {
            context.preparations[my_index] = Some(payload.hash());
        }
        Ok(())
    }

    fn request_change_view(&self, reason: ChangeViewReason) -> ConsensusResult<()> {
        {
            let mut context = self.context.lock();
            if context.state == RoundState::CommitSent {
                return Ok(());
            }
            let my_index = context.my_index.ok_or(ConsensusError::NotValidator)?;
            let view = context.view_number;
            context.change_views[my_index] = Some(ChangeViewCompact {
                validator_index: my_index as u8,
                original_view_number: view,
                timestamp: now_ms(),
            });
        }
        debug!(?reason, "requesting view change");
        self.broadcast_message(ConsensusMessagePayload::ChangeView(ChangeView {
            timestamp: now_ms(),
            reason,
        }))?;
        self.check_change_views()
    }

    /// Signs and broadcasts a message under the current round header.
    fn broadcast_message(
        &self,
        payload: ConsensusMessagePayload,
    ) -> ConsensusResult<ExtensiblePayload> {
        let (message, mut envelope) = {
            let context = self.context.lock();
            let my_index = context.my_index.ok_or(ConsensusError::NotValidator)?;
            let message = ConsensusMessage::new(
                context.block_index,
                my_index as u8,
                context.view_number,
                payload,
            );
            let envelope = context.make_payload(
                self.chain.settings(),
                message.to_array(),
                self.my_account(),
            );
            (message, envelope)
        };
        let signature = self
            .signer
            .sign(&envelope.sign_data(self.chain.settings().network))?;
        let mut invocation = ScriptBuilder::new();
        invocation.emit_push_bytes(&signature);
        let verification =
            neo_smart_contract::contract::create_signature_redeem_script(&self.signer.public_key());
        envelope.witness = Witness::new(invocation.into_bytes(), verification);

        debug!(message = ?message.payload, "broadcasting consensus message");
        self.network.broadcast(envelope.clone());
        Ok(envelope)
    }

    /// Handles a consensus payload from the network.
    pub fn on_payload(&self, payload: &ExtensiblePayload) -> ConsensusResult<()> {
        if payload.category != DBFT_CATEGORY {
            return Err(ConsensusError::InvalidMessage("wrong category".into()));
        }
        let message = ConsensusMessage::from_bytes(&payload.data)?;
        {
            let context = self.context.lock();
            if message.block_index != context.block_index {
                return Err(ConsensusError::InvalidMessage(format!(
                    "message height {} does not match round {}",
                    message.block_index, context.block_index
                )));
            }
            let index = message.validator_index as usize;
            let Some(validator) = context.validators.get(index) else {
                return Err(ConsensusError::InvalidMessage("invalid validator".into()));
            };
            // The payload must be authenticated by that validator's
            // account; full witness execution belongs to the relay layer.
            if payload.sender != create_signature_account(validator) {
                return Err(ConsensusError::InvalidMessage(
                    "sender does not match validator".into(),
                ));
            }
            if context.my_index == Some(index) {
                return Ok(());
            }
        }

        match message.payload.clone() {
            ConsensusMessagePayload::ChangeView(change_view) => {
                self.on_change_view(&message, change_view)
            }
            ConsensusMessagePayload::PrepareRequest(request) => {
                self.on_prepare_request(&message, request, payload.hash())
            }
            ConsensusMessagePayload::PrepareResponse(response) => {
                self.on_prepare_response(&message, response)
            }
            ConsensusMessagePayload::Commit(commit) => self.on_commit(&message, commit),
            ConsensusMessagePayload::RecoveryRequest(_) => self.on_recovery_request(),
            ConsensusMessagePayload::RecoveryMessage(recovery) => {
                self.on_recovery_message(&message, recovery)
            }
        }
    }

    fn on_change_view(
        &self,
        message: &ConsensusMessage,
        change_view: ChangeView,
    ) -> ConsensusResult<()> {
        {
            let mut context = self.context.lock();
            let index = message.validator_index as usize;
            let newer = context.change_views[index]
                .as_ref()
                .map(|existing| existing.original_view_number < message.view_number)
                .unwrap_or(true);
            if newer {
                context.change_views[index] = Some(ChangeViewCompact {
                    validator_index: message.validator_index,
                    original_view_number: message.view_number,
                    timestamp: change_view.timestamp,
                });
            }
        }
        self.check_change_views()
    }

    fn check_change_views(&self) -> ConsensusResult<()> {
        let advance_to = {
            let context = self.context.lock();
            let target = context.view_number + 1;
            (context.state != RoundState::CommitSent
                && context.change_view_count(target) >= context.m())
            .then_some(target)
        };
        if let Some(view) = advance_to {
            let height = {
                let mut context = self.context.lock();
                context.reset_for_view(view);
                context.block_index
            };
            info!(view, "view changed");
            self.arm_timer(height, view);
        }
        Ok(())
    }

    fn on_prepare_request(
        &self,
        message: &ConsensusMessage,
        request: PrepareRequest,
        payload_hash: neo_core::UInt256,
    ) -> ConsensusResult<()> {
        {
            let mut context = self.context.lock();
            if message.view_number != context.view_number {
                return Err(ConsensusError::InvalidMessage("stale view".into()));
            }
            if message.validator_index as usize != context.primary_index(context.view_number) {
                return Err(ConsensusError::InvalidMessage(
                    "prepare request not from the primary".into(),
                ));
            }
            if context.transaction_hashes.is_some() {
                return Ok(());
            }
            if request.prev_hash != context.prev_hash {
                return Err(ConsensusError::InvalidMessage("wrong previous hash".into()));
            }

            context.timestamp = request.timestamp;
            context.nonce = request.nonce;
            context.transaction_hashes = Some(request.transaction_hashes.clone());
            context.preparations[message.validator_index as usize] = Some(payload_hash);

            // Pull the proposed transactions out of the pool.
            for hash in &request.transaction_hashes {
                if let Some(tx) = self.chain.mempool().get(hash) {
                    context.transactions.insert(*hash, tx);
                }
            }
            let missing = request
                .transaction_hashes
                .iter()
                .filter(|h| !context.transactions.contains_key(h))
                .count();
            if missing > 0 {
                // The relay layer fetches them; consensus waits.
                debug!(missing, "prepare request references unknown transactions");
            }
        }

        let respond = {
            let mut context = self.context.lock();
            if context.is_backup() && context.state == RoundState::Initial {
                context.state = RoundState::ResponseSent;
                if let Some(my_index) = context.my_index {
                    context.preparations[my_index] = Some(payload_hash);
                }
                true
            } else {
                false
            }
        };
        if respond {
            self.broadcast_message(ConsensusMessagePayload::PrepareResponse(PrepareResponse {
                preparation_hash: payload_hash,
            }))?;
        }
        self.check_preparations()
    }

    fn on_prepare_response(
        &self,
        message: &ConsensusMessage,
        response: PrepareResponse,
    ) -> ConsensusResult<()> {
        {
            let mut context = self.context.lock();
            if message.view_number != context.view_number {
                return Err(ConsensusError::InvalidMessage("stale view".into()));
            }
            let primary = context.primary_index(context.view_number);
            if let Some(expected) = context.preparations[primary] {
                if expected != response.preparation_hash {
                    return Err(ConsensusError::InvalidMessage(
                        "preparation hash mismatch".into(),
                    ));
                }
            }
            context.preparations[message.validator_index as usize] =
                Some(response.preparation_hash);
        }
        self.check_preparations()
    }

    fn check_preparations(&self) -> ConsensusResult<()> {
        let commit = {
            let context = self.context.lock();
            context.preparations_complete()
                && context.state != RoundState::CommitSent
                && context.state != RoundState::BlockSent
                && context.my_index.is_some()
        };
        if commit {
            let (signature, my_index) = {
                let context = self.context.lock();
                let header = context.make_header()?;
                let data = header.sign_data(self.chain.settings().network);
                (
                    self.signer.sign(&data)?,
                    context.my_index.expect("checked above"),
                )
            };
            {
                let mut context = self.context.lock();
                context.commit_signatures[my_index] = Some(signature.clone());
                context.state = RoundState::CommitSent;
            }
            info!("broadcasting commit");
            self.broadcast_message(ConsensusMessagePayload::Commit(Commit { signature }))?;
        }
        self.check_commits()
    }

    fn on_commit(&self, message: &ConsensusMessage, commit: Commit) -> ConsensusResult<()> {
        {
            let mut context = self.context.lock();
            if message.view_number != context.view_number {
                // Commits from other views still count for recovery, but
                // only the current view assembles here.
                return Ok(());
            }
            let index = message.validator_index as usize;
            // The signature must verify before the evidence is stored.
            if context.transaction_hashes.is_some() {
                let header = context.make_header()?;
                let data = header.sign_data(self.chain.settings().network);
                let validator = context.validators[index].clone();
                if !neo_cryptography::ecdsa::verify(&data, &commit.signature, &validator) {
                    return Err(ConsensusError::InvalidMessage(
                        "invalid commit signature".into(),
                    ));
                }
            }
            context.commit_signatures[index] = Some(commit.signature);
        }
        self.check_commits()
    }

    fn check_commits(&self) -> ConsensusResult<()> {
        let ready = {
            let context = self.context.lock();
            context.state != RoundState::BlockSent
                && context.transaction_hashes.is_some()
                && context.commit_count() >= context.m()
        };
        if !ready {
            return Ok(());
        }
        let block = {
            let mut context = self.context.lock();
            let block = context.make_block(self.chain.settings().network)?;
            context.state = RoundState::BlockSent;
            block
        };
        info!(index = block.index(), hash = %block.hash(), "block accepted");
        self.chain.persist(&block)?;
        self.network.relay_block(block);
        self.initialize()
    }

    fn on_recovery_request(&self) -> ConsensusResult<()> {
        let recovery = {
            let context = self.context.lock();
            if context.my_index.is_none() {
                return Ok(());
            }
            let prepare_request = context.transaction_hashes.as_ref().map(|hashes| {
                PrepareRequest {
                    version: 0,
                    prev_hash: context.prev_hash,
                    timestamp: context.timestamp,
                    nonce: context.nonce,
                    transaction_hashes: hashes.clone(),
                }
            });
            let primary = context.primary_index(context.view_number);
            RecoveryMessage {
                change_view_messages: context.change_views.iter().flatten().cloned().collect(),
                preparation_hash: if prepare_request.is_none() {
                    context.preparations[primary]
                } else {
                    None
                },
                prepare_request,
                preparation_messages: context
                    .preparations
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.is_some())
                    .map(|(i, _)| PreparationCompact {
                        validator_index: i as u8,
                    })
                    .collect(),
                commit_messages: context
                    .commit_signatures
                    .iter()
                    .enumerate()
                    .filter_map(|(i, signature)| {
                        signature.as_ref().map(|s| CommitCompact {
                            view_number: context.view_number,
                            validator_index: i as u8,
                            signature: s.clone(),
                        })
                    })
                    .collect(),
            }
        };
        self.broadcast_message(ConsensusMessagePayload::RecoveryMessage(recovery))?;
        Ok(())
    }

    fn on_recovery_message(
        &self,
        message: &ConsensusMessage,
        recovery: RecoveryMessage,
    ) -> ConsensusResult<()> {
        {
            let mut context = self.context.lock();
            for compact in &recovery.change_view_messages {
                let index = compact.validator_index as usize;
                if index < context.n() && context.change_views[index].is_none() {
                    context.change_views[index] = Some(compact.clone());
                }
            }
        }

        // Adopt the proposal if this node missed it.
        if let Some(request) = recovery.prepare_request {
            let adopt = {
                let context = self.context.lock();
                context.transaction_hashes.is_none()
                    && message.view_number == context.view_number
            };
            if adopt {
                let mut context = self.context.lock();
                context.timestamp = request.timestamp;
                context.nonce = request.nonce;
                for hash in &request.transaction_hashes {
                    if let Some(tx) = self.chain.mempool().get(hash) {
                        context.transactions.insert(*hash, tx);
                    }
                }
                context.transaction_hashes = Some(request.transaction_hashes);
            }
        }

        {
            let mut context = self.context.lock();
            let preparation_hash = {
                let primary = context.primary_index(context.view_number);
                context.preparations[primary].or(recovery.preparation_hash)
            };
            if let Some(hash) = preparation_hash {
                for compact in &recovery.preparation_messages {
                    let index = compact.validator_index as usize;
                    if index < context.n() && context.preparations[index].is_none() {
                        context.preparations[index] = Some(hash);
                    }
                }
            }
            for compact in recovery.commit_messages {
                let index = compact.validator_index as usize;
                if index < context.n()
                    && compact.view_number == context.view_number
                    && context.commit_signatures[index].is_none()
                {
                    context.commit_signatures[index] = Some(compact.signature);
                }
            }
        }

        self.check_change_views()?;
        self.check_preparations()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo_config::ProtocolSettings;
    use neo_persistence::MemoryStore;
    use parking_lot::Mutex as PlMutex;

    struct TestSigner {
        key: [u8; 32],
    }

    impl ConsensusSigner for TestSigner {
        fn public_key(&self) -> ECPoint {
            ECPoint::from_private_key(&self.key).unwrap()
        }

        fn sign(&self, data: &[u8]) -> ConsensusResult<Vec<u8>> {
            neo_cryptography::ecdsa::sign(data, &self.key)
                .map_err(|e| ConsensusError::Signing(e.to_string()))
        }
    }

    #[derive(Default)]
    struct TestNetwork {
        payloads: PlMutex<Vec<ExtensiblePayload>>,
        blocks: PlMutex<Vec<neo_core::Block>>,
    }

    impl ConsensusNetwork for TestNetwork {
        fn broadcast(&self, payload: ExtensiblePayload) {
            self.payloads.lock().push(payload);
        }

        fn relay_block(&self, block: neo_core::Block) {
            self.blocks.lock().push(block);
        }
    }

    fn single_validator_service() -> (DbftService, Arc<TestNetwork>) {
        let key = [0x42u8; 32];
        let public_key = ECPoint::from_private_key(&key).unwrap();
        let settings = ProtocolSettings {
            network: 7,
            validators_count: 1,
            standby_committee: vec![public_key],
            ..ProtocolSettings::default()
        };
        let chain =
            Arc::new(Blockchain::new(Arc::new(MemoryStore::new()), settings).unwrap());
        let network = Arc::new(TestNetwork::default());
        let service = DbftService::new(
            chain,
            Arc::new(TestSigner { key }),
            network.clone(),
        )
        .unwrap();
        (service, network)
    }

    #[test]
    fn test_single_validator_produces_block() {
        let (service, network) = single_validator_service();
        {
            let context = service.context().lock();
            assert_eq!(context.n(), 1);
            assert_eq!(context.m(), 1);
            assert!(context.is_primary());
            assert_eq!(context.block_index, 1);
        }

        // The primary's timer fires: with n = m = 1, the proposal alone
        // completes preparations and commits, producing block 1.
        service.on_timer(1, 0).unwrap();

        let blocks = network.blocks.lock();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].index(), 1);
        // The round restarted for height 2.
        assert_eq!(service.context().lock().block_index, 2);
        // A prepare request and a commit were broadcast.
        assert!(network.payloads.lock().len() >= 2);
    }

    #[test]
    fn test_foreign_category_rejected() {
        let (service, _) = single_validator_service();
        let payload = ExtensiblePayload::new(
            "other".into(),
            0,
            10,
            UInt160::zero(),
            vec![],
            Witness::empty(),
        );
        assert!(service.on_payload(&payload).is_err());
    }
}
