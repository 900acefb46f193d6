// Copyright (C) 2015-2025 The Neo Project.
//
// blockchain.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The block persistence pipeline.

use crate::memory_pool::MemoryPool;
use crate::{LedgerError, LedgerResult};
use neo_config::ProtocolSettings;
use neo_core::{Block, Header, Transaction, UInt160, UInt256, Witness};
use neo_persistence::{DataCache, Store};
use neo_smart_contract::application_engine::{ApplicationEngine, NotifyEventArgs, ScriptContainer};
use neo_smart_contract::interop::interop_hash;
use neo_smart_contract::native;
use neo_smart_contract::{CallFlags, TriggerType};
use neo_vm::{ScriptBuilder, VMState};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// The genesis timestamp: 2016-07-15T15:08:21 UTC, in milliseconds.
const GENESIS_TIMESTAMP: u64 = 1_468_595_301_000;
/// The genesis nonce.
const GENESIS_NONCE: u64 = 2_083_236_893;

/// The outcome of one engine run during block application.
#[derive(Debug, Clone)]
pub struct ApplicationExecuted {
    /// The transaction hash, or `None` for the OnPersist/PostPersist runs.
    pub tx_hash: Option<UInt256>,
    /// The trigger the engine ran under.
    pub trigger: TriggerType,
    /// The final VM state.
    pub vm_state: VMState,
    /// Datoshi consumed.
    pub gas_consumed: i64,
    /// Notifications emitted; empty for faulted transactions.
    pub notifications: Vec<NotifyEventArgs>,
    /// The fault message, if any.
    pub exception: Option<String>,
}

/// Observer of applied blocks.
pub type BlockObserver = Box<dyn Fn(&Block, &[ApplicationExecuted]) + Send + Sync>;

/// The single-writer chain state: an abstract store, the bottom data
/// cache over it, and the persist pipeline.
pub struct Blockchain {
    settings: ProtocolSettings,
    snapshot: Arc<DataCache>,
    mempool: Arc<MemoryPool>,
    persist_lock: Mutex<()>,
    block_observers: Mutex<Vec<BlockObserver>>,
}

impl Blockchain {
    /// Opens the chain over `store`, creating and persisting the genesis
    /// block if the store is empty.
    pub fn new(store: Arc<dyn Store>, settings: ProtocolSettings) -> LedgerResult<Self> {
        let snapshot = Arc::new(DataCache::with_store(store));
        let mempool = Arc::new(MemoryPool::new(
            settings.memory_pool_max_transactions.max(1) as usize,
        ));
        let chain = Self {
            settings,
            snapshot,
            mempool,
            persist_lock: Mutex::new(()),
            block_observers: Mutex::new(Vec::new()),
        };
        if native::ledger::current_index(&chain.snapshot).is_none() {
            let genesis = chain.create_genesis_block()?;
            chain.persist(&genesis)?;
            info!(hash = %genesis.hash(), "genesis block persisted");
        }
        Ok(chain)
    }

    /// The protocol settings.
    pub fn settings(&self) -> &ProtocolSettings {
        &self.settings
    }

    /// The memory pool.
    pub fn mempool(&self) -> &Arc<MemoryPool> {
        &self.mempool
    }

    /// The bottom-layer cache over the store. Read-mostly callers should
    /// layer their own clone via [`DataCache::clone_cache`].
    pub fn snapshot(&self) -> &Arc<DataCache> {
        &self.snapshot
    }

    /// The current height.
    pub fn height(&self) -> u32 {
        native::ledger::current_index(&self.snapshot).unwrap_or(0)
    }

    /// The current tip hash.
    pub fn current_hash(&self) -> UInt256 {
        native::ledger::current_hash(&self.snapshot).unwrap_or_else(UInt256::zero)
    }

    /// Whether the chain contains a transaction.
    pub fn contains_transaction(&self, hash: &UInt256) -> bool {
        native::ledger::contains_transaction(&self.snapshot, hash)
    }

    /// Registers a block observer.
    pub fn on_block_persisted(&self, observer: BlockObserver) {
        self.block_observers.lock().push(observer);
    }

    /// The deterministic genesis block.
    pub fn create_genesis_block(&self) -> LedgerResult<Block> {
        let next_consensus = native::neo_token::standby_validators_account(&self.settings)
            .map_err(LedgerError::Contract)?;
        let mut witness_script = ScriptBuilder::new();
        witness_script.emit(neo_vm::OpCode::Push1);
        let header = Header::new(
            0,
            UInt256::zero(),
            UInt256::zero(),
            GENESIS_TIMESTAMP,
            GENESIS_NONCE,
            0,
            0,
            next_consensus,
            Witness::new(Vec::new(), witness_script.into_bytes()),
        );
        Ok(Block::new(header, Vec::new()))
    }

    /// Applies a block: OnPersist, each transaction, PostPersist, then an
    /// atomic commit and a pool update.
    pub fn persist(&self, block: &Block) -> LedgerResult<Vec<ApplicationExecuted>> {
        let _guard = self.persist_lock.lock();

        if block.index() > 0 {
            let tip_hash = self.current_hash();
            let tip_index = self.height();
            if block.header.prev_hash != tip_hash {
                return Err(LedgerError::InvalidBlock(format!(
                    "previous hash {} does not match tip {tip_hash}",
                    block.header.prev_hash
                )));
            }
            if block.index() != tip_index + 1 {
                return Err(LedgerError::InvalidBlock(format!(
                    "index {} does not follow tip {tip_index}",
                    block.index()
                )));
            }
        }
        if block.compute_merkle_root() != block.header.merkle_root {
            return Err(LedgerError::InvalidBlock("merkle root mismatch".into()));
        }

        let block_cache = Arc::new(self.snapshot.clone_cache());
        let mut executed = Vec::with_capacity(block.transactions.len() + 2);

        // OnPersist: native hooks, ledger rows, fee burning.
        executed.push(self.run_lifecycle(
            block,
            &block_cache,
            TriggerType::OnPersist,
            "System.Contract.NativeOnPersist",
        )?);

        // Transactions, each in its own child cache.
        for tx in &block.transactions {
            executed.push(self.run_transaction(block, &block_cache, tx)?);
        }

        // PostPersist: committee rewards.
        executed.push(self.run_lifecycle(
            block,
            &block_cache,
            TriggerType::PostPersist,
            "System.Contract.NativePostPersist",
        )?);

        // Commit the block-scoped changes down to the store.
        block_cache.commit();
        self.snapshot.commit();

        self.mempool
            .update_pool_for_block_persisted(block, &self.snapshot, &self.settings);

        for observer in self.block_observers.lock().iter() {
            observer(block, &executed);
        }
        debug!(index = block.index(), txs = block.transactions.len(), "block persisted");
        Ok(executed)
    }

    fn run_lifecycle(
        &self,
        block: &Block,
        block_cache: &Arc<DataCache>,
        trigger: TriggerType,
        syscall: &str,
    ) -> LedgerResult<ApplicationExecuted> {
        let mut script = ScriptBuilder::new();
        script.emit_syscall(interop_hash(syscall));
        let mut engine = ApplicationEngine::new(
            trigger,
            Some(ScriptContainer::Block(block.clone())),
            block_cache.clone(),
            Some(block.clone()),
            self.settings.clone(),
            i64::MAX,
        );
        engine
            .load_script(script.into_bytes(), CallFlags::ALL)
            .map_err(LedgerError::Contract)?;
        let state = engine.execute();
        if state != VMState::HALT {
            // A failing lifecycle hook poisons the whole block.
            return Err(LedgerError::InvariantViolation(format!(
                "{trigger:?} faulted: {}",
                engine.fault_message().unwrap_or("unknown")
            )));
        }
        Ok(ApplicationExecuted {
            tx_hash: None,
            trigger,
            vm_state: state,
            gas_consumed: engine.fee_consumed(),
            notifications: engine.notifications().to_vec(),
            exception: None,
        })
    }

    fn run_transaction(
        &self,
        block: &Block,
        block_cache: &Arc<DataCache>,
        tx: &Transaction,
    ) -> LedgerResult<ApplicationExecuted> {
        let tx_cache = Arc::new(block_cache.clone_cache());
        let mut engine = ApplicationEngine::new(
            TriggerType::Application,
            Some(ScriptContainer::Transaction(tx.clone())),
            tx_cache.clone(),
            Some(block.clone()),
            self.settings.clone(),
            tx.system_fee(),
        );
        engine
            .load_script(tx.script().to_vec(), CallFlags::ALL)
            .map_err(LedgerError::Contract)?;
        let state = engine.execute();

        let (notifications, exception) = match state {
            VMState::HALT => {
                // The transaction's writes become visible to later ones.
                tx_cache.commit();
                (engine.notifications().to_vec(), None)
            }
            _ => {
                // A faulted transaction discards its writes and keeps its
                // notifications to itself; the fee burn from OnPersist
                // stands.
                (
                    Vec::new(),
                    Some(
                        engine
                            .fault_message()
                            .unwrap_or("transaction faulted")
                            .to_string(),
                    ),
                )
            }
        };
        native::ledger::update_transaction_state(block_cache, &tx.hash(), state);

        Ok(ApplicationExecuted {
            tx_hash: Some(tx.hash()),
            trigger: TriggerType::Application,
            vm_state: state,
            gas_consumed: engine.fee_consumed(),
            notifications,
            exception,
        })
    }

    /// The consensus address of the current validator set, for header
    /// verification by the outer node.
    pub fn next_consensus_address(&self) -> UInt160 {
        let validators = native::neo_token::next_block_validators(&self.snapshot, &self.settings);
        if validators.is_empty() {
            return UInt160::zero();
        }
        let m = validators.len() - (validators.len() - 1) / 3;
        neo_smart_contract::contract::create_multisig_account(m, &validators)
            .unwrap_or_else(|_| UInt160::zero())
    }
}
