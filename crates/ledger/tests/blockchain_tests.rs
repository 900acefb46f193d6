//! Block persistence scenarios against an in-memory store.

use neo_config::ProtocolSettings;
use neo_core::{Block, Header, Signer, Transaction, UInt256, Witness};
use neo_cryptography::ecc::ECPoint;
use neo_ledger::Blockchain;
use neo_persistence::MemoryStore;
use neo_smart_contract::native;
use neo_smart_contract::native::fungible_token::FungibleToken;
use neo_smart_contract::native::gas_token::GasToken;
use neo_vm::{OpCode, ScriptBuilder, VMState};
use num_bigint::BigInt;
use std::sync::Arc;

const GAS: i64 = 100_000_000;

fn settings() -> ProtocolSettings {
    ProtocolSettings {
        network: 0x334f454e,
        validators_count: 1,
        standby_committee: vec![ECPoint::from_private_key(&[0x42u8; 32]).unwrap()],
        ..ProtocolSettings::default()
    }
}

fn new_chain() -> Blockchain {
    Blockchain::new(Arc::new(MemoryStore::new()), settings()).unwrap()
}

fn next_block(chain: &Blockchain, transactions: Vec<Transaction>) -> Block {
    let merkle = {
        let leaves: Vec<[u8; 32]> = transactions.iter().map(|tx| *tx.hash().as_bytes()).collect();
        UInt256::from(neo_cryptography::merkle::merkle_root(&leaves))
    };
    let header = Header::new(
        0,
        chain.current_hash(),
        merkle,
        1_468_595_301_000 + (chain.height() as u64 + 1) * 15_000,
        7,
        chain.height() + 1,
        0,
        chain.next_consensus_address(),
        Witness::new(Vec::new(), vec![OpCode::Push1 as u8]),
    );
    Block::new(header, transactions)
}

#[test]
fn test_genesis_initializes_natives() {
    let chain = new_chain();
    assert_eq!(chain.height(), 0);
    assert!(!chain.current_hash().is_zero());

    let snapshot = chain.snapshot();
    let genesis_account = native::neo_token::standby_validators_account(&settings()).unwrap();

    // All NEO and the initial GAS distribution sit on the consensus account.
    assert_eq!(
        native::neo_token::NeoToken.balance_of(snapshot, &genesis_account),
        BigInt::from(native::neo_token::TOTAL_AMOUNT)
    );
    assert_eq!(
        GasToken.balance_of(snapshot, &genesis_account),
        BigInt::from(settings().initial_gas_distribution)
    );
    // The genesis PostPersist already minted one committee reward
    // (10% of the 5 GAS generated per block) on top of the distribution.
    let committee_reward = 5 * GAS / 10;
    assert_eq!(
        GasToken.total_supply(snapshot),
        BigInt::from(settings().initial_gas_distribution as i64 + committee_reward)
    );
}

#[test]
fn test_empty_block_advances_tip() {
    let chain = new_chain();
    let block = next_block(&chain, vec![]);
    let hash = block.hash();
    chain.persist(&block).unwrap();
    assert_eq!(chain.height(), 1);
    assert_eq!(chain.current_hash(), hash);
}

#[test]
fn test_wrong_prev_hash_rejected() {
    let chain = new_chain();
    let mut block = next_block(&chain, vec![]);
    block.header.prev_hash = UInt256::from([9u8; 32]);
    assert!(chain.persist(&block).is_err());
    assert_eq!(chain.height(), 0);
}

#[test]
fn test_faulted_transaction_burns_fee_and_keeps_no_state() {
    let chain = new_chain();
    let sender = native::neo_token::standby_validators_account(&settings()).unwrap();
    let balance_before = GasToken.balance_of(chain.snapshot(), &sender);

    // A script that divides by zero.
    let mut script = ScriptBuilder::new();
    script.emit_push_int(1);
    script.emit_push_int(0);
    script.emit(OpCode::Div);
    let tx = Transaction::new(
        1,
        GAS,      // system fee, burned regardless of outcome
        GAS / 2,  // network fee
        10,
        vec![Signer::global(sender)],
        vec![],
        script.into_bytes(),
        vec![Witness::empty()],
    );
    let tx_hash = tx.hash();

    let block = next_block(&chain, vec![tx]);
    let executed = chain.persist(&block).unwrap();

    // OnPersist + tx + PostPersist.
    assert_eq!(executed.len(), 3);
    let tx_result = &executed[1];
    assert_eq!(tx_result.vm_state, VMState::FAULT);
    assert!(tx_result.notifications.is_empty());
    assert!(tx_result.exception.is_some());

    // The fees left the sender even though the script faulted. The
    // network fee is re-minted to the primary, a different account.
    let balance_after = GasToken.balance_of(chain.snapshot(), &sender);
    assert_eq!(balance_before - balance_after, BigInt::from(GAS + GAS / 2));

    // The transaction still landed in the ledger with its FAULT state.
    let state = native::ledger::get_transaction_state(chain.snapshot(), &tx_hash).unwrap();
    assert_eq!(state.vm_state, VMState::FAULT);
    assert_eq!(state.block_index, 1);
}

#[test]
fn test_halted_transaction_commits_and_notifies() {
    let chain = new_chain();
    let sender = native::neo_token::standby_validators_account(&settings()).unwrap();

    // A trivially succeeding script.
    let mut script = ScriptBuilder::new();
    script.emit_push_int(1);
    let tx = Transaction::new(
        2,
        GAS,
        GAS / 2,
        10,
        vec![Signer::global(sender)],
        vec![],
        script.into_bytes(),
        vec![Witness::empty()],
    );
    let tx_hash = tx.hash();

    let block = next_block(&chain, vec![tx]);
    let executed = chain.persist(&block).unwrap();
    assert_eq!(executed[1].vm_state, VMState::HALT);

    let state = native::ledger::get_transaction_state(chain.snapshot(), &tx_hash).unwrap();
    assert_eq!(state.vm_state, VMState::HALT);
    assert!(chain.contains_transaction(&tx_hash));
}

#[test]
fn test_persisted_transactions_leave_the_pool() {
    let chain = new_chain();
    let sender = native::neo_token::standby_validators_account(&settings()).unwrap();

    let mut script = ScriptBuilder::new();
    script.emit_push_int(1);
    let tx = Transaction::new(
        3,
        GAS,
        GAS / 2,
        10,
        vec![Signer::global(sender)],
        vec![],
        script.into_bytes(),
        vec![Witness::empty()],
    );
    let tx_hash = tx.hash();

    let block = next_block(&chain, vec![tx]);
    chain.persist(&block).unwrap();
    assert!(!chain.mempool().contains(&tx_hash));
    assert!(chain.contains_transaction(&tx_hash));
}
