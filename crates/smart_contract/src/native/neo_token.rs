// Copyright (C) 2015-2025 The Neo Project.
//
// neo_token.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The NEO token: governance token with voting, committee election and
//! GAS reward distribution.

use crate::application_engine::ApplicationEngine;
use crate::contract::{create_multisig_account, create_signature_account};
use crate::interoperable::{deserialize_stack_item, serialize_stack_item};
use crate::key_builder::KeyBuilder;
use crate::native::fungible_token::FungibleToken;
use crate::native::{gas_token::GasToken, policy, NativeContract, NativeMethod};
use crate::{ContractError, ContractResult};
use neo_config::{ProtocolSettings, GAS_FACTOR};
use neo_core::UInt160;
use neo_cryptography::ecc::ECPoint;
use neo_persistence::{DataCache, SeekDirection, StorageItem};
use neo_vm::StackItem;
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

/// The id of the NEO contract.
pub const ID: i32 = -5;

/// The fixed total supply: 100 million indivisible tokens.
pub const TOTAL_AMOUNT: i64 = 100_000_000;

const PREFIX_VOTERS_COUNT: u8 = 1;
const PREFIX_REGISTER_PRICE: u8 = 13;
const PREFIX_COMMITTEE: u8 = 14;
const PREFIX_VOTER_REWARD_PER_COMMITTEE: u8 = 23;
const PREFIX_GAS_PER_BLOCK: u8 = 29;
const PREFIX_CANDIDATE: u8 = 33;

const NEO_HOLDER_REWARD_RATIO: i64 = 10;
const COMMITTEE_REWARD_RATIO: i64 = 10;
const VOTER_REWARD_RATIO: i64 = 80;

const DEFAULT_GAS_PER_BLOCK: i64 = 5 * GAS_FACTOR;
const DEFAULT_REGISTER_PRICE: i64 = 1000 * GAS_FACTOR;

/// The turnout (voted NEO over total) below which the standby committee
/// stays in force, as a fraction numerator over 5 (0.2).
const EFFECTIVE_VOTER_TURNOUT_DENOMINATOR: i64 = 5;

/// Per-account NEO state.
#[derive(Debug, Clone, PartialEq)]
pub struct NeoAccountState {
    /// The NEO balance.
    pub balance: BigInt,
    /// The height rewards were last settled at.
    pub balance_height: u32,
    /// The candidate this account votes for.
    pub vote_to: Option<ECPoint>,
    /// The reward accumulator snapshot taken when the vote was cast.
    pub last_gas_per_vote: BigInt,
}

impl NeoAccountState {
    fn from_fields(fields: &[StackItem]) -> ContractResult<Self> {
        let balance = fields
            .first()
            .ok_or_else(|| ContractError::invalid_operation("corrupt NEO account"))?
            .get_integer()?;
        let balance_height = fields
            .get(1)
            .map(|f| f.get_integer())
            .transpose()?
            .and_then(|v| v.to_u32())
            .unwrap_or(0);
        let vote_to = match fields.get(2) {
            None => None,
            Some(item) if item.is_null() => None,
            Some(item) => Some(
                ECPoint::from_bytes(&item.get_bytes()?)
                    .map_err(|e| ContractError::invalid_operation(e.to_string()))?,
            ),
        };
        let last_gas_per_vote = fields
            .get(3)
            .map(|f| f.get_integer())
            .transpose()?
            .unwrap_or_else(BigInt::zero);
        Ok(Self {
            balance,
            balance_height,
            vote_to,
            last_gas_per_vote,
        })
    }

    fn to_fields(&self) -> Vec<StackItem> {
        vec![
            StackItem::Integer(self.balance.clone()),
            StackItem::from_int(self.balance_height),
            match &self.vote_to {
                Some(key) => StackItem::from_bytes(key.encoded().to_vec()),
                None => StackItem::Null,
            },
            StackItem::Integer(self.last_gas_per_vote.clone()),
        ]
    }
}

/// A registered candidate.
#[derive(Debug, Clone)]
struct CandidateState {
    registered: bool,
    votes: BigInt,
}

/// The NEO token.
pub struct NeoToken;

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
    NativeMethod::safe("unclaimedGas", 2, 1 << 17),
    NativeMethod::writing("registerCandidate", 1, 0).with_notify(),
    NativeMethod::writing("unregisterCandidate", 1, 1 << 16).with_notify(),
    NativeMethod::writing("vote", 2, 1 << 16).with_notify(),
    NativeMethod::safe("getCandidates", 0, 1 << 22),
    NativeMethod::safe("getCommittee", 0, 1 << 16),
    NativeMethod::safe("getNextBlockValidators", 0, 1 << 16),
    NativeMethod::safe("getGasPerBlock", 0, 1 << 15),
    NativeMethod::writing_void("setGasPerBlock", 1, 1 << 15),
    NativeMethod::safe("getRegisterPrice", 0, 1 << 15),
    NativeMethod::writing_void("setRegisterPrice", 1, 1 << 15),
];

impl FungibleToken for NeoToken {
    fn symbol(&self) -> &'static str {
        "NEO"
    }

    fn decimals(&self) -> u8 {
        0
    }

    fn new_account_fields(&self) -> Vec<StackItem> {
        NeoAccountState {
            balance: BigInt::zero(),
            balance_height: 0,
            vote_to: None,
            last_gas_per_vote: BigInt::zero(),
        }
        .to_fields()
    }

    /// NEO accounts never prune: the reward bookkeeping survives zero
    /// balances until the next settle.
    fn prune_empty_accounts(&self) -> bool {
        false
    }

    /// Settles pending GAS before any balance delta and moves the vote
    /// weight of the delta.
    fn on_balance_changing(
        &self,
        engine: &mut ApplicationEngine,
        account: &UInt160,
        fields: &mut Vec<StackItem>,
        amount: &BigInt,
    ) -> ContractResult<()> {
        let mut state = NeoAccountState::from_fields(fields)?;
        self.distribute_gas(engine, account, &mut state)?;

        if !amount.is_zero() {
            if let Some(vote_to) = state.vote_to.clone() {
                adjust_candidate_votes(engine.snapshot(), &vote_to, amount)?;
                adjust_voters_count(engine.snapshot(), amount);
            }
        }
        *fields = state.to_fields();
        Ok(())
    }
}

impl NeoToken {
    /// Mints the pending reward and bumps the settle height.
    fn distribute_gas(
        &self,
        engine: &mut ApplicationEngine,
        account: &UInt160,
        state: &mut NeoAccountState,
    ) -> ContractResult<()> {
        let end = engine.execution_height();
        let reward = calculate_bonus(engine.snapshot(), engine.settings(), state, end)?;
        state.balance_height = end;
        if let Some(vote_to) = &state.vote_to {
            state.last_gas_per_vote =
                latest_voter_reward_per_committee(engine.snapshot(), vote_to);
        }
        if reward.is_positive() {
            GasToken.mint(engine, account, &reward, false)?;
        }
        Ok(())
    }

    fn vote(
        &self,
        engine: &mut ApplicationEngine,
        account: &UInt160,
        candidate: Option<ECPoint>,
    ) -> ContractResult<bool> {
        if !engine.check_witness(account)? {
            return Ok(false);
        }
        let key = self.account_key(account);
        let Some(item) = engine.snapshot().try_get(&key) else {
            return Ok(false);
        };
        let StackItem::Struct(fields) = deserialize_stack_item(item.value())? else {
            return Err(ContractError::invalid_operation("corrupt NEO account"));
        };
        let mut state = NeoAccountState::from_fields(&fields.items())?;

        if let Some(candidate_key) = &candidate {
            let Some(candidate_state) =
                get_candidate(engine.snapshot(), candidate_key)?
            else {
                return Ok(false);
            };
            if !candidate_state.registered {
                return Ok(false);
            }
        }

        // Settle rewards under the old vote before switching.
        self.distribute_gas(engine, account, &mut state)?;

        // Voters count moves by the balance only across the null boundary.
        match (&state.vote_to, &candidate) {
            (None, Some(_)) => adjust_voters_count(engine.snapshot(), &state.balance),
            (Some(_), None) => adjust_voters_count(engine.snapshot(), &(-&state.balance)),
            _ => {}
        }

        if let Some(old) = &state.vote_to {
            adjust_candidate_votes(engine.snapshot(), old, &(-&state.balance))?;
        }
        if let Some(new) = &candidate {
            adjust_candidate_votes(engine.snapshot(), new, &state.balance)?;
        }

        let old_vote_item = match &state.vote_to {
            Some(key) => StackItem::from_bytes(key.encoded().to_vec()),
            None => StackItem::Null,
        };
        let new_vote_item = match &candidate {
            Some(key) => StackItem::from_bytes(key.encoded().to_vec()),
            None => StackItem::Null,
        };

        state.vote_to = candidate.clone();
        state.last_gas_per_vote = match &candidate {
            Some(key) => latest_voter_reward_per_committee(engine.snapshot(), key),
            None => BigInt::zero(),
        };

        let serialized =
            serialize_stack_item(&StackItem::from_struct(state.to_fields()), usize::MAX)?;
        engine.snapshot().put(key, StorageItem::new(serialized));

        engine.send_notification(
            self.hash(),
            "Vote".into(),
            vec![
                StackItem::from_bytes(account.to_vec()),
                old_vote_item,
                new_vote_item,
                StackItem::Integer(state.balance.clone()),
            ],
        )?;
        Ok(true)
    }

    fn register_candidate(
        &self,
        engine: &mut ApplicationEngine,
        public_key: &ECPoint,
    ) -> ContractResult<bool> {
        let account = create_signature_account(public_key);
        if !engine.check_witness(&account)? {
            return Ok(false);
        }
        engine.add_fee_raw(register_price(engine.snapshot()))?;
        let key = candidate_key(public_key);
        let mut state = get_candidate(engine.snapshot(), public_key)?
            .unwrap_or(CandidateState {
                registered: false,
                votes: BigInt::zero(),
            });
        state.registered = true;
        engine
            .snapshot()
            .put(key, candidate_item(&state)?);
        engine.send_notification(
            self.hash(),
            "CandidateStateChanged".into(),
            vec![
                StackItem::from_bytes(public_key.encoded().to_vec()),
                StackItem::from_bool(true),
                StackItem::Integer(state.votes),
            ],
        )?;
        Ok(true)
    }

    fn unregister_candidate(
        &self,
        engine: &mut ApplicationEngine,
        public_key: &ECPoint,
    ) -> ContractResult<bool> {
        let account = create_signature_account(public_key);
        if !engine.check_witness(&account)? {
            return Ok(false);
        }
        let key = candidate_key(public_key);
        let Some(mut state) = get_candidate(engine.snapshot(), public_key)? else {
            return Ok(true);
        };
        state.registered = false;
        if state.votes.is_zero() {
            engine.snapshot().delete(&key);
        } else {
            engine.snapshot().put(key, candidate_item(&state)?);
        }
        engine.send_notification(
            self.hash(),
            "CandidateStateChanged".into(),
            vec![
                StackItem::from_bytes(public_key.encoded().to_vec()),
                StackItem::from_bool(false),
                StackItem::Integer(state.votes),
            ],
        )?;
        Ok(true)
    }

    fn check_committee(&self, engine: &mut ApplicationEngine) -> ContractResult<()> {
        let address = committee_address(engine.snapshot(), engine.settings());
        if !engine.check_witness(&address)? {
            return Err(ContractError::invalid_operation(
                "committee witness required",
            ));
        }
        Ok(())
    }
}

impl NativeContract for NeoToken {
    fn id(&self) -> i32 {
        ID
    }

    fn name(&self) -> &'static str {
        "NeoToken"
    }

    fn methods(&self) -> &'static [NativeMethod] {
        METHODS
    }

    fn initialize(&self, engine: &mut ApplicationEngine) -> ContractResult<()> {
        let snapshot = engine.snapshot().clone();
        snapshot.put(
            KeyBuilder::new(ID, PREFIX_VOTERS_COUNT).build(),
            StorageItem::new(Vec::new()),
        );
        snapshot.put(
            KeyBuilder::new(ID, PREFIX_GAS_PER_BLOCK).add_u32(0).build(),
            StorageItem::from_int(&BigInt::from(DEFAULT_GAS_PER_BLOCK)),
        );
        snapshot.put(
            KeyBuilder::new(ID, PREFIX_REGISTER_PRICE).build(),
            StorageItem::from_int(&BigInt::from(DEFAULT_REGISTER_PRICE)),
        );
        store_committee(
            &snapshot,
            &engine
                .settings()
                .standby_committee
                .iter()
                .map(|k| (k.clone(), BigInt::zero()))
                .collect::<Vec<_>>(),
        )?;
        let account = standby_validators_account(engine.settings())?;
        self.mint(engine, &account, &BigInt::from(TOTAL_AMOUNT), false)
    }

    fn on_persist(&self, engine: &mut ApplicationEngine) -> ContractResult<()> {
        let height = engine.execution_height();
        let committee_size = engine.settings().committee_members_count();
        if committee_size == 0 {
            return Ok(());
        }
        if should_refresh_committee(height, committee_size) {
            let members = compute_committee_members(engine.snapshot(), engine.settings())?;
            store_committee(engine.snapshot(), &members)?;
        }
        Ok(())
    }

    fn post_persist(&self, engine: &mut ApplicationEngine) -> ContractResult<()> {
        let settings = engine.settings().clone();
        let committee_size = settings.committee_members_count();
        if committee_size == 0 {
            return Ok(());
        }
        let height = engine.execution_height();
        let members = committee(engine.snapshot(), &settings);
        let gas_per_block = gas_per_block_at(engine.snapshot(), height);

        // Committee reward rotates through the seats.
        let seat = height as usize % committee_size;
        if let Some((member, _)) = members.get(seat) {
            let reward = &gas_per_block * COMMITTEE_REWARD_RATIO / 100;
            let account = create_signature_account(member);
            GasToken.mint(engine, &account, &reward, false)?;
        }

        // At refresh boundaries the voter reward accumulators advance.
        if should_refresh_committee(height, committee_size) {
            let validators_count = settings.validators_count;
            let voter_reward_each = &gas_per_block * VOTER_REWARD_RATIO
                * BigInt::from(GAS_FACTOR)
                * BigInt::from(committee_size as i64)
                / BigInt::from((committee_size + validators_count) as i64)
                / 100;
            for (index, (member, votes)) in members.iter().enumerate() {
                if votes.is_zero() {
                    continue;
                }
                let factor: i64 = if index < validators_count { 2 } else { 1 };
                let delta = factor * &voter_reward_each / votes;
                let key = KeyBuilder::new(ID, PREFIX_VOTER_REWARD_PER_COMMITTEE)
                    .add_key(member)
                    .build();
                engine.snapshot().get_and_change(
                    &key,
                    Some(&StorageItem::default),
                    |item| item.add_int(&delta),
                )?;
            }
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
            "decimals" => Ok(Some(StackItem::from_int(0))),
            "totalSupply" => Ok(Some(StackItem::from_int(TOTAL_AMOUNT))),
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
            "unclaimedGas" => {
                let account = policy::account_arg(&args, 0)?;
                let end = args
                    .get(1)
                    .ok_or_else(|| ContractError::invalid_operation("missing end height"))?
                    .get_integer()?
                    .to_u32()
                    .ok_or_else(|| ContractError::invalid_operation("invalid end height"))?;
                let unclaimed = unclaimed_gas(engine.snapshot(), engine.settings(), &account, end)?;
                Ok(Some(StackItem::Integer(unclaimed)))
            }
            "registerCandidate" => {
                let key = pubkey_arg(&args, 0)?;
                let result = self.register_candidate(engine, &key)?;
                Ok(Some(StackItem::from_bool(result)))
            }
            "unregisterCandidate" => {
                let key = pubkey_arg(&args, 0)?;
                let result = self.unregister_candidate(engine, &key)?;
                Ok(Some(StackItem::from_bool(result)))
            }
            "vote" => {
                let account = policy::account_arg(&args, 0)?;
                let candidate = match args.get(1) {
                    None => None,
                    Some(item) if item.is_null() => None,
                    Some(item) => Some(
                        ECPoint::from_bytes(&item.get_bytes()?)
                            .map_err(|e| ContractError::invalid_operation(e.to_string()))?,
                    ),
                };
                let result = self.vote(engine, &account, candidate)?;
                Ok(Some(StackItem::from_bool(result)))
            }
            "getCandidates" => {
                let candidates = get_candidates(engine.snapshot())?;
                let items = candidates
                    .into_iter()
                    .map(|(key, votes)| {
                        StackItem::from_struct(vec![
                            StackItem::from_bytes(key.encoded().to_vec()),
                            StackItem::Integer(votes),
                        ])
                    })
                    .collect();
                Ok(Some(StackItem::from_array(items)))
            }
            "getCommittee" => {
                let members = committee(engine.snapshot(), engine.settings());
                let mut keys: Vec<ECPoint> = members.into_iter().map(|(k, _)| k).collect();
                keys.sort();
                Ok(Some(StackItem::from_array(
                    keys.into_iter()
                        .map(|k| StackItem::from_bytes(k.encoded().to_vec()))
                        .collect(),
                )))
            }
            "getNextBlockValidators" => {
                let validators = next_block_validators(engine.snapshot(), engine.settings());
                Ok(Some(StackItem::from_array(
                    validators
                        .into_iter()
                        .map(|k| StackItem::from_bytes(k.encoded().to_vec()))
                        .collect(),
                )))
            }
            "getGasPerBlock" => {
                let height = engine.execution_height();
                Ok(Some(StackItem::Integer(gas_per_block_at(
                    engine.snapshot(),
                    height,
                ))))
            }
            "setGasPerBlock" => {
                let value = args
                    .first()
                    .ok_or_else(|| ContractError::invalid_operation("missing value"))?
                    .get_integer()?;
                if value.is_negative() || value > BigInt::from(10 * GAS_FACTOR) {
                    return Err(ContractError::invalid_operation("gas per block out of range"));
                }
                self.check_committee(engine)?;
                let height = engine.execution_height();
                engine.snapshot().put(
                    KeyBuilder::new(ID, PREFIX_GAS_PER_BLOCK)
                        .add_u32(height + 1)
                        .build(),
                    StorageItem::from_int(&value),
                );
                Ok(None)
            }
            "getRegisterPrice" => Ok(Some(StackItem::from_int(register_price(
                engine.snapshot(),
            )))),
            "setRegisterPrice" => {
                let value = args
                    .first()
                    .ok_or_else(|| ContractError::invalid_operation("missing value"))?
                    .get_integer()?;
                if !value.is_positive() {
                    return Err(ContractError::invalid_operation("register price out of range"));
                }
                self.check_committee(engine)?;
                engine.snapshot().put(
                    KeyBuilder::new(ID, PREFIX_REGISTER_PRICE).build(),
                    StorageItem::from_int(&value),
                );
                Ok(None)
            }
            other => Err(ContractError::invalid_operation(format!(
                "unknown NEO method {other}"
            ))),
        }
    }
}

// ---- storage helpers ----

fn candidate_key(public_key: &ECPoint) -> neo_persistence::StorageKey {
    KeyBuilder::new(ID, PREFIX_CANDIDATE).add_key(public_key).build()
}

fn candidate_item(state: &CandidateState) -> ContractResult<StorageItem> {
    let item = StackItem::from_struct(vec![
        StackItem::from_bool(state.registered),
        StackItem::Integer(state.votes.clone()),
    ]);
    Ok(StorageItem::new(serialize_stack_item(&item, usize::MAX)?))
}

fn get_candidate(
    snapshot: &DataCache,
    public_key: &ECPoint,
) -> ContractResult<Option<CandidateState>> {
    let Some(item) = snapshot.try_get(&candidate_key(public_key)) else {
        return Ok(None);
    };
    let StackItem::Struct(fields) = deserialize_stack_item(item.value())? else {
        return Err(ContractError::invalid_operation("corrupt candidate state"));
    };
    let fields = fields.items();
    Ok(Some(CandidateState {
        registered: fields
            .first()
            .map(|f| f.get_bool())
            .unwrap_or(false),
        votes: fields
            .get(1)
            .map(|f| f.get_integer())
            .transpose()?
            .unwrap_or_else(BigInt::zero),
    }))
}

/// All registered candidates with their votes, sorted by key.
pub fn get_candidates(snapshot: &DataCache) -> ContractResult<Vec<(ECPoint, BigInt)>> {
    let entries = snapshot.find_prefix(ID, &[PREFIX_CANDIDATE], SeekDirection::Forward)?;
    let mut out = Vec::with_capacity(entries.len());
    for (key, item) in entries {
        let Ok(public_key) = ECPoint::from_bytes(&key.key[1..]) else {
            continue;
        };
        let StackItem::Struct(fields) = deserialize_stack_item(item.value())? else {
            continue;
        };
        let fields = fields.items();
        let registered = fields.first().map(|f| f.get_bool()).unwrap_or(false);
        if !registered {
            continue;
        }
        let votes = fields
            .get(1)
            .map(|f| f.get_integer())
            .transpose()?
            .unwrap_or_else(BigInt::zero);
        out.push((public_key, votes));
    }
    Ok(out)
}

fn adjust_candidate_votes(
    snapshot: &DataCache,
    public_key: &ECPoint,
    delta: &BigInt,
) -> ContractResult<()> {
    let Some(mut state) = get_candidate(snapshot, public_key)? else {
        // Votes for an unregistered-and-deleted candidate vanish.
        return Ok(());
    };
    state.votes += delta;
    if !state.registered && state.votes.is_zero() {
        snapshot.delete(&candidate_key(public_key));
    } else {
        snapshot.put(candidate_key(public_key), candidate_item(&state)?);
    }
    Ok(())
}

fn adjust_voters_count(snapshot: &DataCache, delta: &BigInt) {
    let key = KeyBuilder::new(ID, PREFIX_VOTERS_COUNT).build();
    let _ = snapshot.get_and_change(&key, Some(&StorageItem::default), |item| {
        item.add_int(delta)
    });
}

fn latest_voter_reward_per_committee(snapshot: &DataCache, public_key: &ECPoint) -> BigInt {
    let key = KeyBuilder::new(ID, PREFIX_VOTER_REWARD_PER_COMMITTEE)
        .add_key(public_key)
        .build();
    snapshot
        .try_get(&key)
        .map(|item| item.as_int())
        .unwrap_or_else(BigInt::zero)
}

/// Gas-per-block records at or below `height`, newest first.
fn sorted_gas_records(snapshot: &DataCache, height: u32) -> Vec<(u32, BigInt)> {
    let entries = snapshot
        .find_prefix(ID, &[PREFIX_GAS_PER_BLOCK], SeekDirection::Backward)
        .unwrap_or_default();
    entries
        .into_iter()
        .filter_map(|(key, item)| {
            let index = u32::from_be_bytes(key.key.get(1..5)?.try_into().ok()?);
            Some((index, item.as_int()))
        })
        .filter(|(index, _)| *index <= height)
        .collect()
}

/// The gas-per-block value in force at `height`.
pub fn gas_per_block_at(snapshot: &DataCache, height: u32) -> BigInt {
    sorted_gas_records(snapshot, height)
        .first()
        .map(|(_, value)| value.clone())
        .unwrap_or_else(|| BigInt::from(DEFAULT_GAS_PER_BLOCK))
}

/// The current candidate registration price in datoshi.
pub fn register_price(snapshot: &DataCache) -> i64 {
    snapshot
        .try_get(&KeyBuilder::new(ID, PREFIX_REGISTER_PRICE).build())
        .map(|item| item.as_int().to_i64().unwrap_or(DEFAULT_REGISTER_PRICE))
        .unwrap_or(DEFAULT_REGISTER_PRICE)
}

/// The pending reward of an account state up to `end` (exclusive).
fn calculate_bonus(
    snapshot: &DataCache,
    _settings: &ProtocolSettings,
    state: &NeoAccountState,
    end: u32,
) -> ContractResult<BigInt> {
    if state.balance.is_zero() || state.balance_height >= end {
        return Ok(BigInt::zero());
    }
    if state.balance.is_negative() {
        return Err(ContractError::invalid_operation("negative NEO balance"));
    }

    // Holder reward: walk the gas-per-block records backwards from end-1.
    let start = state.balance_height;
    let mut sum = BigInt::zero();
    let mut upper = end;
    for (index, value) in sorted_gas_records(snapshot, end - 1) {
        if index > start {
            sum += &value * BigInt::from(upper - index);
            upper = index;
        } else {
            sum += &value * BigInt::from(upper - start);
            break;
        }
    }
    let mut reward =
        &state.balance * sum * NEO_HOLDER_REWARD_RATIO / 100 / BigInt::from(TOTAL_AMOUNT);

    // Voter reward: the accumulator delta since the vote snapshot.
    if let Some(vote_to) = &state.vote_to {
        let latest = latest_voter_reward_per_committee(snapshot, vote_to);
        reward += &state.balance * (latest - &state.last_gas_per_vote)
            / BigInt::from(GAS_FACTOR);
    }
    Ok(reward)
}

/// The reward an account could claim at `end`.
pub fn unclaimed_gas(
    snapshot: &DataCache,
    settings: &ProtocolSettings,
    account: &UInt160,
    end: u32,
) -> ContractResult<BigInt> {
    let Some(fields) = NeoToken.account_fields(snapshot, account) else {
        return Ok(BigInt::zero());
    };
    let state = NeoAccountState::from_fields(&fields)?;
    calculate_bonus(snapshot, settings, &state, end)
}

// ---- committee ----

/// Whether the committee recomputes at `height`.
pub fn should_refresh_committee(height: u32, committee_size: usize) -> bool {
    height as usize % committee_size == 0
}

fn store_committee(
    snapshot: &DataCache,
    members: &[(ECPoint, BigInt)],
) -> ContractResult<()> {
    let item = StackItem::from_array(
        members
            .iter()
            .map(|(key, votes)| {
                StackItem::from_struct(vec![
                    StackItem::from_bytes(key.encoded().to_vec()),
                    StackItem::Integer(votes.clone()),
                ])
            })
            .collect(),
    );
    snapshot.put(
        KeyBuilder::new(ID, PREFIX_COMMITTEE).build(),
        StorageItem::new(serialize_stack_item(&item, usize::MAX)?),
    );
    Ok(())
}

/// The cached committee with votes; falls back to standby.
pub fn committee(snapshot: &DataCache, settings: &ProtocolSettings) -> Vec<(ECPoint, BigInt)> {
    let stored = snapshot
        .try_get(&KeyBuilder::new(ID, PREFIX_COMMITTEE).build())
        .and_then(|item| deserialize_stack_item(item.value()).ok())
        .and_then(|item| match item {
            StackItem::Array(list) => {
                let mut members = Vec::with_capacity(list.len());
                for entry in list.items() {
                    let StackItem::Struct(fields) = entry else { return None };
                    let fields = fields.items();
                    let key = ECPoint::from_bytes(&fields.first()?.get_bytes().ok()?).ok()?;
                    let votes = fields.get(1)?.get_integer().ok()?;
                    members.push((key, votes));
                }
                Some(members)
            }
            _ => None,
        });
    stored.unwrap_or_else(|| {
        settings
            .standby_committee
            .iter()
            .map(|k| (k.clone(), BigInt::zero()))
            .collect()
    })
}

/// Recomputes the committee from candidate rank, falling back to standby
/// below the turnout threshold or candidate quorum.
pub fn compute_committee_members(
    snapshot: &DataCache,
    settings: &ProtocolSettings,
) -> ContractResult<Vec<(ECPoint, BigInt)>> {
    let committee_size = settings.committee_members_count();
    let voters_count = snapshot
        .try_get(&KeyBuilder::new(ID, PREFIX_VOTERS_COUNT).build())
        .map(|item| item.as_int())
        .unwrap_or_else(BigInt::zero);

    let turnout_ok = &voters_count * EFFECTIVE_VOTER_TURNOUT_DENOMINATOR
        >= BigInt::from(TOTAL_AMOUNT);
    let mut candidates = get_candidates(snapshot)?;
    if !turnout_ok || candidates.len() < committee_size {
        return Ok(settings
            .standby_committee
            .iter()
            .map(|k| (k.clone(), BigInt::zero()))
            .collect());
    }
    candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    candidates.truncate(committee_size);
    Ok(candidates)
}

/// The validators for the next block: the committee prefix, sorted.
pub fn next_block_validators(
    snapshot: &DataCache,
    settings: &ProtocolSettings,
) -> Vec<ECPoint> {
    let members = committee(snapshot, settings);
    let mut validators: Vec<ECPoint> = members
        .into_iter()
        .take(settings.validators_count)
        .map(|(k, _)| k)
        .collect();
    validators.sort();
    validators
}

/// The majority multisig account of the committee.
pub fn committee_address(snapshot: &DataCache, settings: &ProtocolSettings) -> UInt160 {
    let members = committee(snapshot, settings);
    let keys: Vec<ECPoint> = members.into_iter().map(|(k, _)| k).collect();
    if keys.is_empty() {
        return UInt160::zero();
    }
    let m = keys.len() - (keys.len() - 1) / 2;
    create_multisig_account(m, &keys).unwrap_or_else(|_| UInt160::zero())
}

/// The BFT multisig account of the standby validators.
pub fn standby_validators_account(settings: &ProtocolSettings) -> ContractResult<UInt160> {
    let validators = settings.standby_validators();
    if validators.is_empty() {
        return Err(ContractError::invalid_operation("no standby validators"));
    }
    let m = validators.len() - (validators.len() - 1) / 3;
    create_multisig_account(m, &validators)
}

fn pubkey_arg(args: &[StackItem], index: usize) -> ContractResult<ECPoint> {
    let bytes = args
        .get(index)
        .ok_or_else(|| ContractError::invalid_operation("missing argument"))?
        .get_bytes()?;
    ECPoint::from_bytes(&bytes).map_err(|e| ContractError::invalid_operation(e.to_string()))
}
