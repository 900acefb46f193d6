// Copyright (C) 2015-2025 The Neo Project.
//
// mod.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The application engine: the VM host enforcing gas, call flags,
//! permissions and witness policy.

pub mod prices;

use crate::call_flags::CallFlags;
use crate::contract_state::ContractState;
use crate::interop;
use crate::manifest::{ContractMethodDescriptor, ContractParameterType};
use crate::native;
use crate::trigger::TriggerType;
use crate::{ContractError, ContractResult};
use neo_config::ProtocolSettings;
use neo_core::witness_rule::{WitnessCondition, WitnessRuleAction};
use neo_core::{Block, ExtensiblePayload, Signer, Transaction, UInt160, WitnessScope};
use neo_cryptography::ecc::ECPoint;
use neo_persistence::DataCache;
use neo_vm::{
    ExecutionContext, ExecutionEngine, ExecutionEngineLimits, OpCode, Script, StackItem,
    StepResult, VMState, VmError,
};
use std::collections::HashMap;
use std::sync::Arc;

/// The most notifications one execution may emit.
pub const MAX_NOTIFICATION_COUNT: usize = 512;

/// The longest event name.
pub const MAX_EVENT_NAME: usize = 32;

/// The longest log message.
pub const MAX_LOG_LENGTH: usize = 1024;

/// The object the executing script belongs to.
#[derive(Debug, Clone)]
pub enum ScriptContainer {
    /// A transaction.
    Transaction(Transaction),
    /// A block.
    Block(Block),
    /// An extensible payload.
    Extensible(ExtensiblePayload),
}

impl ScriptContainer {
    /// The hashes whose witnesses this container carries.
    pub fn signers(&self) -> Vec<Signer> {
        match self {
            ScriptContainer::Transaction(tx) => tx.signers().to_vec(),
            ScriptContainer::Block(_) => Vec::new(),
            ScriptContainer::Extensible(payload) => {
                vec![Signer::called_by_entry(payload.sender)]
            }
        }
    }

    /// The data witnesses sign for this container.
    pub fn sign_data(&self, network: u32) -> Vec<u8> {
        match self {
            ScriptContainer::Transaction(tx) => tx.sign_data(network),
            ScriptContainer::Block(block) => block.header.sign_data(network),
            ScriptContainer::Extensible(payload) => payload.sign_data(network),
        }
    }
}

/// A notification emitted during execution.
#[derive(Debug, Clone)]
pub struct NotifyEventArgs {
    /// The emitting contract.
    pub script_hash: UInt160,
    /// The event name.
    pub event_name: String,
    /// The event payload.
    pub state: Vec<StackItem>,
}

/// Host state attached to each execution context.
#[derive(Debug, Clone)]
pub struct ContextState {
    /// The script hash the context executes as.
    pub script_hash: UInt160,
    /// The id of the calling context, if any.
    pub calling_id: Option<usize>,
    /// The effective call flags.
    pub call_flags: CallFlags,
    /// The deployed contract id, when the context is a contract.
    pub contract_id: Option<i32>,
    /// Whether the context was entered through `System.Contract.Call`.
    pub is_dynamic_call: bool,
    /// Notifications emitted by this context, monotonic.
    pub notification_count: usize,
}

/// Hosts the VM for one execution: meters gas, dispatches system calls,
/// enforces call flags and manifest permissions, collects notifications.
pub struct ApplicationEngine {
    trigger: TriggerType,
    container: Option<ScriptContainer>,
    snapshot: Arc<DataCache>,
    persisting_block: Option<Block>,
    settings: ProtocolSettings,
    gas_limit: i64,
    fee_consumed: i64,
    exec_fee_factor: u32,
    storage_price: u32,
    pub(crate) vm: ExecutionEngine,
    context_states: HashMap<usize, ContextState>,
    notifications: Vec<NotifyEventArgs>,
    logs: Vec<(UInt160, String)>,
}

impl ApplicationEngine {
    /// Creates an engine over `snapshot` with a gas budget in datoshi.
    pub fn new(
        trigger: TriggerType,
        container: Option<ScriptContainer>,
        snapshot: Arc<DataCache>,
        persisting_block: Option<Block>,
        settings: ProtocolSettings,
        gas_limit: i64,
    ) -> Self {
        let exec_fee_factor = native::policy::exec_fee_factor(&snapshot);
        let storage_price = native::policy::storage_price(&snapshot);
        Self {
            trigger,
            container,
            snapshot,
            persisting_block,
            settings,
            gas_limit,
            fee_consumed: 0,
            exec_fee_factor,
            storage_price,
            vm: ExecutionEngine::new(ExecutionEngineLimits::default()),
            context_states: HashMap::new(),
            notifications: Vec::new(),
            logs: Vec::new(),
        }
    }

    /// The trigger this engine runs under.
    pub fn trigger(&self) -> TriggerType {
        self.trigger
    }

    /// The script container, if any.
    pub fn container(&self) -> Option<&ScriptContainer> {
        self.container.as_ref()
    }

    /// The snapshot the execution writes to.
    pub fn snapshot(&self) -> &Arc<DataCache> {
        &self.snapshot
    }

    /// The protocol settings.
    pub fn settings(&self) -> &ProtocolSettings {
        &self.settings
    }

    /// The block being persisted, or `None` for read-only runs.
    pub fn persisting_block(&self) -> Option<&Block> {
        self.persisting_block.as_ref()
    }

    /// The height execution observes: the persisting block's index, or
    /// one past the stored tip.
    pub fn execution_height(&self) -> u32 {
        if let Some(block) = &self.persisting_block {
            return block.index();
        }
        native::ledger::current_index(&self.snapshot)
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    /// Datoshi consumed so far.
    pub fn fee_consumed(&self) -> i64 {
        self.fee_consumed
    }

    /// Datoshi still available.
    pub fn gas_left(&self) -> i64 {
        self.gas_limit - self.fee_consumed
    }

    /// The storage price per byte currently in force.
    pub fn storage_price(&self) -> u32 {
        self.storage_price
    }

    /// The notifications emitted so far, in order.
    pub fn notifications(&self) -> &[NotifyEventArgs] {
        &self.notifications
    }

    /// The log lines emitted so far.
    pub fn logs(&self) -> &[(UInt160, String)] {
        &self.logs
    }

    /// The VM fault message, if the execution faulted.
    pub fn fault_message(&self) -> Option<&str> {
        self.vm.fault_message()
    }

    /// The result stack after HALT.
    pub fn result_stack(&self) -> &neo_vm::EvaluationStack {
        self.vm.result_stack()
    }

    /// Charges `base_price` datoshi scaled by the exec-fee factor.
    pub fn add_fee(&mut self, base_price: i64) -> ContractResult<()> {
        self.add_fee_raw(base_price.saturating_mul(self.exec_fee_factor as i64))
    }

    /// Charges exact datoshi.
    pub fn add_fee_raw(&mut self, datoshi: i64) -> ContractResult<()> {
        self.fee_consumed = self.fee_consumed.saturating_add(datoshi);
        if self.gas_limit >= 0 && self.fee_consumed > self.gas_limit {
            return Err(ContractError::OutOfGas {
                consumed: self.fee_consumed,
                limit: self.gas_limit,
            });
        }
        Ok(())
    }

    // ---- loading ----

    /// Loads the entry script.
    pub fn load_script(&mut self, script: Vec<u8>, flags: CallFlags) -> ContractResult<()> {
        let hash = UInt160::from(neo_cryptography::hash::hash160(&script));
        self.load_script_with_hash(script, hash, flags, None, -1)
    }

    /// Loads a script executing under an explicit hash (used for witness
    /// verification, where the hash is the declared account).
    pub fn load_script_with_hash(
        &mut self,
        script: Vec<u8>,
        script_hash: UInt160,
        flags: CallFlags,
        contract_id: Option<i32>,
        rvcount: i32,
    ) -> ContractResult<()> {
        let context = ExecutionContext::new(Script::new(script), rvcount, self.vm.reference_counter());
        let id = context.id();
        self.vm.load_context(context)?;
        self.context_states.insert(
            id,
            ContextState {
                script_hash,
                calling_id: None,
                call_flags: flags,
                contract_id,
                is_dynamic_call: false,
                notification_count: 0,
            },
        );
        Ok(())
    }

    /// Loads a contract method as a new context. `is_dynamic` marks a
    /// `System.Contract.Call` entry; dynamic void calls leave a Null on
    /// the caller's stack.
    pub fn load_contract(
        &mut self,
        contract: &ContractState,
        method: &ContractMethodDescriptor,
        flags: CallFlags,
        args: Vec<StackItem>,
        is_dynamic: bool,
    ) -> ContractResult<()> {
        let has_return = method.return_type != ContractParameterType::Void;
        if is_dynamic && !has_return {
            // Pre-seed the caller's stack so a void call still leaves
            // exactly one item once the callee returns.
            self.vm.push(StackItem::Null)?;
        }

        let calling_id = self.vm.current_context().ok().map(|c| c.id());
        let rvcount = if has_return { 1 } else { 0 };
        let mut context = ExecutionContext::new(
            Script::new(contract.nef.script.clone()),
            rvcount,
            self.vm.reference_counter(),
        );
        context.set_instruction_pointer(method.offset as usize);
        context.with_stack(|stack| {
            for arg in args.into_iter().rev() {
                stack.push(arg);
            }
        });
        let id = context.id();

        let initialize_context = contract
            .manifest
            .abi
            .get_method_any_arity("_initialize")
            .map(|init| context.clone_for_call(init.offset as usize));

        self.vm.load_context(context)?;
        let state = ContextState {
            script_hash: contract.hash,
            calling_id,
            call_flags: flags,
            contract_id: Some(contract.id),
            is_dynamic_call: is_dynamic,
            notification_count: 0,
        };
        self.context_states.insert(id, state.clone());

        if let Some(init) = initialize_context {
            let init_id = init.id();
            self.vm.load_context(init)?;
            self.context_states.insert(
                init_id,
                ContextState {
                    calling_id: Some(id),
                    is_dynamic_call: false,
                    notification_count: 0,
                    ..state
                },
            );
        }
        Ok(())
    }

    // ---- execution ----

    /// Runs to completion, metering every instruction.
    pub fn execute(&mut self) -> VMState {
        loop {
            match self.vm.state() {
                VMState::HALT | VMState::FAULT => return self.vm.state(),
                _ => {}
            }
            let instruction = match self.vm.peek_instruction() {
                Ok(instruction) => instruction,
                Err(err) => {
                    self.vm.fault(err);
                    return self.vm.state();
                }
            };

            if let Err(err) = self.add_fee(prices::opcode_price(instruction.opcode())) {
                self.fault_contract_error(err);
                return self.vm.state();
            }

            if instruction.opcode() == OpCode::CallT {
                if let Err(err) = self.execute_call_token(&instruction) {
                    self.fault_contract_error(err);
                    return self.vm.state();
                }
                continue;
            }

            match self.vm.step() {
                Ok(StepResult::SysCall(id)) => {
                    if let Err(err) = self.on_syscall(id) {
                        self.fault_contract_error(err);
                        return self.vm.state();
                    }
                }
                Ok(StepResult::Halted) | Ok(StepResult::Faulted) => return self.vm.state(),
                Ok(StepResult::Continue) => {}
                Err(err) => {
                    self.vm.fault(err);
                    return self.vm.state();
                }
            }
        }
    }

    fn fault_contract_error(&mut self, err: ContractError) {
        self.vm.fault(VmError::invalid_operation(err.to_string()));
    }

    fn on_syscall(&mut self, id: u32) -> ContractResult<()> {
        let descriptor = interop::find(id).ok_or_else(|| {
            ContractError::invalid_operation(format!("unknown syscall {id:#010x}"))
        })?;
        self.check_call_flags(descriptor.required_flags, descriptor.name)?;
        self.add_fee(descriptor.price)?;
        (descriptor.handler)(self)
    }

    /// Executes a `CALLT` against the current contract's method tokens.
    fn execute_call_token(&mut self, instruction: &neo_vm::Instruction) -> ContractResult<()> {
        let token_index = instruction.token_u16()? as usize;
        // Advance past the instruction before loading the callee.
        {
            let context = self.vm.current_context_mut()?;
            let next = context.instruction_pointer() + instruction.size();
            context.set_instruction_pointer(next);
        }
        let contract_id = self
            .current_state()?
            .contract_id
            .ok_or_else(|| ContractError::invalid_operation("CALLT outside a contract"))?;
        let contract = native::contract_management::get_contract_by_id(&self.snapshot, contract_id)
            .ok_or_else(|| ContractError::invalid_operation("calling contract not found"))?;
        let token = contract
            .nef
            .tokens
            .get(token_index)
            .ok_or_else(|| {
                ContractError::invalid_operation(format!("invalid method token {token_index}"))
            })?
            .clone();
        let mut args = Vec::with_capacity(token.parameters_count as usize);
        for _ in 0..token.parameters_count {
            args.push(self.vm.pop()?);
        }
        args.reverse();
        let token_flags =
            CallFlags::from_bits(token.call_flags.bits()).unwrap_or(CallFlags::NONE);
        self.call_contract(
            &token.hash,
            &token.method,
            token_flags,
            args,
            token.has_return_value,
        )
    }

    /// The `System.Contract.Call` core: resolve, check permissions, load.
    pub fn call_contract(
        &mut self,
        hash: &UInt160,
        method: &str,
        flags: CallFlags,
        args: Vec<StackItem>,
        expect_return: bool,
    ) -> ContractResult<()> {
        if method.starts_with('_') {
            return Err(ContractError::invalid_operation(format!(
                "cannot call reserved method {method}"
            )));
        }
        let contract = native::contract_management::get_contract(&self.snapshot, hash)
            .ok_or_else(|| {
                ContractError::invalid_operation(format!("called contract {hash} does not exist"))
            })?;
        let method_descriptor = contract
            .manifest
            .abi
            .get_method(method, args.len())
            .cloned()
            .ok_or_else(|| {
                ContractError::invalid_operation(format!(
                    "method {method} with {} parameters does not exist in {hash}",
                    args.len()
                ))
            })?;

        // The calling contract's manifest must permit the call; entry
        // scripts without a manifest may call anything.
        if let Some(calling_id) = self.current_state().ok().map(|s| s.contract_id) {
            if let Some(calling_id) = calling_id {
                if let Some(caller) =
                    native::contract_management::get_contract_by_id(&self.snapshot, calling_id)
                {
                    let groups = contract.manifest.group_keys();
                    if !caller.manifest.can_call(&contract.hash, &groups, method) {
                        return Err(ContractError::PermissionDenied(format!(
                            "Cannot Call Method {method} Of Contract {}",
                            contract.hash
                        )));
                    }
                }
            }
        }

        if !method_descriptor.safe {
            // Calling an unsafe method needs the caller to allow calls.
            self.check_call_flags(CallFlags::ALLOW_CALL, "System.Contract.Call")?;
        }

        let current_flags = self
            .current_state()
            .map(|s| s.call_flags)
            .unwrap_or(CallFlags::ALL);
        let mut effective = current_flags & flags;
        if method_descriptor.safe {
            // Safe methods run without write or notify rights.
            effective &= !(CallFlags::WRITE_STATES | CallFlags::ALLOW_NOTIFY);
        }
        let has_return = method_descriptor.return_type != ContractParameterType::Void;
        if expect_return && !has_return {
            // Token promised a return value the ABI does not provide;
            // the dynamic-call Null convention covers it.
        }
        self.load_contract(&contract, &method_descriptor, effective, args, true)
    }

    // ---- context state ----

    /// The state of the current context.
    pub fn current_state(&self) -> ContractResult<&ContextState> {
        let id = self.vm.current_context()?.id();
        self.context_states
            .get(&id)
            .ok_or_else(|| ContractError::invalid_operation("missing context state"))
    }

    fn current_state_mut(&mut self) -> ContractResult<&mut ContextState> {
        let id = self.vm.current_context()?.id();
        self.context_states
            .get_mut(&id)
            .ok_or_else(|| ContractError::invalid_operation("missing context state"))
    }

    /// The state of the context that called the current one.
    pub fn calling_state(&self) -> Option<&ContextState> {
        let calling_id = self.current_state().ok()?.calling_id?;
        self.context_states.get(&calling_id)
    }

    /// The hash the current context executes as.
    pub fn current_script_hash(&self) -> ContractResult<UInt160> {
        Ok(self.current_state()?.script_hash)
    }

    /// The hash of the calling context, if any.
    pub fn calling_script_hash(&self) -> Option<UInt160> {
        self.calling_state().map(|s| s.script_hash)
    }

    /// The hash of the entry context.
    pub fn entry_script_hash(&self) -> Option<UInt160> {
        let entry = self.vm.entry_context()?;
        self.context_states.get(&entry.id()).map(|s| s.script_hash)
    }

    /// Fails unless the current context holds `required` flags.
    pub fn check_call_flags(&self, required: CallFlags, what: &str) -> ContractResult<()> {
        if required.is_empty() {
            return Ok(());
        }
        let state = self.current_state()?;
        if !state.call_flags.contains(required) {
            return Err(ContractError::MissingCallFlags(format!(
                "{what} requires {required:?}, context has {:?}",
                state.call_flags
            )));
        }
        Ok(())
    }

    // ---- notifications & logs ----

    /// Emits a notification from the current context. The per-execution
    /// count cap binds script-issued notifications only; the syscall
    /// handler enforces it before calling here.
    pub fn send_notification(
        &mut self,
        script_hash: UInt160,
        event_name: String,
        state: Vec<StackItem>,
    ) -> ContractResult<()> {
        if event_name.len() > MAX_EVENT_NAME {
            return Err(ContractError::invalid_operation("event name too long"));
        }
        if let Ok(state_entry) = self.current_state_mut() {
            state_entry.notification_count += 1;
        }
        self.notifications.push(NotifyEventArgs {
            script_hash,
            event_name,
            state,
        });
        Ok(())
    }

    /// Records a log line from the current context.
    pub fn write_log(&mut self, script_hash: UInt160, message: String) -> ContractResult<()> {
        if message.len() > MAX_LOG_LENGTH {
            return Err(ContractError::invalid_operation("log message too long"));
        }
        tracing::debug!(contract = %script_hash, "{message}");
        self.logs.push((script_hash, message));
        Ok(())
    }

    // ---- witness checks ----

    /// Whether `account` has witnessed the current container in a scope
    /// valid for the current call chain.
    pub fn check_witness(&self, account: &UInt160) -> ContractResult<bool> {
        // A contract vouches for itself when it is the direct caller.
        if Some(*account) == self.calling_script_hash() {
            return Ok(true);
        }
        let signers = match &self.container {
            Some(container) => container.signers(),
            None => return Ok(false),
        };
        let Some(signer) = signers.iter().find(|s| s.account == *account) else {
            return Ok(false);
        };
        self.check_signer_scope(signer)
    }

    fn check_signer_scope(&self, signer: &Signer) -> ContractResult<bool> {
        if signer.scopes.contains(WitnessScope::GLOBAL) {
            return Ok(true);
        }
        if signer.scopes.contains(WitnessScope::CALLED_BY_ENTRY) {
            let calling = self.calling_script_hash();
            let entry = self.entry_script_hash();
            if calling.is_none() || calling == entry {
                return Ok(true);
            }
        }
        if signer.scopes.contains(WitnessScope::CUSTOM_CONTRACTS) {
            let current = self.current_script_hash()?;
            if signer.allowed_contracts.contains(&current) {
                return Ok(true);
            }
        }
        if signer.scopes.contains(WitnessScope::CUSTOM_GROUPS) {
            if self.current_groups_intersect(&signer.allowed_groups)? {
                return Ok(true);
            }
        }
        if signer.scopes.contains(WitnessScope::WITNESS_RULES) {
            for rule in &signer.rules {
                if self.evaluate_condition(&rule.condition)? {
                    return Ok(rule.action == WitnessRuleAction::Allow);
                }
            }
        }
        Ok(false)
    }

    fn current_groups_intersect(&self, groups: &[ECPoint]) -> ContractResult<bool> {
        let current = self.current_script_hash()?;
        let Some(contract) = native::contract_management::get_contract(&self.snapshot, &current)
        else {
            return Ok(false);
        };
        Ok(contract
            .manifest
            .group_keys()
            .iter()
            .any(|g| groups.contains(g)))
    }

    fn groups_of(&self, hash: &UInt160) -> Vec<ECPoint> {
        native::contract_management::get_contract(&self.snapshot, hash)
            .map(|c| c.manifest.group_keys())
            .unwrap_or_default()
    }

    fn evaluate_condition(&self, condition: &WitnessCondition) -> ContractResult<bool> {
        Ok(match condition {
            WitnessCondition::Boolean(value) => *value,
            WitnessCondition::Not(inner) => !self.evaluate_condition(inner)?,
            WitnessCondition::And(items) => {
                for item in items {
                    if !self.evaluate_condition(item)? {
                        return Ok(false);
                    }
                }
                true
            }
            WitnessCondition::Or(items) => {
                for item in items {
                    if self.evaluate_condition(item)? {
                        return Ok(true);
                    }
                }
                false
            }
            WitnessCondition::ScriptHash(hash) => self.current_script_hash()? == *hash,
            WitnessCondition::Group(group) => {
                let current = self.current_script_hash()?;
                self.groups_of(&current).contains(group)
            }
            WitnessCondition::CalledByEntry => {
                let calling = self.calling_script_hash();
                calling.is_none() || calling == self.entry_script_hash()
            }
            WitnessCondition::CalledByContract(hash) => {
                self.calling_script_hash() == Some(*hash)
            }
            WitnessCondition::CalledByGroup(group) => match self.calling_script_hash() {
                Some(calling) => self.groups_of(&calling).contains(group),
                None => false,
            },
        })
    }

    // ---- dummy block ----

    /// Synthesizes the block context for read-only invocations: the tip
    /// as previous block, zero merkle root, one-past-tip index.
    pub fn create_dummy_block(snapshot: &Arc<DataCache>, settings: &ProtocolSettings) -> Block {
        let (prev_hash, prev_index, prev_timestamp) =
            match native::ledger::current_block_summary(snapshot) {
                Some((hash, index, timestamp)) => (hash, index, timestamp),
                None => (neo_core::UInt256::zero(), 0, 0),
            };
        let header = neo_core::Header::new(
            0,
            prev_hash,
            neo_core::UInt256::zero(),
            prev_timestamp + settings.milliseconds_per_block as u64,
            0,
            prev_index + 1,
            0,
            UInt160::zero(),
            neo_core::Witness::empty(),
        );
        Block::new(header, Vec::new())
    }
}
