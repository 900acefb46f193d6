//! The execution engine: the instruction loop and its state machine.

use crate::evaluation_stack::EvaluationStack;
use crate::exception_handling::ExceptionHandlingState;
use crate::execution_context::ExecutionContext;
use crate::instruction::Instruction;
use crate::jump_table;
use crate::limits::ExecutionEngineLimits;
use crate::op_code::OpCode;
use crate::reference_counter::ReferenceCounter;
use crate::script::Script;
use crate::stack_item::StackItem;
use crate::{VmError, VmResult};
use num_bigint::BigInt;

/// The state of the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum VMState {
    /// Ready to run.
    NONE,
    /// Finished successfully.
    HALT,
    /// Aborted with an error.
    FAULT,
    /// Loaded but not yet started, or paused between steps.
    BREAK,
}

/// What a single step produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// An ordinary instruction ran.
    Continue,
    /// A SYSCALL instruction surfaced; the host must dispatch the id.
    SysCall(u32),
    /// The machine reached HALT.
    Halted,
    /// The machine reached FAULT.
    Faulted,
}

/// The stack-based execution engine.
///
/// The engine itself knows nothing of gas or system calls: a host drives
/// [`ExecutionEngine::step`], observing [`StepResult::SysCall`] and
/// charging costs between steps. [`ExecutionEngine::execute`] runs
/// hostless scripts and faults on any system call.
pub struct ExecutionEngine {
    state: VMState,
    invocation_stack: Vec<ExecutionContext>,
    result_stack: EvaluationStack,
    reference_counter: ReferenceCounter,
    limits: ExecutionEngineLimits,
    uncaught_exception: Option<StackItem>,
    fault_message: Option<String>,
    jumping: bool,
}

impl ExecutionEngine {
    /// Creates an engine with the given limits.
    pub fn new(limits: ExecutionEngineLimits) -> Self {
        let reference_counter = ReferenceCounter::new();
        Self {
            state: VMState::BREAK,
            invocation_stack: Vec::new(),
            result_stack: EvaluationStack::new(reference_counter.clone()),
            reference_counter,
            limits,
            uncaught_exception: None,
            fault_message: None,
            jumping: false,
        }
    }

    /// The current state.
    pub fn state(&self) -> VMState {
        self.state
    }

    /// The configured limits.
    pub fn limits(&self) -> &ExecutionEngineLimits {
        &self.limits
    }

    /// The shared reference counter.
    pub fn reference_counter(&self) -> &ReferenceCounter {
        &self.reference_counter
    }

    /// The frames of the invocation stack, entry first.
    pub fn invocation_stack(&self) -> &[ExecutionContext] {
        &self.invocation_stack
    }

    /// The current (innermost) frame.
    pub fn current_context(&self) -> VmResult<&ExecutionContext> {
        self.invocation_stack
            .last()
            .ok_or_else(|| VmError::invalid_operation("no current context"))
    }

    /// The current frame, mutable.
    pub fn current_context_mut(&mut self) -> VmResult<&mut ExecutionContext> {
        self.invocation_stack
            .last_mut()
            .ok_or_else(|| VmError::invalid_operation("no current context"))
    }

    /// The entry frame.
    pub fn entry_context(&self) -> Option<&ExecutionContext> {
        self.invocation_stack.first()
    }

    /// The result stack, populated at HALT.
    pub fn result_stack(&self) -> &EvaluationStack {
        &self.result_stack
    }

    /// The result stack, mutable.
    pub fn result_stack_mut(&mut self) -> &mut EvaluationStack {
        &mut self.result_stack
    }

    /// The pending or final uncaught exception item.
    pub fn uncaught_exception(&self) -> Option<&StackItem> {
        self.uncaught_exception.as_ref()
    }

    /// The message of the fault, if the engine faulted.
    pub fn fault_message(&self) -> Option<&str> {
        self.fault_message.as_deref()
    }

    /// Loads a script as a new frame on the invocation stack.
    pub fn load_script(&mut self, script: Script, rvcount: i32) -> VmResult<&mut ExecutionContext> {
        let context = ExecutionContext::new(script, rvcount, &self.reference_counter);
        self.load_context(context)?;
        Ok(self.invocation_stack.last_mut().expect("just pushed"))
    }

    /// Pushes a prepared frame.
    pub fn load_context(&mut self, context: ExecutionContext) -> VmResult<()> {
        if self.invocation_stack.len() >= self.limits.max_invocation_stack_size {
            return Err(VmError::limit_exceeded(format!(
                "invocation stack depth {}",
                self.invocation_stack.len()
            )));
        }
        self.invocation_stack.push(context);
        if self.state == VMState::NONE {
            self.state = VMState::BREAK;
        }
        Ok(())
    }

    /// The instruction the next step will execute.
    pub fn peek_instruction(&self) -> VmResult<Instruction> {
        self.current_context()?.current_instruction()
    }

    /// Runs the machine to completion without a host. Any SYSCALL faults.
    pub fn execute(&mut self) -> VMState {
        loop {
            match self.step() {
                Ok(StepResult::Continue) => {}
                Ok(StepResult::SysCall(id)) => {
                    self.fault(VmError::invalid_operation(format!(
                        "syscall {id:#010x} without a host"
                    )));
                    return self.state;
                }
                Ok(StepResult::Halted) | Ok(StepResult::Faulted) => return self.state,
                Err(err) => {
                    self.fault(err);
                    return self.state;
                }
            }
        }
    }

    /// Executes one instruction.
    ///
    /// SYSCALL is not dispatched here: the instruction pointer advances
    /// past it and the id is returned for the host. Errors from opcode
    /// handlers fault the machine, except catchable ones which unwind to
    /// the script's try handlers.
    pub fn step(&mut self) -> VmResult<StepResult> {
        match self.state {
            VMState::HALT => return Ok(StepResult::Halted),
            VMState::FAULT => return Ok(StepResult::Faulted),
            VMState::BREAK => self.state = VMState::NONE,
            VMState::NONE => {}
        }
        if self.invocation_stack.is_empty() {
            self.state = VMState::HALT;
            return Ok(StepResult::Halted);
        }

        let instruction = self.peek_instruction()?;
        if instruction.opcode() == OpCode::Syscall {
            let id = instruction.token_u32()?;
            let context = self.current_context_mut()?;
            let next = context.instruction_pointer() + instruction.size();
            context.set_instruction_pointer(next);
            return Ok(StepResult::SysCall(id));
        }

        let executing_id = self.current_context()?.id();
        self.jumping = false;
        match jump_table::execute(self, &instruction) {
            Ok(()) => {}
            Err(VmError::Catchable(message)) => {
                self.throw(StackItem::from_bytes(message.into_bytes()))?;
            }
            Err(err) => {
                self.fault(err);
                return Ok(StepResult::Faulted);
            }
        }

        // Advance the frame that executed the instruction, if it still
        // exists and did not jump. A CALL leaves the caller here so it
        // resumes past the call site; an unloaded frame simply vanishes.
        if !self.jumping {
            if let Some(context) = self
                .invocation_stack
                .iter_mut()
                .find(|c| c.id() == executing_id)
            {
                let next = context.instruction_pointer() + instruction.size();
                context.set_instruction_pointer(next);
            }
        }
        self.jumping = false;

        if self.reference_counter.count() > self.limits.max_stack_size
            && self.reference_counter.check_zero_referred() > self.limits.max_stack_size
        {
            self.fault(VmError::limit_exceeded(format!(
                "stack size {} over {}",
                self.reference_counter.count(),
                self.limits.max_stack_size
            )));
            return Ok(StepResult::Faulted);
        }

        Ok(match self.state {
            VMState::HALT => StepResult::Halted,
            VMState::FAULT => StepResult::Faulted,
            _ => StepResult::Continue,
        })
    }

    /// Transitions to FAULT, recording the reason.
    pub fn fault(&mut self, err: VmError) {
        tracing::debug!(error = %err, "vm fault");
        if self.fault_message.is_none() {
            self.fault_message = Some(err.to_string());
        }
        self.state = VMState::FAULT;
    }

    /// Forces the state; hosts use this after dispatching a failing syscall.
    pub fn set_state(&mut self, state: VMState) {
        self.state = state;
    }

    // ---- helpers for opcode handlers and hosts ----

    /// Pushes onto the current frame's evaluation stack.
    pub fn push(&mut self, item: StackItem) -> VmResult<()> {
        self.current_context()?.with_stack(|s| s.push(item));
        Ok(())
    }

    /// Pops from the current frame's evaluation stack.
    pub fn pop(&mut self) -> VmResult<StackItem> {
        self.current_context()?.with_stack(|s| s.pop())
    }

    /// Peeks into the current frame's evaluation stack.
    pub fn peek(&self, depth: usize) -> VmResult<StackItem> {
        self.current_context()?.with_stack(|s| s.peek(depth))
    }

    /// Pops an integer.
    pub fn pop_int(&mut self) -> VmResult<BigInt> {
        self.pop()?.get_integer()
    }

    /// Pops an integer that must fit an i32.
    pub fn pop_i32(&mut self) -> VmResult<i32> {
        let value = self.pop_int()?;
        i32::try_from(&value)
            .map_err(|_| VmError::invalid_operation(format!("{value} does not fit 32 bits")))
    }

    /// Pops a byte representation.
    pub fn pop_bytes(&mut self) -> VmResult<Vec<u8>> {
        self.pop()?.get_bytes()
    }

    /// Pops a truthiness value.
    pub fn pop_bool(&mut self) -> VmResult<bool> {
        Ok(self.pop()?.get_bool())
    }

    /// Marks that the current instruction moved the instruction pointer.
    pub fn set_jumping(&mut self) {
        self.jumping = true;
    }

    /// Jumps the current frame to an absolute position.
    pub fn jump_to(&mut self, position: usize) -> VmResult<()> {
        let context = self.current_context_mut()?;
        if position > context.script().len() {
            return Err(VmError::InvalidScript(format!(
                "jump target {position} out of range"
            )));
        }
        context.set_instruction_pointer(position);
        self.jumping = true;
        Ok(())
    }

    /// Loads the frame for a same-script CALL at `position`. The caller
    /// is not marked as jumping: it advances past the call site and
    /// resumes there when the callee returns.
    pub fn call_position(&mut self, position: usize) -> VmResult<()> {
        let cloned = self.current_context()?.clone_for_call(position);
        self.load_context(cloned)?;
        Ok(())
    }

    /// Removes the current frame, moving return values to the frame below
    /// (or the result stack at depth zero).
    pub fn unload_current_context(&mut self) -> VmResult<()> {
        let context = self
            .invocation_stack
            .pop()
            .ok_or_else(|| VmError::invalid_operation("no context to unload"))?;

        let shares_stack = self
            .invocation_stack
            .last()
            .map(|next| context.shares_stack_with(next))
            .unwrap_or(false);

        if !shares_stack {
            let rvcount = context.rvcount();
            let available = context.stack_len();
            if rvcount >= 0 && available != rvcount as usize {
                return Err(VmError::invalid_operation(format!(
                    "expected {rvcount} return values, stack holds {available}"
                )));
            }
            // Drain preserves order: bottom item lands first on the target.
            match self.invocation_stack.last() {
                Some(next) => context.with_stack(|source| {
                    next.with_stack(|target| {
                        source.drain_to(target);
                    })
                }),
                None => {
                    let target = &mut self.result_stack;
                    context.with_stack(|source| source.drain_to(target));
                }
            }
        }

        let mut context = context;
        let release_statics = !self
            .invocation_stack
            .iter()
            .any(|frame| frame.shares_statics_with(&context));
        context.clear_slot_references(release_statics);

        if self.invocation_stack.is_empty() {
            self.state = VMState::HALT;
        }
        self.reference_counter.check_zero_referred();
        Ok(())
    }

    /// Throws `exception`, unwinding to the nearest try handler; without
    /// one the machine faults.
    pub fn throw(&mut self, exception: StackItem) -> VmResult<()> {
        self.uncaught_exception = Some(exception);
        self.handle_exception()
    }

    /// Resumes unwinding of the pending exception.
    pub fn handle_exception(&mut self) -> VmResult<()> {
        while let Some(context) = self.invocation_stack.last_mut() {
            // Walk this frame's try entries, innermost first.
            while let Some(entry) = context.current_try_mut() {
                match entry.state {
                    ExceptionHandlingState::Try if entry.has_catch() => {
                        entry.state = ExceptionHandlingState::Catch;
                        let catch_pointer = entry.catch_pointer.expect("has_catch");
                        let exception = self
                            .uncaught_exception
                            .take()
                            .ok_or_else(|| VmError::invalid_operation("no pending exception"))?;
                        context.set_instruction_pointer(catch_pointer);
                        context.with_stack(|s| s.push(exception));
                        self.jumping = true;
                        return Ok(());
                    }
                    ExceptionHandlingState::Try | ExceptionHandlingState::Catch
                        if entry.has_finally() =>
                    {
                        entry.state = ExceptionHandlingState::Finally;
                        let finally_pointer = entry.finally_pointer.expect("has_finally");
                        context.set_instruction_pointer(finally_pointer);
                        self.jumping = true;
                        // The exception stays pending; ENDFINALLY rethrows.
                        return Ok(());
                    }
                    _ => {
                        context.pop_try();
                    }
                }
            }
            // No handler in this frame: discard it and keep unwinding.
            self.discard_current_context()?;
            if self.invocation_stack.is_empty() {
                break;
            }
        }

        let message = self
            .uncaught_exception
            .as_ref()
            .and_then(|e| e.get_string().ok())
            .unwrap_or_else(|| "unhandled exception".into());
        self.fault_message = Some(message);
        self.state = VMState::FAULT;
        Ok(())
    }

    /// Pops the current frame during unwinding, discarding its stack
    /// instead of moving return values.
    fn discard_current_context(&mut self) -> VmResult<()> {
        let mut context = self
            .invocation_stack
            .pop()
            .ok_or_else(|| VmError::invalid_operation("no context to discard"))?;
        let shares_stack = self
            .invocation_stack
            .last()
            .map(|next| context.shares_stack_with(next))
            .unwrap_or(false);
        if !shares_stack {
            context.with_stack(|s| s.clear());
        }
        let release_statics = !self
            .invocation_stack
            .iter()
            .any(|frame| frame.shares_statics_with(&context));
        context.clear_slot_references(release_statics);
        self.reference_counter.check_zero_referred();
        Ok(())
    }

    /// Takes the pending exception, for ENDFINALLY.
    pub fn take_uncaught_exception(&mut self) -> Option<StackItem> {
        self.uncaught_exception.take()
    }

    /// Restores a pending exception, for ENDFINALLY rethrow.
    pub fn restore_uncaught_exception(&mut self, exception: StackItem) {
        self.uncaught_exception = Some(exception);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script_builder::ScriptBuilder;

    fn run(script: Vec<u8>) -> ExecutionEngine {
        let mut engine = ExecutionEngine::new(ExecutionEngineLimits::default());
        engine.load_script(Script::new(script), -1).unwrap();
        engine.execute();
        engine
    }

    #[test]
    fn test_empty_script_halts() {
        let engine = run(vec![]);
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(engine.result_stack().len(), 0);
    }

    #[test]
    fn test_push_and_halt() {
        let mut sb = ScriptBuilder::new();
        sb.emit_push_int(5);
        sb.emit(OpCode::Ret);
        let engine = run(sb.into_bytes());
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(engine.result_stack().len(), 1);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().get_integer().unwrap(),
            BigInt::from(5)
        );
    }

    #[test]
    fn test_arithmetic() {
        let mut sb = ScriptBuilder::new();
        sb.emit_push_int(2);
        sb.emit_push_int(3);
        sb.emit(OpCode::Add);
        let engine = run(sb.into_bytes());
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().get_integer().unwrap(),
            BigInt::from(5)
        );
    }

    #[test]
    fn test_division_by_zero_faults() {
        let mut sb = ScriptBuilder::new();
        sb.emit_push_int(1);
        sb.emit_push_int(0);
        sb.emit(OpCode::Div);
        let engine = run(sb.into_bytes());
        assert_eq!(engine.state(), VMState::FAULT);
    }

    #[test]
    fn test_syscall_without_host_faults() {
        let mut sb = ScriptBuilder::new();
        sb.emit_syscall(0x1234_5678);
        let engine = run(sb.into_bytes());
        assert_eq!(engine.state(), VMState::FAULT);
    }

    #[test]
    fn test_jmp_skips_instruction() {
        let mut sb = ScriptBuilder::new();
        // JMP +3 skips PUSH1; only PUSH2 lands on the stack.
        sb.emit_jump(OpCode::Jmp, 3);
        sb.emit(OpCode::Push1);
        sb.emit(OpCode::Push2);
        let engine = run(sb.into_bytes());
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(engine.result_stack().len(), 1);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().get_integer().unwrap(),
            BigInt::from(2)
        );
    }

    #[test]
    fn test_call_and_ret() {
        let mut sb = ScriptBuilder::new();
        sb.emit_jump(OpCode::Call, 3); // call the PUSH5/RET body at offset 3
        sb.emit(OpCode::Ret);          // return from entry
        sb.emit(OpCode::Push5);
        sb.emit(OpCode::Ret);
        let engine = run(sb.into_bytes());
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().get_integer().unwrap(),
            BigInt::from(5)
        );
    }

    #[test]
    fn test_throw_without_try_faults() {
        let mut sb = ScriptBuilder::new();
        sb.emit_push_bytes(b"boom");
        sb.emit(OpCode::Throw);
        let engine = run(sb.into_bytes());
        assert_eq!(engine.state(), VMState::FAULT);
        assert_eq!(engine.fault_message(), Some("boom"));
    }

    #[test]
    fn test_try_catch_recovers() {
        let mut sb = ScriptBuilder::new();
        // Layout: TRY@0(3) PUSHDATA@3(3) THROW@6 DROP@7 PUSH7@8 ENDTRY@9(2) RET@11
        sb.emit_try(7, 0);
        sb.emit_push_bytes(b"x");
        sb.emit(OpCode::Throw);
        // catch: drop the exception, push 7, ENDTRY past the block
        sb.emit(OpCode::Drop);
        sb.emit(OpCode::Push7);
        sb.emit_jump(OpCode::EndTry, 2);
        sb.emit(OpCode::Ret);
        let engine = run(sb.into_bytes());
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().get_integer().unwrap(),
            BigInt::from(7)
        );
    }

    #[test]
    fn test_abort_is_uncatchable() {
        let mut sb = ScriptBuilder::new();
        sb.emit_try(4, 0);
        sb.emit(OpCode::Abort);
        let engine = run(sb.into_bytes());
        assert_eq!(engine.state(), VMState::FAULT);
    }

    #[test]
    fn test_deterministic_replay() {
        let mut sb = ScriptBuilder::new();
        sb.emit_push_int(10);
        sb.emit_push_int(3);
        sb.emit(OpCode::Mod);
        let script = sb.into_bytes();
        let a = run(script.clone());
        let b = run(script);
        assert_eq!(a.state(), b.state());
        assert_eq!(
            a.result_stack().peek(0).unwrap().get_integer().unwrap(),
            b.result_stack().peek(0).unwrap().get_integer().unwrap()
        );
    }
}
