//! Execution contexts: one frame of the invocation stack.

use crate::evaluation_stack::EvaluationStack;
use crate::exception_handling::ExceptionHandlingContext;
use crate::instruction::Instruction;
use crate::reference_counter::ReferenceCounter;
use crate::script::Script;
use crate::slot::Slot;
use crate::{VmError, VmResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static NEXT_CONTEXT_ID: AtomicUsize = AtomicUsize::new(1);

/// One frame of the invocation stack.
///
/// A frame created for a same-script CALL shares its evaluation stack and
/// static fields with the caller; a frame for a freshly loaded script owns
/// its own. Hosts attach per-frame state keyed by [`ExecutionContext::id`].
#[derive(Debug)]
pub struct ExecutionContext {
    id: usize,
    script: Script,
    rvcount: i32,
    instruction_pointer: usize,
    evaluation_stack: Arc<Mutex<EvaluationStack>>,
    static_fields: Option<Arc<Mutex<Slot>>>,
    local_variables: Option<Slot>,
    arguments: Option<Slot>,
    try_stack: Vec<ExceptionHandlingContext>,
}

impl ExecutionContext {
    /// Creates a frame owning a fresh evaluation stack.
    pub fn new(script: Script, rvcount: i32, reference_counter: &ReferenceCounter) -> Self {
        Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            script,
            rvcount,
            instruction_pointer: 0,
            evaluation_stack: Arc::new(Mutex::new(EvaluationStack::new(
                reference_counter.clone(),
            ))),
            static_fields: None,
            local_variables: None,
            arguments: None,
            try_stack: Vec::new(),
        }
    }

    /// Creates the frame for a same-script CALL: shared evaluation stack
    /// and static fields, fresh everything else.
    pub fn clone_for_call(&self, initial_position: usize) -> Self {
        Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            script: self.script.clone(),
            rvcount: -1,
            instruction_pointer: initial_position,
            evaluation_stack: Arc::clone(&self.evaluation_stack),
            static_fields: self.static_fields.as_ref().map(Arc::clone),
            local_variables: None,
            arguments: None,
            try_stack: Vec::new(),
        }
    }

    /// A stable identity for host-attached state.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The script this frame executes.
    pub fn script(&self) -> &Script {
        &self.script
    }

    /// How many results this frame returns; -1 means all.
    pub fn rvcount(&self) -> i32 {
        self.rvcount
    }

    /// The current instruction pointer.
    pub fn instruction_pointer(&self) -> usize {
        self.instruction_pointer
    }

    /// Moves the instruction pointer.
    pub fn set_instruction_pointer(&mut self, position: usize) {
        self.instruction_pointer = position;
    }

    /// The instruction at the current pointer; implicit RET past the end.
    pub fn current_instruction(&self) -> VmResult<Instruction> {
        if self.instruction_pointer >= self.script.len() {
            return Ok(Instruction::ret());
        }
        self.script.instruction_at(self.instruction_pointer)
    }

    /// Whether another frame shares this frame's evaluation stack.
    pub fn shares_stack_with(&self, other: &ExecutionContext) -> bool {
        Arc::ptr_eq(&self.evaluation_stack, &other.evaluation_stack)
    }

    /// Runs `f` over the evaluation stack.
    pub fn with_stack<R>(&self, f: impl FnOnce(&mut EvaluationStack) -> R) -> R {
        f(&mut self.evaluation_stack.lock())
    }

    /// The number of items on the evaluation stack.
    pub fn stack_len(&self) -> usize {
        self.evaluation_stack.lock().len()
    }

    /// Initializes the static field slot.
    pub fn init_static_fields(&mut self, count: usize, rc: &ReferenceCounter) -> VmResult<()> {
        if self.static_fields.is_some() {
            return Err(VmError::invalid_operation("static fields already initialized"));
        }
        self.static_fields = Some(Arc::new(Mutex::new(Slot::new(count, rc.clone()))));
        Ok(())
    }

    /// Initializes the local and argument slots.
    pub fn init_slots(
        &mut self,
        locals: usize,
        arguments: Vec<crate::stack_item::StackItem>,
        rc: &ReferenceCounter,
    ) -> VmResult<()> {
        if self.local_variables.is_some() || self.arguments.is_some() {
            return Err(VmError::invalid_operation("slots already initialized"));
        }
        if locals > 0 {
            self.local_variables = Some(Slot::new(locals, rc.clone()));
        }
        if !arguments.is_empty() {
            self.arguments = Some(Slot::with_items(arguments, rc.clone()));
        }
        Ok(())
    }

    /// Reads a static field.
    pub fn static_field(&self, index: usize) -> VmResult<crate::stack_item::StackItem> {
        let fields = self
            .static_fields
            .as_ref()
            .ok_or_else(|| VmError::invalid_operation("no static fields"))?;
        fields.lock().get(index)
    }

    /// Writes a static field.
    pub fn set_static_field(
        &mut self,
        index: usize,
        item: crate::stack_item::StackItem,
    ) -> VmResult<()> {
        let fields = self
            .static_fields
            .as_ref()
            .ok_or_else(|| VmError::invalid_operation("no static fields"))?;
        fields.lock().set(index, item)
    }

    /// Reads a local variable.
    pub fn local(&self, index: usize) -> VmResult<crate::stack_item::StackItem> {
        self.local_variables
            .as_ref()
            .ok_or_else(|| VmError::invalid_operation("no local variables"))?
            .get(index)
    }

    /// Writes a local variable.
    pub fn set_local(&mut self, index: usize, item: crate::stack_item::StackItem) -> VmResult<()> {
        self.local_variables
            .as_mut()
            .ok_or_else(|| VmError::invalid_operation("no local variables"))?
            .set(index, item)
    }

    /// Reads an argument.
    pub fn argument(&self, index: usize) -> VmResult<crate::stack_item::StackItem> {
        self.arguments
            .as_ref()
            .ok_or_else(|| VmError::invalid_operation("no arguments"))?
            .get(index)
    }

    /// Writes an argument.
    pub fn set_argument(
        &mut self,
        index: usize,
        item: crate::stack_item::StackItem,
    ) -> VmResult<()> {
        self.arguments
            .as_mut()
            .ok_or_else(|| VmError::invalid_operation("no arguments"))?
            .set(index, item)
    }

    /// The try stack, innermost last.
    pub fn try_stack(&self) -> &[ExceptionHandlingContext] {
        &self.try_stack
    }

    /// Pushes a try entry.
    pub fn push_try(&mut self, entry: ExceptionHandlingContext) {
        self.try_stack.push(entry);
    }

    /// Pops the innermost try entry.
    pub fn pop_try(&mut self) -> Option<ExceptionHandlingContext> {
        self.try_stack.pop()
    }

    /// The innermost try entry, mutable.
    pub fn current_try_mut(&mut self) -> Option<&mut ExceptionHandlingContext> {
        self.try_stack.last_mut()
    }

    /// The current try nesting depth.
    pub fn try_depth(&self) -> usize {
        self.try_stack.len()
    }

    /// Releases slot references when the frame unloads. The shared static
    /// fields are released only when no surviving frame shares them, which
    /// the engine decides.
    pub fn clear_slot_references(&mut self, release_statics: bool) {
        if let Some(slot) = self.local_variables.as_mut() {
            slot.clear_references();
        }
        if let Some(slot) = self.arguments.as_mut() {
            slot.clear_references();
        }
        if release_statics {
            if let Some(fields) = self.static_fields.take() {
                fields.lock().clear_references();
            }
        }
    }

    /// Whether another frame shares this frame's static fields.
    pub fn shares_statics_with(&self, other: &ExecutionContext) -> bool {
        match (&self.static_fields, &other.static_fields) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack_item::StackItem;

    #[test]
    fn test_current_instruction_implicit_ret() {
        let rc = ReferenceCounter::new();
        let ctx = ExecutionContext::new(Script::new(vec![]), -1, &rc);
        let instruction = ctx.current_instruction().unwrap();
        assert_eq!(instruction.opcode(), crate::OpCode::Ret);
    }

    #[test]
    fn test_clone_for_call_shares_stack() {
        let rc = ReferenceCounter::new();
        let ctx = ExecutionContext::new(Script::new(vec![0x40]), -1, &rc);
        ctx.with_stack(|s| s.push(StackItem::from_int(1)));
        let cloned = ctx.clone_for_call(0);
        assert!(cloned.shares_stack_with(&ctx));
        assert_eq!(cloned.stack_len(), 1);
        assert_ne!(cloned.id(), ctx.id());
    }

    #[test]
    fn test_slots() {
        let rc = ReferenceCounter::new();
        let mut ctx = ExecutionContext::new(Script::new(vec![0x40]), -1, &rc);
        ctx.init_slots(2, vec![StackItem::from_int(7)], &rc).unwrap();
        assert!(ctx.local(0).unwrap().is_null());
        ctx.set_local(1, StackItem::from_int(3)).unwrap();
        assert_eq!(
            ctx.local(1).unwrap().get_integer().unwrap(),
            num_bigint::BigInt::from(3)
        );
        assert_eq!(
            ctx.argument(0).unwrap().get_integer().unwrap(),
            num_bigint::BigInt::from(7)
        );
        assert!(ctx.init_slots(1, vec![], &rc).is_err());
    }

    #[test]
    fn test_static_fields_shared_on_call() {
        let rc = ReferenceCounter::new();
        let mut ctx = ExecutionContext::new(Script::new(vec![0x40]), -1, &rc);
        ctx.init_static_fields(1, &rc).unwrap();
        let mut cloned = ctx.clone_for_call(0);
        cloned.set_static_field(0, StackItem::from_int(9)).unwrap();
        assert_eq!(
            ctx.static_field(0).unwrap().get_integer().unwrap(),
            num_bigint::BigInt::from(9)
        );
        assert!(ctx.shares_statics_with(&cloned));
    }
}
