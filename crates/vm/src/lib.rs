//! The Neo Virtual Machine.
//!
//! A stack-based, deterministic script interpreter: opcodes, stack items
//! with shared compound state, reference counting with cycle collection,
//! execution contexts with try/finally nesting, and the execution engine
//! driving it all. System calls surface to the hosting engine as a step
//! result instead of being dispatched here, which keeps this crate free
//! of blockchain state.

pub mod evaluation_stack;
pub mod exception_handling;
pub mod execution_context;
pub mod execution_engine;
pub mod instruction;
pub mod jump_table;
pub mod limits;
pub mod op_code;
pub mod reference_counter;
pub mod script;
pub mod script_builder;
pub mod slot;
pub mod stack_item;

pub use evaluation_stack::EvaluationStack;
pub use exception_handling::{ExceptionHandlingContext, ExceptionHandlingState};
pub use execution_context::ExecutionContext;
pub use execution_engine::{ExecutionEngine, StepResult, VMState};
pub use instruction::Instruction;
pub use limits::ExecutionEngineLimits;
pub use op_code::OpCode;
pub use reference_counter::ReferenceCounter;
pub use script::Script;
pub use script_builder::ScriptBuilder;
pub use stack_item::{InteropInterface, StackItem, StackItemType};

use thiserror::Error;

/// Errors that can occur during VM execution.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VmError {
    /// A script or instruction could not be decoded.
    #[error("invalid script: {0}")]
    InvalidScript(String),

    /// An unknown opcode byte.
    #[error("invalid opcode: 0x{0:02x}")]
    InvalidOpCode(u8),

    /// An operation was applied to the wrong item type.
    #[error("invalid type: {0}")]
    InvalidType(String),

    /// An operation was used in an invalid way.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A stack read reached below the bottom.
    #[error("stack underflow")]
    StackUnderflow,

    /// An engine limit was exceeded.
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// Integer arithmetic left the representable range.
    #[error("integer overflow")]
    IntegerOverflow,

    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// The script aborted unconditionally.
    #[error("abort: {0}")]
    Abort(String),

    /// An interop raised an exception the script may catch.
    #[error("catchable: {0}")]
    Catchable(String),
}

impl VmError {
    /// Creates an invalid-operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        VmError::InvalidOperation(message.into())
    }

    /// Creates an invalid-type error.
    pub fn invalid_type(message: impl Into<String>) -> Self {
        VmError::InvalidType(message.into())
    }

    /// Creates a limit-exceeded error.
    pub fn limit_exceeded(message: impl Into<String>) -> Self {
        VmError::LimitExceeded(message.into())
    }
}

/// The result type for the VM.
pub type VmResult<T> = std::result::Result<T, VmError>;
