//! Opcode dispatch, grouped by instruction family.

pub mod compound;
pub mod constants;
pub mod control;
pub mod numeric;
pub mod slot_ops;
pub mod splice;
pub mod stack_ops;
pub mod types_ops;

use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::{VmError, VmResult};

/// Executes one decoded instruction against the engine.
pub fn execute(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    use OpCode::*;
    match instruction.opcode() {
        // Constants
        PushInt8 | PushInt16 | PushInt32 | PushInt64 | PushInt128 | PushInt256 | PushT
        | PushF | PushA | PushNull | PushData1 | PushData2 | PushData4 | PushM1 | Push0
        | Push1 | Push2 | Push3 | Push4 | Push5 | Push6 | Push7 | Push8 | Push9 | Push10
        | Push11 | Push12 | Push13 | Push14 | Push15 | Push16 => {
            constants::execute(engine, instruction)
        }

        // Flow control
        Nop | Jmp | JmpL | JmpIf | JmpIfL | JmpIfNot | JmpIfNotL | JmpEq | JmpEqL | JmpNe
        | JmpNeL | JmpGt | JmpGtL | JmpGe | JmpGeL | JmpLt | JmpLtL | JmpLe | JmpLeL | Call
        | CallL | CallA | CallT | Abort | Assert | Throw | Try | TryL | EndTry | EndTryL
        | EndFinally | Ret | AbortMsg | AssertMsg => control::execute(engine, instruction),

        // SYSCALL surfaces through the engine's step result.
        Syscall => Err(VmError::invalid_operation(
            "SYSCALL must be dispatched by the host",
        )),

        // Stack manipulation
        Depth | Drop | Nip | Xdrop | Clear | Dup | Over | Pick | Tuck | Swap | Rot | Roll
        | Reverse3 | Reverse4 | ReverseN => stack_ops::execute(engine, instruction),

        // Slots
        InitSSlot | InitSlot | LdSFld0 | LdSFld1 | LdSFld2 | LdSFld3 | LdSFld4 | LdSFld5
        | LdSFld6 | LdSFld | StSFld0 | StSFld1 | StSFld2 | StSFld3 | StSFld4 | StSFld5
        | StSFld6 | StSFld | LdLoc0 | LdLoc1 | LdLoc2 | LdLoc3 | LdLoc4 | LdLoc5 | LdLoc6
        | LdLoc | StLoc0 | StLoc1 | StLoc2 | StLoc3 | StLoc4 | StLoc5 | StLoc6 | StLoc
        | LdArg0 | LdArg1 | LdArg2 | LdArg3 | LdArg4 | LdArg5 | LdArg6 | LdArg | StArg0
        | StArg1 | StArg2 | StArg3 | StArg4 | StArg5 | StArg6 | StArg => {
            slot_ops::execute(engine, instruction)
        }

        // Splice
        NewBuffer | Memcpy | Cat | SubStr | Left | Right => {
            splice::execute(engine, instruction)
        }

        // Bitwise, arithmetic, boolean and comparison
        Invert | And | Or | Xor | Equal | NotEqual | Sign | Abs | Negate | Inc | Dec | Add
        | Sub | Mul | Div | Mod | Pow | Sqrt | ModMul | ModPow | Shl | Shr | Not | BoolAnd
        | BoolOr | Nz | NumEqual | NumNotEqual | Lt | Le | Gt | Ge | Min | Max | Within => {
            numeric::execute(engine, instruction)
        }

        // Compound types
        PackMap | PackStruct | Pack | Unpack | NewArray0 | NewArray | NewArrayT
        | NewStruct0 | NewStruct | NewMap | Size | HasKey | Keys | Values | PickItem
        | Append | SetItem | ReverseItems | Remove | ClearItems | PopItem => {
            compound::execute(engine, instruction)
        }

        // Types
        IsNull | IsType | Convert => types_ops::execute(engine, instruction),
    }
}
