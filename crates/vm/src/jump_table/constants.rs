//! Constant-pushing opcodes.

use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::{Pointer, StackItem};
use crate::{VmError, VmResult};
use num_bigint::BigInt;

pub(super) fn execute(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let opcode = instruction.opcode();
    match opcode {
        OpCode::PushInt8
        | OpCode::PushInt16
        | OpCode::PushInt32
        | OpCode::PushInt64
        | OpCode::PushInt128
        | OpCode::PushInt256 => {
            let value = BigInt::from_signed_bytes_le(instruction.operand());
            engine.push(StackItem::Integer(value))
        }
        OpCode::PushT => engine.push(StackItem::from_bool(true)),
        OpCode::PushF => engine.push(StackItem::from_bool(false)),
        OpCode::PushA => {
            let context = engine.current_context()?;
            let base = context.instruction_pointer();
            let offset = instruction.token_i32()?;
            let target = base as i64 + offset as i64;
            if target < 0 || target > context.script().len() as i64 {
                return Err(VmError::InvalidScript(format!(
                    "pointer target {target} out of range"
                )));
            }
            let pointer = Pointer {
                script: context.script().clone(),
                position: target as usize,
            };
            engine.push(StackItem::Pointer(pointer))
        }
        OpCode::PushNull => engine.push(StackItem::Null),
        OpCode::PushData1 | OpCode::PushData2 | OpCode::PushData4 => {
            if instruction.operand().len() > engine.limits().max_item_size {
                return Err(VmError::limit_exceeded("pushed data exceeds max item size"));
            }
            engine.push(StackItem::from_bytes(instruction.operand().to_vec()))
        }
        OpCode::PushM1 => engine.push(StackItem::from_int(-1)),
        _ => {
            // PUSH0..PUSH16 encode their value in the opcode byte.
            let value = (opcode as u8) - (OpCode::Push0 as u8);
            engine.push(StackItem::from_int(value))
        }
    }
}
