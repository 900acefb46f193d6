//! Stack-manipulation opcodes.

use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::StackItem;
use crate::{VmError, VmResult};

pub(super) fn execute(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    use OpCode::*;
    match instruction.opcode() {
        Depth => {
            let depth = engine.current_context()?.stack_len();
            engine.push(StackItem::from_int(depth as i64))
        }
        Drop => {
            engine.pop()?;
            Ok(())
        }
        Nip => {
            engine.current_context()?.with_stack(|s| s.remove(1))?;
            Ok(())
        }
        Xdrop => {
            let n = engine.pop_i32()?;
            if n < 0 {
                return Err(VmError::invalid_operation("negative XDROP depth"));
            }
            engine
                .current_context()?
                .with_stack(|s| s.remove(n as usize))?;
            Ok(())
        }
        Clear => {
            engine.current_context()?.with_stack(|s| s.clear());
            Ok(())
        }
        Dup => {
            let top = engine.peek(0)?;
            engine.push(top)
        }
        Over => {
            let item = engine.peek(1)?;
            engine.push(item)
        }
        Pick => {
            let n = engine.pop_i32()?;
            if n < 0 {
                return Err(VmError::invalid_operation("negative PICK depth"));
            }
            let item = engine.peek(n as usize)?;
            engine.push(item)
        }
        Tuck => {
            let top = engine.peek(0)?;
            engine.current_context()?.with_stack(|s| s.insert(2, top))
        }
        Swap => {
            let item = engine.current_context()?.with_stack(|s| s.remove(1))?;
            engine.push(item)
        }
        Rot => {
            let item = engine.current_context()?.with_stack(|s| s.remove(2))?;
            engine.push(item)
        }
        Roll => {
            let n = engine.pop_i32()?;
            if n < 0 {
                return Err(VmError::invalid_operation("negative ROLL depth"));
            }
            if n == 0 {
                return Ok(());
            }
            let item = engine
                .current_context()?
                .with_stack(|s| s.remove(n as usize))?;
            engine.push(item)
        }
        Reverse3 => engine.current_context()?.with_stack(|s| s.reverse(3)),
        Reverse4 => engine.current_context()?.with_stack(|s| s.reverse(4)),
        ReverseN => {
            let n = engine.pop_i32()?;
            if n < 0 {
                return Err(VmError::invalid_operation("negative REVERSEN count"));
            }
            engine.current_context()?.with_stack(|s| s.reverse(n as usize))
        }
        other => Err(VmError::invalid_operation(format!(
            "{other:?} is not a stack opcode"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::ExecutionEngineLimits;
    use crate::script::Script;
    use crate::script_builder::ScriptBuilder;
    use crate::VMState;
    use num_bigint::BigInt;

    fn run(build: impl FnOnce(&mut ScriptBuilder)) -> Vec<BigInt> {
        let mut sb = ScriptBuilder::new();
        build(&mut sb);
        let mut engine = ExecutionEngine::new(ExecutionEngineLimits::default());
        engine.load_script(Script::new(sb.into_bytes()), -1).unwrap();
        assert_eq!(engine.execute(), VMState::HALT);
        engine
            .result_stack()
            .items()
            .iter()
            .map(|i| i.get_integer().unwrap())
            .collect()
    }

    #[test]
    fn test_dup_swap_rot() {
        // 1 2 DUP -> 1 2 2
        assert_eq!(
            run(|sb| {
                sb.emit_push_int(1);
                sb.emit_push_int(2);
                sb.emit(OpCode::Dup);
            }),
            vec![BigInt::from(1), BigInt::from(2), BigInt::from(2)]
        );
        // 1 2 SWAP -> 2 1
        assert_eq!(
            run(|sb| {
                sb.emit_push_int(1);
                sb.emit_push_int(2);
                sb.emit(OpCode::Swap);
            }),
            vec![BigInt::from(2), BigInt::from(1)]
        );
        // 1 2 3 ROT -> 2 3 1
        assert_eq!(
            run(|sb| {
                sb.emit_push_int(1);
                sb.emit_push_int(2);
                sb.emit_push_int(3);
                sb.emit(OpCode::Rot);
            }),
            vec![BigInt::from(2), BigInt::from(3), BigInt::from(1)]
        );
    }

    #[test]
    fn test_pick_roll() {
        // 1 2 3, PICK 2 -> copies the 1
        assert_eq!(
            run(|sb| {
                sb.emit_push_int(1);
                sb.emit_push_int(2);
                sb.emit_push_int(3);
                sb.emit_push_int(2);
                sb.emit(OpCode::Pick);
            }),
            vec![
                BigInt::from(1),
                BigInt::from(2),
                BigInt::from(3),
                BigInt::from(1)
            ]
        );
        // 1 2 3, ROLL 2 -> moves the 1
        assert_eq!(
            run(|sb| {
                sb.emit_push_int(1);
                sb.emit_push_int(2);
                sb.emit_push_int(3);
                sb.emit_push_int(2);
                sb.emit(OpCode::Roll);
            }),
            vec![BigInt::from(2), BigInt::from(3), BigInt::from(1)]
        );
    }

    #[test]
    fn test_depth_and_drop() {
        assert_eq!(
            run(|sb| {
                sb.emit_push_int(9);
                sb.emit(OpCode::Depth);
            }),
            vec![BigInt::from(9), BigInt::from(1)]
        );
        assert_eq!(
            run(|sb| {
                sb.emit_push_int(1);
                sb.emit_push_int(2);
                sb.emit(OpCode::Drop);
            }),
            vec![BigInt::from(1)]
        );
    }
}
