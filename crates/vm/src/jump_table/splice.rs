//! Splice opcodes over byte strings and buffers.

use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::StackItem;
use crate::{VmError, VmResult};

pub(super) fn execute(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    use OpCode::*;
    match instruction.opcode() {
        NewBuffer => {
            let length = engine.pop_i32()?;
            if length < 0 || length as usize > engine.limits().max_item_size {
                return Err(VmError::invalid_operation(format!(
                    "invalid buffer length {length}"
                )));
            }
            engine.push(StackItem::from_buffer(vec![0u8; length as usize]))
        }

        Memcpy => {
            let count = non_negative(engine.pop_i32()?, "count")?;
            let src_index = non_negative(engine.pop_i32()?, "source index")?;
            let source = engine.pop_bytes()?;
            let dst_index = non_negative(engine.pop_i32()?, "destination index")?;
            let destination = engine.pop()?;
            let StackItem::Buffer(buffer) = destination else {
                return Err(VmError::invalid_type("MEMCPY destination must be a buffer"));
            };
            if src_index + count > source.len() {
                return Err(VmError::invalid_operation("MEMCPY source out of range"));
            }
            buffer.with_mut(|bytes| {
                if dst_index + count > bytes.len() {
                    return Err(VmError::invalid_operation(
                        "MEMCPY destination out of range",
                    ));
                }
                bytes[dst_index..dst_index + count]
                    .copy_from_slice(&source[src_index..src_index + count]);
                Ok(())
            })
        }

        Cat => {
            let second = engine.pop_bytes()?;
            let first = engine.pop_bytes()?;
            if first.len() + second.len() > engine.limits().max_item_size {
                return Err(VmError::limit_exceeded("CAT result exceeds max item size"));
            }
            let mut result = first;
            result.extend_from_slice(&second);
            engine.push(StackItem::from_buffer(result))
        }

        SubStr => {
            let count = non_negative(engine.pop_i32()?, "count")?;
            let index = non_negative(engine.pop_i32()?, "index")?;
            let data = engine.pop_bytes()?;
            if index + count > data.len() {
                return Err(VmError::invalid_operation(format!(
                    "SUBSTR range {index}+{count} exceeds length {}",
                    data.len()
                )));
            }
            engine.push(StackItem::from_buffer(data[index..index + count].to_vec()))
        }

        Left => {
            let count = non_negative(engine.pop_i32()?, "count")?;
            let data = engine.pop_bytes()?;
            if count > data.len() {
                return Err(VmError::invalid_operation("LEFT count exceeds length"));
            }
            engine.push(StackItem::from_buffer(data[..count].to_vec()))
        }

        Right => {
            let count = non_negative(engine.pop_i32()?, "count")?;
            let data = engine.pop_bytes()?;
            if count > data.len() {
                return Err(VmError::invalid_operation("RIGHT count exceeds length"));
            }
            engine.push(StackItem::from_buffer(data[data.len() - count..].to_vec()))
        }

        other => Err(VmError::invalid_operation(format!(
            "{other:?} is not a splice opcode"
        ))),
    }
}

fn non_negative(value: i32, what: &str) -> VmResult<usize> {
    if value < 0 {
        return Err(VmError::invalid_operation(format!("negative {what}")));
    }
    Ok(value as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::ExecutionEngineLimits;
    use crate::script::Script;
    use crate::script_builder::ScriptBuilder;
    use crate::{StackItemType, VMState};

    fn run(build: impl FnOnce(&mut ScriptBuilder)) -> ExecutionEngine {
        let mut sb = ScriptBuilder::new();
        build(&mut sb);
        let mut engine = ExecutionEngine::new(ExecutionEngineLimits::default());
        engine.load_script(Script::new(sb.into_bytes()), -1).unwrap();
        engine.execute();
        engine
    }

    #[test]
    fn test_substr_result_is_buffer() {
        let engine = run(|sb| {
            sb.emit_push_bytes(b"hello");
            sb.emit_push_int(1);
            sb.emit_push_int(3);
            sb.emit(OpCode::SubStr);
        });
        assert_eq!(engine.state(), VMState::HALT);
        let result = engine.result_stack().peek(0).unwrap();
        assert_eq!(result.item_type(), StackItemType::Buffer);
        assert_eq!(result.get_bytes().unwrap(), b"ell");
    }

    #[test]
    fn test_substr_negative_index_faults() {
        let engine = run(|sb| {
            sb.emit_push_bytes(b"hello");
            sb.emit_push_int(-1);
            sb.emit_push_int(3);
            sb.emit(OpCode::SubStr);
        });
        assert_eq!(engine.state(), VMState::FAULT);
    }

    #[test]
    fn test_substr_negative_count_faults() {
        let engine = run(|sb| {
            sb.emit_push_bytes(b"hello");
            sb.emit_push_int(0);
            sb.emit_push_int(-3);
            sb.emit(OpCode::SubStr);
        });
        assert_eq!(engine.state(), VMState::FAULT);
    }

    #[test]
    fn test_substr_overrun_faults() {
        let engine = run(|sb| {
            sb.emit_push_bytes(b"hello");
            sb.emit_push_int(3);
            sb.emit_push_int(3);
            sb.emit(OpCode::SubStr);
        });
        assert_eq!(engine.state(), VMState::FAULT);
    }

    #[test]
    fn test_substr_to_exact_end_halts() {
        // index + count == len is the inclusive boundary.
        let engine = run(|sb| {
            sb.emit_push_bytes(b"hello");
            sb.emit_push_int(5);
            sb.emit_push_int(0);
            sb.emit(OpCode::SubStr);
        });
        assert_eq!(engine.state(), VMState::HALT);
        assert!(engine.result_stack().peek(0).unwrap().get_bytes().unwrap().is_empty());
    }

    #[test]
    fn test_substr_on_array_faults() {
        let engine = run(|sb| {
            sb.emit(OpCode::NewArray0);
            sb.emit_push_int(0);
            sb.emit_push_int(1);
            sb.emit(OpCode::SubStr);
        });
        assert_eq!(engine.state(), VMState::FAULT);
    }

    #[test]
    fn test_cat_left_right() {
        let engine = run(|sb| {
            sb.emit_push_bytes(b"ab");
            sb.emit_push_bytes(b"cd");
            sb.emit(OpCode::Cat);
        });
        assert_eq!(
            engine.result_stack().peek(0).unwrap().get_bytes().unwrap(),
            b"abcd"
        );

        let engine = run(|sb| {
            sb.emit_push_bytes(b"hello");
            sb.emit_push_int(2);
            sb.emit(OpCode::Left);
        });
        assert_eq!(
            engine.result_stack().peek(0).unwrap().get_bytes().unwrap(),
            b"he"
        );

        let engine = run(|sb| {
            sb.emit_push_bytes(b"hello");
            sb.emit_push_int(2);
            sb.emit(OpCode::Right);
        });
        assert_eq!(
            engine.result_stack().peek(0).unwrap().get_bytes().unwrap(),
            b"lo"
        );
    }

    #[test]
    fn test_memcpy() {
        let engine = run(|sb| {
            // dst = NEWBUFFER 4; keep it on the stack, copy "ab" at offset 1.
            sb.emit_push_int(4);
            sb.emit(OpCode::NewBuffer);
            sb.emit(OpCode::Dup);
            sb.emit_push_int(1); // destination index
            sb.emit_push_bytes(b"ab");
            sb.emit_push_int(0); // source index
            sb.emit_push_int(2); // count
            sb.emit(OpCode::Memcpy);
        });
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().get_bytes().unwrap(),
            vec![0, b'a', b'b', 0]
        );
    }
}
