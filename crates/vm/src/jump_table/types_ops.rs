//! Type-introspection opcodes.

use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::{StackItem, StackItemType};
use crate::{VmError, VmResult};

pub(super) fn execute(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    match instruction.opcode() {
        OpCode::IsNull => {
            let item = engine.pop()?;
            engine.push(StackItem::from_bool(item.is_null()))
        }
        OpCode::IsType => {
            let target = type_operand(instruction)?;
            if target == StackItemType::Any {
                return Err(VmError::InvalidScript("ISTYPE of Any".into()));
            }
            let item = engine.pop()?;
            engine.push(StackItem::from_bool(item.item_type() == target))
        }
        OpCode::Convert => {
            let target = type_operand(instruction)?;
            let item = engine.pop()?;
            let converted = item.convert_to(target)?;
            engine.push(converted)
        }
        other => Err(VmError::invalid_operation(format!(
            "{other:?} is not a type opcode"
        ))),
    }
}

fn type_operand(instruction: &Instruction) -> VmResult<StackItemType> {
    let byte = instruction.token_u8()?;
    StackItemType::from_byte(byte)
        .ok_or_else(|| VmError::InvalidScript(format!("invalid type byte 0x{byte:02x}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::ExecutionEngineLimits;
    use crate::script::Script;
    use crate::script_builder::ScriptBuilder;
    use crate::VMState;

    fn run(build: impl FnOnce(&mut ScriptBuilder)) -> ExecutionEngine {
        let mut sb = ScriptBuilder::new();
        build(&mut sb);
        let mut engine = ExecutionEngine::new(ExecutionEngineLimits::default());
        engine.load_script(Script::new(sb.into_bytes()), -1).unwrap();
        engine.execute();
        engine
    }

    #[test]
    fn test_isnull() {
        let engine = run(|sb| {
            sb.emit_push_null();
            sb.emit(OpCode::IsNull);
        });
        assert!(engine.result_stack().peek(0).unwrap().get_bool());
    }

    #[test]
    fn test_istype() {
        let engine = run(|sb| {
            sb.emit_push_int(1);
            sb.emit_raw(OpCode::IsType, &[StackItemType::Integer as u8]);
        });
        assert!(engine.result_stack().peek(0).unwrap().get_bool());
    }

    #[test]
    fn test_convert_int_to_bytestring() {
        let engine = run(|sb| {
            sb.emit_push_int(0x41);
            sb.emit_raw(OpCode::Convert, &[StackItemType::ByteString as u8]);
        });
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().get_bytes().unwrap(),
            vec![0x41]
        );
    }

    #[test]
    fn test_convert_invalid_faults() {
        let engine = run(|sb| {
            sb.emit_push_int(1);
            sb.emit_raw(OpCode::Convert, &[StackItemType::Map as u8]);
        });
        assert_eq!(engine.state(), VMState::FAULT);
    }
}
