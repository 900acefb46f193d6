//! Slot opcodes: static fields, locals and arguments.

use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::{VmError, VmResult};

pub(super) fn execute(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    use OpCode::*;
    let opcode = instruction.opcode();
    match opcode {
        InitSSlot => {
            let count = instruction.token_u8()? as usize;
            if count == 0 {
                return Err(VmError::InvalidScript("INITSSLOT with zero fields".into()));
            }
            let rc = engine.reference_counter().clone();
            engine.current_context_mut()?.init_static_fields(count, &rc)
        }
        InitSlot => {
            let locals = instruction.token_u8()? as usize;
            let argument_count = instruction.token_u8_1()? as usize;
            if locals == 0 && argument_count == 0 {
                return Err(VmError::InvalidScript("INITSLOT with zero slots".into()));
            }
            // The first pop becomes argument 0.
            let mut arguments = Vec::with_capacity(argument_count);
            for _ in 0..argument_count {
                arguments.push(engine.pop()?);
            }
            let rc = engine.reference_counter().clone();
            engine
                .current_context_mut()?
                .init_slots(locals, arguments, &rc)
        }

        LdSFld0 | LdSFld1 | LdSFld2 | LdSFld3 | LdSFld4 | LdSFld5 | LdSFld6 => {
            let index = (opcode as u8 - LdSFld0 as u8) as usize;
            let item = engine.current_context()?.static_field(index)?;
            engine.push(item)
        }
        LdSFld => {
            let index = instruction.token_u8()? as usize;
            let item = engine.current_context()?.static_field(index)?;
            engine.push(item)
        }
        StSFld0 | StSFld1 | StSFld2 | StSFld3 | StSFld4 | StSFld5 | StSFld6 => {
            let index = (opcode as u8 - StSFld0 as u8) as usize;
            let item = engine.pop()?;
            engine.current_context_mut()?.set_static_field(index, item)
        }
        StSFld => {
            let index = instruction.token_u8()? as usize;
            let item = engine.pop()?;
            engine.current_context_mut()?.set_static_field(index, item)
        }

        LdLoc0 | LdLoc1 | LdLoc2 | LdLoc3 | LdLoc4 | LdLoc5 | LdLoc6 => {
            let index = (opcode as u8 - LdLoc0 as u8) as usize;
            let item = engine.current_context()?.local(index)?;
            engine.push(item)
        }
        LdLoc => {
            let index = instruction.token_u8()? as usize;
            let item = engine.current_context()?.local(index)?;
            engine.push(item)
        }
        StLoc0 | StLoc1 | StLoc2 | StLoc3 | StLoc4 | StLoc5 | StLoc6 => {
            let index = (opcode as u8 - StLoc0 as u8) as usize;
            let item = engine.pop()?;
            engine.current_context_mut()?.set_local(index, item)
        }
        StLoc => {
            let index = instruction.token_u8()? as usize;
            let item = engine.pop()?;
            engine.current_context_mut()?.set_local(index, item)
        }

        LdArg0 | LdArg1 | LdArg2 | LdArg3 | LdArg4 | LdArg5 | LdArg6 => {
            let index = (opcode as u8 - LdArg0 as u8) as usize;
            let item = engine.current_context()?.argument(index)?;
            engine.push(item)
        }
        LdArg => {
            let index = instruction.token_u8()? as usize;
            let item = engine.current_context()?.argument(index)?;
            engine.push(item)
        }
        StArg0 | StArg1 | StArg2 | StArg3 | StArg4 | StArg5 | StArg6 => {
            let index = (opcode as u8 - StArg0 as u8) as usize;
            let item = engine.pop()?;
            engine.current_context_mut()?.set_argument(index, item)
        }
        StArg => {
            let index = instruction.token_u8()? as usize;
            let item = engine.pop()?;
            engine.current_context_mut()?.set_argument(index, item)
        }

        other => Err(VmError::invalid_operation(format!(
            "{other:?} is not a slot opcode"
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

    #[test]
    fn test_locals_round_trip() {
        let mut sb = ScriptBuilder::new();
        sb.emit_raw(OpCode::InitSlot, &[1, 0]);
        sb.emit_push_int(42);
        sb.emit(OpCode::StLoc0);
        sb.emit(OpCode::LdLoc0);
        let mut engine = ExecutionEngine::new(ExecutionEngineLimits::default());
        engine.load_script(Script::new(sb.into_bytes()), -1).unwrap();
        assert_eq!(engine.execute(), VMState::HALT);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().get_integer().unwrap(),
            BigInt::from(42)
        );
    }

    #[test]
    fn test_arguments_loaded_from_stack() {
        let mut sb = ScriptBuilder::new();
        sb.emit_push_int(7);
        sb.emit_push_int(8);
        // Two arguments: first pop (8... top) becomes arg0.
        sb.emit_raw(OpCode::InitSlot, &[0, 2]);
        sb.emit(OpCode::LdArg0);
        let mut engine = ExecutionEngine::new(ExecutionEngineLimits::default());
        engine.load_script(Script::new(sb.into_bytes()), -1).unwrap();
        assert_eq!(engine.execute(), VMState::HALT);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().get_integer().unwrap(),
            BigInt::from(8)
        );
    }

    #[test]
    fn test_ldloc_without_slot_faults() {
        let mut sb = ScriptBuilder::new();
        sb.emit(OpCode::LdLoc0);
        let mut engine = ExecutionEngine::new(ExecutionEngineLimits::default());
        engine.load_script(Script::new(sb.into_bytes()), -1).unwrap();
        assert_eq!(engine.execute(), VMState::FAULT);
    }
}
