//! Flow-control opcodes.

use crate::exception_handling::{ExceptionHandlingContext, ExceptionHandlingState};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::StackItem;
use crate::{VmError, VmResult};
use std::cmp::Ordering;

pub(super) fn execute(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    use OpCode::*;
    match instruction.opcode() {
        Nop => Ok(()),

        Jmp | JmpL => jump(engine, instruction, true),
        JmpIf | JmpIfL => {
            let condition = engine.pop_bool()?;
            jump(engine, instruction, condition)
        }
        JmpIfNot | JmpIfNotL => {
            let condition = engine.pop_bool()?;
            jump(engine, instruction, !condition)
        }
        JmpEq | JmpEqL => jump_compare(engine, instruction, &[Ordering::Equal]),
        JmpNe | JmpNeL => jump_compare(engine, instruction, &[Ordering::Less, Ordering::Greater]),
        JmpGt | JmpGtL => jump_compare(engine, instruction, &[Ordering::Greater]),
        JmpGe | JmpGeL => jump_compare(engine, instruction, &[Ordering::Greater, Ordering::Equal]),
        JmpLt | JmpLtL => jump_compare(engine, instruction, &[Ordering::Less]),
        JmpLe | JmpLeL => jump_compare(engine, instruction, &[Ordering::Less, Ordering::Equal]),

        Call | CallL => {
            let target = jump_target(engine, instruction)?;
            engine.call_position(target)
        }
        CallA => {
            let item = engine.pop()?;
            let StackItem::Pointer(pointer) = item else {
                return Err(VmError::invalid_type("CALLA expects a pointer"));
            };
            if pointer.script != *engine.current_context()?.script() {
                return Err(VmError::invalid_operation(
                    "pointer refers to another script",
                ));
            }
            engine.call_position(pointer.position)
        }
        CallT => Err(VmError::invalid_operation(
            "CALLT requires a host resolving method tokens",
        )),

        Abort => Err(VmError::Abort("ABORT called".into())),
        Assert => {
            if !engine.pop_bool()? {
                return Err(VmError::Abort("ASSERT failed".into()));
            }
            Ok(())
        }
        AbortMsg => {
            let message = engine.pop()?.get_string().unwrap_or_default();
            Err(VmError::Abort(message))
        }
        AssertMsg => {
            let message = engine.pop()?.get_string().unwrap_or_default();
            if !engine.pop_bool()? {
                return Err(VmError::Abort(message));
            }
            Ok(())
        }

        Throw => {
            let exception = engine.pop()?;
            engine.throw(exception)
        }

        Try | TryL => {
            let (catch_offset, finally_offset) = if instruction.opcode() == Try {
                (
                    instruction.token_i8()? as i32,
                    instruction.token_i8_1()? as i32,
                )
            } else {
                (instruction.token_i32()?, instruction.token_i32_1()?)
            };
            if catch_offset == 0 && finally_offset == 0 {
                return Err(VmError::InvalidScript(
                    "TRY with neither catch nor finally".into(),
                ));
            }
            let base = engine.current_context()?.instruction_pointer();
            let resolve = |offset: i32| -> Option<usize> {
                if offset == 0 {
                    None
                } else {
                    Some((base as i64 + offset as i64) as usize)
                }
            };
            let max_depth = engine.limits().max_try_nesting_depth;
            let context = engine.current_context_mut()?;
            if context.try_depth() >= max_depth {
                return Err(VmError::limit_exceeded("try nesting too deep"));
            }
            context.push_try(ExceptionHandlingContext::new(
                resolve(catch_offset),
                resolve(finally_offset),
            ));
            Ok(())
        }

        EndTry | EndTryL => {
            let target = jump_target(engine, instruction)?;
            let pending_finally = {
                let context = engine.current_context_mut()?;
                let entry = context
                    .current_try_mut()
                    .ok_or_else(|| VmError::invalid_operation("ENDTRY outside try"))?;
                if entry.state == ExceptionHandlingState::Finally {
                    return Err(VmError::invalid_operation("ENDTRY inside finally"));
                }
                if entry.has_finally() {
                    entry.state = ExceptionHandlingState::Finally;
                    entry.end_pointer = Some(target);
                    entry.finally_pointer
                } else {
                    context.pop_try();
                    None
                }
            };
            match pending_finally {
                Some(finally_pointer) => engine.jump_to(finally_pointer),
                None => engine.jump_to(target),
            }
        }

        EndFinally => {
            let entry = engine
                .current_context_mut()?
                .pop_try()
                .ok_or_else(|| VmError::invalid_operation("ENDFINALLY outside try"))?;
            if engine.uncaught_exception().is_some() {
                // The finally ran on the unwinding path; keep unwinding.
                engine.handle_exception()
            } else {
                let target = entry.end_pointer.ok_or_else(|| {
                    VmError::invalid_operation("ENDFINALLY without a continuation")
                })?;
                engine.jump_to(target)
            }
        }

        Ret => engine.unload_current_context(),

        other => Err(VmError::invalid_operation(format!(
            "{other:?} is not a control opcode"
        ))),
    }
}

fn jump_target(engine: &ExecutionEngine, instruction: &Instruction) -> VmResult<usize> {
    let offset = match instruction.operand().len() {
        1 => instruction.token_i8()? as i32,
        _ => instruction.token_i32()?,
    };
    let base = engine.current_context()?.instruction_pointer();
    let target = base as i64 + offset as i64;
    if target < 0 || target > engine.current_context()?.script().len() as i64 {
        return Err(VmError::InvalidScript(format!(
            "jump target {target} out of range"
        )));
    }
    Ok(target as usize)
}

fn jump(engine: &mut ExecutionEngine, instruction: &Instruction, condition: bool) -> VmResult<()> {
    let target = jump_target(engine, instruction)?;
    if condition {
        engine.jump_to(target)?;
    }
    Ok(())
}

fn jump_compare(
    engine: &mut ExecutionEngine,
    instruction: &Instruction,
    accepted: &[Ordering],
) -> VmResult<()> {
    let b = engine.pop_int()?;
    let a = engine.pop_int()?;
    jump(engine, instruction, accepted.contains(&a.cmp(&b)))
}
