//! Compound-type opcodes: arrays, structs, maps.

use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::{require_primitive_key, StackItem};
use crate::{VmError, VmResult};
use num_traits::ToPrimitive;

pub(super) fn execute(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    use OpCode::*;
    match instruction.opcode() {
        PackMap => {
            let count = pop_count(engine)?;
            let map = StackItem::new_map();
            let StackItem::Map(entries) = &map else { unreachable!() };
            for _ in 0..count {
                let key = engine.pop()?;
                let value = engine.pop()?;
                require_primitive_key(&key)?;
                engine.reference_counter().add_reference(&key);
                engine.reference_counter().add_reference(&value);
                entries.insert(key, value)?;
            }
            engine.push(map)
        }
        Pack | PackStruct => {
            let count = pop_count(engine)?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                let item = engine.pop()?;
                engine.reference_counter().add_reference(&item);
                items.push(item);
            }
            let packed = if instruction.opcode() == Pack {
                StackItem::from_array(items)
            } else {
                StackItem::from_struct(items)
            };
            engine.push(packed)
        }
        Unpack => {
            let item = engine.pop()?;
            match &item {
                StackItem::Array(list) | StackItem::Struct(list) => {
                    let items = list.items();
                    for child in items.iter().rev() {
                        engine.reference_counter().remove_reference(child);
                        engine.push(child.clone())?;
                    }
                    engine.push(StackItem::from_int(items.len() as i64))
                }
                StackItem::Map(map) => {
                    let entries = map.entries();
                    for (key, value) in entries.iter().rev() {
                        engine.reference_counter().remove_reference(value);
                        engine.reference_counter().remove_reference(key);
                        engine.push(value.clone())?;
                        engine.push(key.clone())?;
                    }
                    engine.push(StackItem::from_int(entries.len() as i64))
                }
                other => Err(VmError::invalid_type(format!(
                    "UNPACK of {:?}",
                    other.item_type()
                ))),
            }
        }

        NewArray0 => engine.push(StackItem::from_array(Vec::new())),
        NewStruct0 => engine.push(StackItem::from_struct(Vec::new())),
        NewArray | NewArrayT => {
            let count = pop_count(engine)?;
            let items = vec![StackItem::Null; count];
            for item in &items {
                engine.reference_counter().add_reference(item);
            }
            engine.push(StackItem::from_array(items))
        }
        NewStruct => {
            let count = pop_count(engine)?;
            let items = vec![StackItem::Null; count];
            for item in &items {
                engine.reference_counter().add_reference(item);
            }
            engine.push(StackItem::from_struct(items))
        }
        NewMap => engine.push(StackItem::new_map()),

        Size => {
            let item = engine.pop()?;
            let size = match &item {
                StackItem::Array(list) | StackItem::Struct(list) => list.len(),
                StackItem::Map(map) => map.len(),
                other => other.get_bytes()?.len(),
            };
            engine.push(StackItem::from_int(size as i64))
        }

        HasKey => {
            let key = engine.pop()?;
            let collection = engine.pop()?;
            let result = match &collection {
                StackItem::Array(list) | StackItem::Struct(list) => {
                    let index = index_of(&key)?;
                    index < list.len()
                }
                StackItem::Map(map) => map.contains_key(&key)?,
                StackItem::Buffer(_) | StackItem::ByteString(_) => {
                    let index = index_of(&key)?;
                    index < collection.get_bytes()?.len()
                }
                other => {
                    return Err(VmError::invalid_type(format!(
                        "HASKEY on {:?}",
                        other.item_type()
                    )))
                }
            };
            engine.push(StackItem::from_bool(result))
        }

        Keys => {
            let item = engine.pop()?;
            let StackItem::Map(map) = &item else {
                return Err(VmError::invalid_type("KEYS expects a map"));
            };
            let keys: Vec<StackItem> = map.entries().into_iter().map(|(k, _)| k).collect();
            for key in &keys {
                engine.reference_counter().add_reference(key);
            }
            engine.push(StackItem::from_array(keys))
        }
        Values => {
            let item = engine.pop()?;
            let values: Vec<StackItem> = match &item {
                StackItem::Array(list) | StackItem::Struct(list) => list.items(),
                StackItem::Map(map) => map.entries().into_iter().map(|(_, v)| v).collect(),
                other => {
                    return Err(VmError::invalid_type(format!(
                        "VALUES on {:?}",
                        other.item_type()
                    )))
                }
            };
            // Struct values enter the new array as copies, value semantics.
            let mut out = Vec::with_capacity(values.len());
            for value in values {
                let value = match value {
                    StackItem::Struct(_) => value.deep_copy(16)?,
                    other => other,
                };
                engine.reference_counter().add_reference(&value);
                out.push(value);
            }
            engine.push(StackItem::from_array(out))
        }

        PickItem => {
            let key = engine.pop()?;
            let collection = engine.pop()?;
            let picked = match &collection {
                StackItem::Array(list) | StackItem::Struct(list) => {
                    let index = index_of(&key)?;
                    list.get(index).ok_or_else(|| {
                        VmError::invalid_operation(format!("index {index} out of range"))
                    })?
                }
                StackItem::Map(map) => map
                    .get(&key)?
                    .ok_or_else(|| VmError::invalid_operation("key not found"))?,
                StackItem::Buffer(_) | StackItem::ByteString(_) => {
                    let bytes = collection.get_bytes()?;
                    let index = index_of(&key)?;
                    let byte = *bytes.get(index).ok_or_else(|| {
                        VmError::invalid_operation(format!("index {index} out of range"))
                    })?;
                    StackItem::from_int(byte)
                }
                other => {
                    return Err(VmError::invalid_type(format!(
                        "PICKITEM on {:?}",
                        other.item_type()
                    )))
                }
            };
            engine.push(picked)
        }

        Append => {
            let item = engine.pop()?;
            let target = engine.pop()?;
            let (StackItem::Array(list) | StackItem::Struct(list)) = &target else {
                return Err(VmError::invalid_type("APPEND expects an array or struct"));
            };
            // Structs append as copies, value semantics.
            let item = match item {
                StackItem::Struct(_) => item.deep_copy(16)?,
                other => other,
            };
            engine.reference_counter().add_reference(&item);
            list.with_mut(|v| v.push(item));
            Ok(())
        }

        SetItem => {
            let value = engine.pop()?;
            let key = engine.pop()?;
            let collection = engine.pop()?;
            let value = match value {
                StackItem::Struct(_) => value.deep_copy(16)?,
                other => other,
            };
            match &collection {
                StackItem::Array(list) | StackItem::Struct(list) => {
                    let index = index_of(&key)?;
                    engine.reference_counter().add_reference(&value);
                    let old = list.with_mut(|v| {
                        if index >= v.len() {
                            return Err(VmError::invalid_operation(format!(
                                "index {index} out of range"
                            )));
                        }
                        Ok(std::mem::replace(&mut v[index], value))
                    })?;
                    engine.reference_counter().remove_reference(&old);
                    Ok(())
                }
                StackItem::Map(map) => {
                    engine.reference_counter().add_reference(&key);
                    engine.reference_counter().add_reference(&value);
                    if let Some(old) = map.insert(key.clone(), value)? {
                        engine.reference_counter().remove_reference(&old);
                        engine.reference_counter().remove_reference(&key);
                    }
                    Ok(())
                }
                StackItem::Buffer(buffer) => {
                    let index = index_of(&key)?;
                    let byte = value
                        .get_integer()?
                        .to_u8()
                        .ok_or_else(|| VmError::invalid_operation("byte out of range"))?;
                    buffer.with_mut(|bytes| {
                        if index >= bytes.len() {
                            return Err(VmError::invalid_operation(format!(
                                "index {index} out of range"
                            )));
                        }
                        bytes[index] = byte;
                        Ok(())
                    })
                }
                other => Err(VmError::invalid_type(format!(
                    "SETITEM on {:?}",
                    other.item_type()
                ))),
            }
        }

        ReverseItems => {
            let item = engine.pop()?;
            match &item {
                StackItem::Array(list) | StackItem::Struct(list) => {
                    list.with_mut(|v| v.reverse());
                    Ok(())
                }
                StackItem::Buffer(buffer) => {
                    buffer.with_mut(|bytes| bytes.reverse());
                    Ok(())
                }
                other => Err(VmError::invalid_type(format!(
                    "REVERSEITEMS on {:?}",
                    other.item_type()
                ))),
            }
        }

        Remove => {
            let key = engine.pop()?;
            let collection = engine.pop()?;
            match &collection {
                StackItem::Array(list) | StackItem::Struct(list) => {
                    let index = index_of(&key)?;
                    let removed = list.with_mut(|v| {
                        if index >= v.len() {
                            return Err(VmError::invalid_operation(format!(
                                "index {index} out of range"
                            )));
                        }
                        Ok(v.remove(index))
                    })?;
                    engine.reference_counter().remove_reference(&removed);
                    Ok(())
                }
                StackItem::Map(map) => {
                    if let Some(removed) = map.remove(&key)? {
                        engine.reference_counter().remove_reference(&removed);
                        engine.reference_counter().remove_reference(&key);
                    }
                    Ok(())
                }
                other => Err(VmError::invalid_type(format!(
                    "REMOVE on {:?}",
                    other.item_type()
                ))),
            }
        }

        ClearItems => {
            let collection = engine.pop()?;
            match &collection {
                StackItem::Array(list) | StackItem::Struct(list) => {
                    let drained = list.with_mut(std::mem::take);
                    for item in &drained {
                        engine.reference_counter().remove_reference(item);
                    }
                    Ok(())
                }
                StackItem::Map(map) => {
                    for (key, value) in map.drain() {
                        engine.reference_counter().remove_reference(&key);
                        engine.reference_counter().remove_reference(&value);
                    }
                    Ok(())
                }
                other => Err(VmError::invalid_type(format!(
                    "CLEARITEMS on {:?}",
                    other.item_type()
                ))),
            }
        }

        PopItem => {
            let collection = engine.pop()?;
            let (StackItem::Array(list) | StackItem::Struct(list)) = &collection else {
                return Err(VmError::invalid_type("POPITEM expects an array or struct"));
            };
            let popped = list
                .with_mut(|v| v.pop())
                .ok_or_else(|| VmError::invalid_operation("POPITEM from empty collection"))?;
            engine.reference_counter().remove_reference(&popped);
            engine.push(popped)
        }

        other => Err(VmError::invalid_operation(format!(
            "{other:?} is not a compound opcode"
        ))),
    }
}

fn pop_count(engine: &mut ExecutionEngine) -> VmResult<usize> {
    let count = engine.pop_i32()?;
    if count < 0 {
        return Err(VmError::invalid_operation("negative element count"));
    }
    if count as usize > engine.limits().max_stack_size {
        return Err(VmError::limit_exceeded("element count over stack limit"));
    }
    Ok(count as usize)
}

fn index_of(key: &StackItem) -> VmResult<usize> {
    let value = key.get_integer()?;
    value
        .to_usize()
        .ok_or_else(|| VmError::invalid_operation(format!("invalid index {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::ExecutionEngineLimits;
    use crate::script::Script;
    use crate::script_builder::ScriptBuilder;
    use crate::VMState;
    use num_bigint::BigInt;

    fn run(build: impl FnOnce(&mut ScriptBuilder)) -> ExecutionEngine {
        let mut sb = ScriptBuilder::new();
        build(&mut sb);
        let mut engine = ExecutionEngine::new(ExecutionEngineLimits::default());
        engine.load_script(Script::new(sb.into_bytes()), -1).unwrap();
        engine.execute();
        engine
    }

    fn top_int(engine: &ExecutionEngine) -> BigInt {
        engine.result_stack().peek(0).unwrap().get_integer().unwrap()
    }

    #[test]
    fn test_pack_preserves_order() {
        // PUSH1 PUSH2 PACK(2): top of stack (2) becomes element 0.
        let engine = run(|sb| {
            sb.emit_push_int(1);
            sb.emit_push_int(2);
            sb.emit_push_int(2);
            sb.emit(OpCode::Pack);
            sb.emit_push_int(0);
            sb.emit(OpCode::PickItem);
        });
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(top_int(&engine), BigInt::from(2));
    }

    #[test]
    fn test_setitem_and_pickitem() {
        let engine = run(|sb| {
            sb.emit_push_int(2);
            sb.emit(OpCode::NewArray);
            sb.emit(OpCode::Dup);
            sb.emit_push_int(1); // index
            sb.emit_push_int(9); // value
            sb.emit(OpCode::SetItem);
            sb.emit_push_int(1);
            sb.emit(OpCode::PickItem);
        });
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(top_int(&engine), BigInt::from(9));
    }

    #[test]
    fn test_setitem_out_of_range_faults() {
        let engine = run(|sb| {
            sb.emit_push_int(1);
            sb.emit(OpCode::NewArray);
            sb.emit_push_int(5);
            sb.emit_push_int(9);
            sb.emit(OpCode::SetItem);
        });
        assert_eq!(engine.state(), VMState::FAULT);
    }

    #[test]
    fn test_map_setitem_haskey_remove() {
        let engine = run(|sb| {
            sb.emit(OpCode::NewMap);
            sb.emit(OpCode::Dup);
            sb.emit_push_bytes(b"k");
            sb.emit_push_int(5);
            sb.emit(OpCode::SetItem);
            sb.emit(OpCode::Dup);
            sb.emit_push_bytes(b"k");
            sb.emit(OpCode::HasKey);
        });
        assert_eq!(engine.state(), VMState::HALT);
        assert!(engine.result_stack().peek(0).unwrap().get_bool());
    }

    #[test]
    fn test_size_of_collections_and_bytes() {
        let engine = run(|sb| {
            sb.emit_push_int(3);
            sb.emit(OpCode::NewArray);
            sb.emit(OpCode::Size);
        });
        assert_eq!(top_int(&engine), BigInt::from(3));

        let engine = run(|sb| {
            sb.emit_push_bytes(b"hello");
            sb.emit(OpCode::Size);
        });
        assert_eq!(top_int(&engine), BigInt::from(5));
    }

    #[test]
    fn test_unpack() {
        let engine = run(|sb| {
            sb.emit_push_int(7);
            sb.emit_push_int(8);
            sb.emit_push_int(2);
            sb.emit(OpCode::Pack);
            sb.emit(OpCode::Unpack);
        });
        assert_eq!(engine.state(), VMState::HALT);
        // Stack bottom-to-top: 7, 8, 2 — element 0 (the 8) back on top
        // beneath the count.
        assert_eq!(top_int(&engine), BigInt::from(2));
        assert_eq!(
            engine.result_stack().peek(1).unwrap().get_integer().unwrap(),
            BigInt::from(8)
        );
    }

    #[test]
    fn test_popitem() {
        let engine = run(|sb| {
            sb.emit_push_int(1);
            sb.emit_push_int(2);
            sb.emit_push_int(2);
            sb.emit(OpCode::Pack);
            sb.emit(OpCode::PopItem);
        });
        assert_eq!(engine.state(), VMState::HALT);
        // Pack puts [2, 1]; POPITEM removes the last element (1).
        assert_eq!(top_int(&engine), BigInt::from(1));
    }

    #[test]
    fn test_append_struct_copies() {
        let engine = run(|sb| {
            // array = []; s = struct[1]; APPEND(array, s); mutate s; read array[0][0]
            sb.emit(OpCode::NewArray0);
            sb.emit(OpCode::Dup);
            sb.emit_push_int(1);
            sb.emit(OpCode::NewStruct);
            sb.emit(OpCode::Append);
            sb.emit_push_int(0);
            sb.emit(OpCode::PickItem);
            sb.emit_push_int(0);
            sb.emit(OpCode::PickItem);
        });
        assert_eq!(engine.state(), VMState::HALT);
        assert!(engine.result_stack().peek(0).unwrap().is_null());
    }
}
