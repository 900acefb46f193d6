//! Binary serialization of stack items and the `Interoperable` trait for
//! typed storage values.

use crate::{ContractError, ContractResult};
use neo_io::{BinaryWriter, MemoryReader};
use neo_persistence::StorageItem;
use neo_vm::stack_item::{integer_to_bytes, StackItem, StackItemType};
use num_bigint::BigInt;

/// The deepest nesting the serializer accepts.
pub const MAX_SERIALIZATION_DEPTH: usize = 16;

/// Serializes a stack item tree, tagging every node with its type byte.
///
/// Interop handles and pointers are not serializable.
pub fn serialize_stack_item(item: &StackItem, max_size: usize) -> ContractResult<Vec<u8>> {
    let mut writer = BinaryWriter::new();
    write_item(item, &mut writer, MAX_SERIALIZATION_DEPTH)?;
    let bytes = writer.into_bytes();
    if bytes.len() > max_size {
        return Err(ContractError::Serialization(format!(
            "serialized item of {} bytes exceeds {max_size}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

fn write_item(item: &StackItem, writer: &mut BinaryWriter, depth: usize) -> ContractResult<()> {
    if depth == 0 {
        return Err(ContractError::Serialization("nesting too deep".into()));
    }
    match item {
        StackItem::Null => writer.write_byte(StackItemType::Any as u8),
        StackItem::Boolean(b) => {
            writer.write_byte(StackItemType::Boolean as u8);
            writer.write_bool(*b);
        }
        StackItem::Integer(i) => {
            writer.write_byte(StackItemType::Integer as u8);
            writer.write_var_bytes(&integer_to_bytes(i));
        }
        StackItem::ByteString(bytes) => {
            writer.write_byte(StackItemType::ByteString as u8);
            writer.write_var_bytes(bytes);
        }
        StackItem::Buffer(buffer) => {
            writer.write_byte(StackItemType::Buffer as u8);
            writer.write_var_bytes(&buffer.to_vec());
        }
        StackItem::Array(list) => {
            writer.write_byte(StackItemType::Array as u8);
            let items = list.items();
            writer.write_var_int(items.len() as u64);
            for child in &items {
                write_item(child, writer, depth - 1)?;
            }
        }
        StackItem::Struct(list) => {
            writer.write_byte(StackItemType::Struct as u8);
            let items = list.items();
            writer.write_var_int(items.len() as u64);
            for child in &items {
                write_item(child, writer, depth - 1)?;
            }
        }
        StackItem::Map(map) => {
            writer.write_byte(StackItemType::Map as u8);
            let entries = map.entries();
            writer.write_var_int(entries.len() as u64);
            for (key, value) in &entries {
                write_item(key, writer, depth - 1)?;
                write_item(value, writer, depth - 1)?;
            }
        }
        StackItem::Pointer(_) | StackItem::Interop(_) => {
            return Err(ContractError::Serialization(format!(
                "{:?} is not serializable",
                item.item_type()
            )));
        }
    }
    Ok(())
}

/// Reverses [`serialize_stack_item`].
pub fn deserialize_stack_item(data: &[u8]) -> ContractResult<StackItem> {
    let mut reader = MemoryReader::new(data);
    let item = read_item(&mut reader, MAX_SERIALIZATION_DEPTH)?;
    if reader.remaining() != 0 {
        return Err(ContractError::Serialization("trailing bytes".into()));
    }
    Ok(item)
}

fn read_item(reader: &mut MemoryReader<'_>, depth: usize) -> ContractResult<StackItem> {
    if depth == 0 {
        return Err(ContractError::Serialization("nesting too deep".into()));
    }
    let tag = reader.read_byte()?;
    let item_type = StackItemType::from_byte(tag)
        .ok_or_else(|| ContractError::Serialization(format!("unknown type byte 0x{tag:02x}")))?;
    Ok(match item_type {
        StackItemType::Any => StackItem::Null,
        StackItemType::Boolean => StackItem::from_bool(reader.read_bool()?),
        StackItemType::Integer => {
            let bytes = reader.read_var_bytes(32)?;
            if bytes.is_empty() {
                StackItem::from_int(0)
            } else {
                StackItem::Integer(BigInt::from_signed_bytes_le(&bytes))
            }
        }
        StackItemType::ByteString => {
            StackItem::from_bytes(reader.read_var_bytes(0xffff_ff)?)
        }
        StackItemType::Buffer => StackItem::from_buffer(reader.read_var_bytes(0xffff_ff)?),
        StackItemType::Array | StackItemType::Struct => {
            let count = reader.read_var_int(2048)? as usize;
            let mut items = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                items.push(read_item(reader, depth - 1)?);
            }
            if item_type == StackItemType::Array {
                StackItem::from_array(items)
            } else {
                StackItem::from_struct(items)
            }
        }
        StackItemType::Map => {
            let count = reader.read_var_int(2048)? as usize;
            let map = StackItem::new_map();
            let StackItem::Map(entries) = &map else { unreachable!() };
            for _ in 0..count {
                let key = read_item(reader, depth - 1)?;
                let value = read_item(reader, depth - 1)?;
                entries
                    .insert(key, value)
                    .map_err(|e| ContractError::Serialization(e.to_string()))?;
            }
            map
        }
        other => {
            return Err(ContractError::Serialization(format!(
                "{other:?} is not deserializable"
            )))
        }
    })
}

/// A typed value stored as a serialized stack item.
///
/// Each implementation maps itself to and from a struct stack item, and
/// rides in a [`StorageItem`] through the blanket helpers.
pub trait Interoperable: Sized {
    /// Reconstructs the value from its stack-item form.
    fn from_stack_item(item: &StackItem) -> ContractResult<Self>;

    /// Renders the value as a stack item.
    fn to_stack_item(&self) -> StackItem;

    /// Serializes into a storage item.
    fn to_storage_item(&self) -> StorageItem {
        let bytes = serialize_stack_item(&self.to_stack_item(), usize::MAX)
            .expect("interoperable values serialize");
        StorageItem::new(bytes)
    }

    /// Deserializes from a storage item.
    fn from_storage_item(item: &StorageItem) -> ContractResult<Self> {
        let stack_item = deserialize_stack_item(item.value())?;
        Self::from_stack_item(&stack_item)
    }
}

/// Reads field `index` of a struct stack item.
pub fn struct_field(item: &StackItem, index: usize) -> ContractResult<StackItem> {
    let StackItem::Struct(fields) = item else {
        return Err(ContractError::Serialization("expected a struct".into()));
    };
    fields
        .get(index)
        .ok_or_else(|| ContractError::Serialization(format!("missing struct field {index}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_primitives() {
        for item in [
            StackItem::Null,
            StackItem::from_bool(true),
            StackItem::from_int(-42),
            StackItem::from_bytes(b"neo".to_vec()),
        ] {
            let bytes = serialize_stack_item(&item, 1024).unwrap();
            let decoded = deserialize_stack_item(&bytes).unwrap();
            assert!(decoded.equals(&item, 1024).unwrap() || (item.is_null() && decoded.is_null()));
        }
    }

    #[test]
    fn test_round_trip_struct() {
        let item = StackItem::from_struct(vec![
            StackItem::from_int(100),
            StackItem::Null,
            StackItem::from_bytes(vec![1, 2, 3]),
        ]);
        let bytes = serialize_stack_item(&item, 1024).unwrap();
        let decoded = deserialize_stack_item(&bytes).unwrap();
        assert!(decoded.equals(&item, 1024).unwrap());
    }

    #[test]
    fn test_round_trip_map() {
        let map = StackItem::new_map();
        if let StackItem::Map(entries) = &map {
            entries
                .insert(StackItem::from_int(1), StackItem::from_bytes(b"a".to_vec()))
                .unwrap();
        }
        let bytes = serialize_stack_item(&map, 1024).unwrap();
        let decoded = deserialize_stack_item(&bytes).unwrap();
        if let StackItem::Map(entries) = decoded {
            assert_eq!(entries.len(), 1);
        } else {
            panic!("expected a map");
        }
    }

    #[test]
    fn test_interop_handle_rejected() {
        let pointer = StackItem::Pointer(neo_vm::stack_item::Pointer {
            script: neo_vm::Script::new(vec![0x40]),
            position: 0,
        });
        assert!(serialize_stack_item(&pointer, 1024).is_err());
    }

    #[test]
    fn test_size_cap() {
        let item = StackItem::from_bytes(vec![0u8; 100]);
        assert!(serialize_stack_item(&item, 10).is_err());
    }
}
