//! Stack items: the value universe of the VM.
//!
//! Compound items (arrays, structs, maps) and buffers share interior
//! state, so clones of the same item observe each other's mutations.
//! Every shared item carries an identity id used by reference counting
//! and by reference-equality semantics.

use crate::script::Script;
use crate::{VmError, VmResult};
use num_bigint::BigInt;
use num_traits::Zero;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// The largest integer encoding the VM accepts, in bytes.
pub const MAX_INTEGER_SIZE: usize = 32;

/// The wire type byte of each stack item kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StackItemType {
    /// No concrete type; only valid in signatures.
    Any = 0x00,
    /// An instruction pointer.
    Pointer = 0x10,
    /// A boolean.
    Boolean = 0x20,
    /// An arbitrary-precision integer.
    Integer = 0x21,
    /// An immutable byte string.
    ByteString = 0x28,
    /// A mutable byte buffer.
    Buffer = 0x30,
    /// An array of items.
    Array = 0x40,
    /// A value-semantics array.
    Struct = 0x41,
    /// An insertion-ordered map.
    Map = 0x48,
    /// A host object handle.
    InteropInterface = 0x60,
}

impl StackItemType {
    /// Decodes a type byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Any),
            0x10 => Some(Self::Pointer),
            0x20 => Some(Self::Boolean),
            0x21 => Some(Self::Integer),
            0x28 => Some(Self::ByteString),
            0x30 => Some(Self::Buffer),
            0x40 => Some(Self::Array),
            0x41 => Some(Self::Struct),
            0x48 => Some(Self::Map),
            0x60 => Some(Self::InteropInterface),
            _ => None,
        }
    }
}

/// A host object exposed to scripts as an opaque handle.
pub trait InteropInterface: fmt::Debug + Send + Sync {
    /// A name for diagnostics.
    fn interface_name(&self) -> &'static str;

    /// Downcasting support for hosts.
    fn as_any(&self) -> &dyn std::any::Any;
}

static NEXT_ITEM_ID: AtomicUsize = AtomicUsize::new(1);

fn next_item_id() -> usize {
    NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed)
}

/// A mutable shared byte buffer.
#[derive(Debug, Clone)]
pub struct Buffer {
    inner: Arc<Mutex<Vec<u8>>>,
    id: usize,
}

impl Buffer {
    /// Creates a buffer holding `data`.
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(data)),
            id: next_item_id(),
        }
    }

    /// The identity id.
    pub fn id(&self) -> usize {
        self.id
    }

    /// A snapshot of the contents.
    pub fn to_vec(&self) -> Vec<u8> {
        self.inner.lock().clone()
    }

    /// The current length.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Runs `f` over the mutable contents.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Vec<u8>) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

/// The shared interior of arrays and structs.
#[derive(Debug, Clone)]
pub struct ItemList {
    inner: Arc<Mutex<Vec<StackItem>>>,
    id: usize,
}

impl ItemList {
    fn new(items: Vec<StackItem>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(items)),
            id: next_item_id(),
        }
    }

    /// The identity id.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The current length.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// A clone of the element at `index`.
    pub fn get(&self, index: usize) -> Option<StackItem> {
        self.inner.lock().get(index).cloned()
    }

    /// A snapshot of all elements.
    pub fn items(&self) -> Vec<StackItem> {
        self.inner.lock().clone()
    }

    /// Runs `f` over the mutable element vector.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Vec<StackItem>) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

/// An insertion-ordered map with primitive keys.
#[derive(Debug, Clone)]
pub struct MapRef {
    inner: Arc<Mutex<Vec<(StackItem, StackItem)>>>,
    id: usize,
}

impl MapRef {
    fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
            id: next_item_id(),
        }
    }

    /// The identity id.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// A snapshot of all entries in insertion order.
    pub fn entries(&self) -> Vec<(StackItem, StackItem)> {
        self.inner.lock().clone()
    }

    /// Looks up a value by primitive key equality.
    pub fn get(&self, key: &StackItem) -> VmResult<Option<StackItem>> {
        let entries = self.inner.lock();
        for (k, v) in entries.iter() {
            if primitive_key_equals(k, key)? {
                return Ok(Some(v.clone()));
            }
        }
        Ok(None)
    }

    /// Returns whether the map holds `key`.
    pub fn contains_key(&self, key: &StackItem) -> VmResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Inserts or replaces; returns the previous value if any.
    pub fn insert(&self, key: StackItem, value: StackItem) -> VmResult<Option<StackItem>> {
        let mut entries = self.inner.lock();
        for (k, v) in entries.iter_mut() {
            if primitive_key_equals(k, &key)? {
                return Ok(Some(std::mem::replace(v, value)));
            }
        }
        entries.push((key, value));
        Ok(None)
    }

    /// Removes a key; returns the removed value if any.
    pub fn remove(&self, key: &StackItem) -> VmResult<Option<StackItem>> {
        let mut entries = self.inner.lock();
        for i in 0..entries.len() {
            if primitive_key_equals(&entries[i].0, key)? {
                return Ok(Some(entries.remove(i).1));
            }
        }
        Ok(None)
    }

    /// Removes every entry, returning the removed pairs.
    pub fn drain(&self) -> Vec<(StackItem, StackItem)> {
        std::mem::take(&mut *self.inner.lock())
    }
}

/// An instruction pointer into a script.
#[derive(Debug, Clone)]
pub struct Pointer {
    /// The script the pointer refers into.
    pub script: Script,
    /// The target position.
    pub position: usize,
}

/// A value in the Neo VM.
#[derive(Debug, Clone)]
pub enum StackItem {
    /// The null value.
    Null,
    /// A boolean value.
    Boolean(bool),
    /// An arbitrary-precision integer, bounded at 32 encoded bytes.
    Integer(BigInt),
    /// An immutable byte string.
    ByteString(Arc<Vec<u8>>),
    /// A mutable byte buffer with shared state.
    Buffer(Buffer),
    /// An array with shared state and reference semantics.
    Array(ItemList),
    /// A struct with shared state and value semantics.
    Struct(ItemList),
    /// An insertion-ordered map.
    Map(MapRef),
    /// A code pointer.
    Pointer(Pointer),
    /// A host object handle.
    Interop(Arc<dyn InteropInterface>),
}

impl StackItem {
    /// The null singleton.
    pub const fn null() -> Self {
        StackItem::Null
    }

    /// Creates a boolean item.
    pub const fn from_bool(value: bool) -> Self {
        StackItem::Boolean(value)
    }

    /// Creates an integer item.
    pub fn from_int<T: Into<BigInt>>(value: T) -> Self {
        StackItem::Integer(value.into())
    }

    /// Creates a byte-string item.
    pub fn from_bytes(value: impl Into<Vec<u8>>) -> Self {
        StackItem::ByteString(Arc::new(value.into()))
    }

    /// Creates a buffer item.
    pub fn from_buffer(value: Vec<u8>) -> Self {
        StackItem::Buffer(Buffer::new(value))
    }

    /// Creates an array item.
    pub fn from_array(items: Vec<StackItem>) -> Self {
        StackItem::Array(ItemList::new(items))
    }

    /// Creates a struct item.
    pub fn from_struct(items: Vec<StackItem>) -> Self {
        StackItem::Struct(ItemList::new(items))
    }

    /// Creates an empty map item.
    pub fn new_map() -> Self {
        StackItem::Map(MapRef::new())
    }

    /// Creates an interop handle.
    pub fn from_interop<T: InteropInterface + 'static>(value: T) -> Self {
        StackItem::Interop(Arc::new(value))
    }

    /// The type of this item.
    pub fn item_type(&self) -> StackItemType {
        match self {
            StackItem::Null => StackItemType::Any,
            StackItem::Boolean(_) => StackItemType::Boolean,
            StackItem::Integer(_) => StackItemType::Integer,
            StackItem::ByteString(_) => StackItemType::ByteString,
            StackItem::Buffer(_) => StackItemType::Buffer,
            StackItem::Array(_) => StackItemType::Array,
            StackItem::Struct(_) => StackItemType::Struct,
            StackItem::Map(_) => StackItemType::Map,
            StackItem::Pointer(_) => StackItemType::Pointer,
            StackItem::Interop(_) => StackItemType::InteropInterface,
        }
    }

    /// Returns whether this is the null item.
    pub fn is_null(&self) -> bool {
        matches!(self, StackItem::Null)
    }

    /// The identity id of shared items, if this item has one.
    pub fn identity(&self) -> Option<usize> {
        match self {
            StackItem::Buffer(b) => Some(b.id()),
            StackItem::Array(a) | StackItem::Struct(a) => Some(a.id()),
            StackItem::Map(m) => Some(m.id()),
            _ => None,
        }
    }

    /// Returns whether this is a compound type (array, struct or map).
    pub fn is_compound(&self) -> bool {
        matches!(
            self,
            StackItem::Array(_) | StackItem::Struct(_) | StackItem::Map(_)
        )
    }

    /// The truthiness of this item.
    pub fn get_bool(&self) -> bool {
        match self {
            StackItem::Null => false,
            StackItem::Boolean(b) => *b,
            StackItem::Integer(i) => !i.is_zero(),
            StackItem::ByteString(bytes) => bytes.iter().any(|&b| b != 0),
            StackItem::Buffer(_) => true,
            StackItem::Array(_) | StackItem::Struct(_) | StackItem::Map(_) => true,
            StackItem::Pointer(_) => true,
            StackItem::Interop(_) => true,
        }
    }

    /// The integer value, failing for non-numeric types or oversized
    /// encodings.
    pub fn get_integer(&self) -> VmResult<BigInt> {
        match self {
            StackItem::Boolean(b) => Ok(BigInt::from(*b as u8)),
            StackItem::Integer(i) => Ok(i.clone()),
            StackItem::ByteString(bytes) => bytes_to_integer(bytes),
            StackItem::Buffer(buffer) => bytes_to_integer(&buffer.to_vec()),
            other => Err(VmError::invalid_type(format!(
                "cannot convert {:?} to integer",
                other.item_type()
            ))),
        }
    }

    /// The byte representation, failing for non-byte-like types.
    pub fn get_bytes(&self) -> VmResult<Vec<u8>> {
        match self {
            StackItem::Boolean(b) => Ok(vec![*b as u8]),
            StackItem::Integer(i) => Ok(integer_to_bytes(i)),
            StackItem::ByteString(bytes) => Ok(bytes.as_ref().clone()),
            StackItem::Buffer(buffer) => Ok(buffer.to_vec()),
            other => Err(VmError::invalid_type(format!(
                "cannot convert {:?} to bytes",
                other.item_type()
            ))),
        }
    }

    /// The UTF-8 string value.
    pub fn get_string(&self) -> VmResult<String> {
        String::from_utf8(self.get_bytes()?)
            .map_err(|_| VmError::invalid_type("invalid utf-8"))
    }

    /// Structural equality with the comparable-size cap applied to byte
    /// comparisons and deep struct comparison.
    pub fn equals(&self, other: &StackItem, max_comparable_size: usize) -> VmResult<bool> {
        equals_depth(self, other, max_comparable_size, 0)
    }

    /// Converts this item to `target`, per the CONVERT rules.
    pub fn convert_to(&self, target: StackItemType) -> VmResult<StackItem> {
        if self.item_type() == target {
            return Ok(self.clone());
        }
        if target == StackItemType::Any {
            return Err(VmError::invalid_type("cannot convert to Any"));
        }
        match target {
            StackItemType::Boolean => Ok(StackItem::Boolean(self.get_bool())),
            StackItemType::Integer => Ok(StackItem::Integer(self.get_integer()?)),
            StackItemType::ByteString => Ok(StackItem::from_bytes(self.get_bytes()?)),
            StackItemType::Buffer => Ok(StackItem::from_buffer(self.get_bytes()?)),
            StackItemType::Array => match self {
                StackItem::Struct(items) => Ok(StackItem::from_array(items.items())),
                _ => Err(conversion_error(self, target)),
            },
            StackItemType::Struct => match self {
                StackItem::Array(items) => Ok(StackItem::from_struct(items.items())),
                _ => Err(conversion_error(self, target)),
            },
            _ => Err(conversion_error(self, target)),
        }
    }

    /// A deep copy. Shared sub-items are copied once per occurrence; the
    /// depth guard rejects runaway nesting.
    pub fn deep_copy(&self, max_depth: usize) -> VmResult<StackItem> {
        if max_depth == 0 {
            return Err(VmError::limit_exceeded("deep copy exceeds max nesting"));
        }
        Ok(match self {
            StackItem::Array(items) => {
                let copied = items
                    .items()
                    .iter()
                    .map(|i| i.deep_copy(max_depth - 1))
                    .collect::<VmResult<Vec<_>>>()?;
                StackItem::from_array(copied)
            }
            StackItem::Struct(items) => {
                let copied = items
                    .items()
                    .iter()
                    .map(|i| i.deep_copy(max_depth - 1))
                    .collect::<VmResult<Vec<_>>>()?;
                StackItem::from_struct(copied)
            }
            StackItem::Map(map) => {
                let target = MapRef::new();
                for (k, v) in map.entries() {
                    target.insert(k.clone(), v.deep_copy(max_depth - 1)?)?;
                }
                StackItem::Map(target)
            }
            StackItem::Buffer(buffer) => StackItem::from_buffer(buffer.to_vec()),
            other => other.clone(),
        })
    }

    /// The direct children of a compound, for reference-graph walks.
    pub fn children(&self) -> Vec<StackItem> {
        match self {
            StackItem::Array(items) | StackItem::Struct(items) => items.items(),
            StackItem::Map(map) => map
                .entries()
                .into_iter()
                .flat_map(|(k, v)| [k, v])
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn conversion_error(item: &StackItem, target: StackItemType) -> VmError {
    VmError::invalid_type(format!(
        "cannot convert {:?} to {:?}",
        item.item_type(),
        target
    ))
}

fn equals_depth(
    a: &StackItem,
    b: &StackItem,
    max_comparable_size: usize,
    depth: usize,
) -> VmResult<bool> {
    if depth > 16 {
        return Err(VmError::limit_exceeded("comparison nesting too deep"));
    }
    Ok(match (a, b) {
        (StackItem::Null, StackItem::Null) => true,
        (StackItem::Null, _) | (_, StackItem::Null) => false,
        (StackItem::Struct(x), StackItem::Struct(y)) => {
            if x.id() == y.id() {
                true
            } else {
                let xs = x.items();
                let ys = y.items();
                if xs.len() != ys.len() {
                    false
                } else {
                    for (xi, yi) in xs.iter().zip(ys.iter()) {
                        if !equals_depth(xi, yi, max_comparable_size, depth + 1)? {
                            return Ok(false);
                        }
                    }
                    true
                }
            }
        }
        // Arrays, maps, buffers and interop handles compare by identity.
        (StackItem::Array(x), StackItem::Array(y)) => x.id() == y.id(),
        (StackItem::Map(x), StackItem::Map(y)) => x.id() == y.id(),
        (StackItem::Buffer(x), StackItem::Buffer(y)) => x.id() == y.id(),
        (StackItem::Buffer(_), _) | (_, StackItem::Buffer(_)) => false,
        (StackItem::Interop(x), StackItem::Interop(y)) => Arc::ptr_eq(x, y),
        (StackItem::Pointer(x), StackItem::Pointer(y)) => {
            x.position == y.position && x.script == y.script
        }
        _ => {
            // Remaining primitives compare by bytes.
            let (Ok(xa), Ok(ya)) = (a.get_bytes(), b.get_bytes()) else {
                return Ok(false);
            };
            if xa.len().max(ya.len()) > max_comparable_size {
                return Err(VmError::limit_exceeded("operands exceed comparable size"));
            }
            xa == ya
        }
    })
}

fn primitive_key_equals(a: &StackItem, b: &StackItem) -> VmResult<bool> {
    require_primitive_key(a)?;
    require_primitive_key(b)?;
    Ok(a.get_bytes()? == b.get_bytes()?)
}

/// Map keys must be primitive types.
pub fn require_primitive_key(item: &StackItem) -> VmResult<()> {
    match item {
        StackItem::Boolean(_) | StackItem::Integer(_) | StackItem::ByteString(_) => Ok(()),
        other => Err(VmError::invalid_type(format!(
            "{:?} cannot be a map key",
            other.item_type()
        ))),
    }
}

/// Minimal little-endian two's-complement encoding; empty for zero.
pub fn integer_to_bytes(value: &BigInt) -> Vec<u8> {
    if value.is_zero() {
        return Vec::new();
    }
    value.to_signed_bytes_le()
}

/// Decodes a little-endian two's-complement integer, capped at 32 bytes.
pub fn bytes_to_integer(data: &[u8]) -> VmResult<BigInt> {
    if data.len() > MAX_INTEGER_SIZE {
        return Err(VmError::invalid_type(format!(
            "integer of {} bytes exceeds the {MAX_INTEGER_SIZE}-byte cap",
            data.len()
        )));
    }
    if data.is_empty() {
        return Ok(BigInt::zero());
    }
    Ok(BigInt::from_signed_bytes_le(data))
}

/// Checks the engine-wide integer range `[-2^255, 2^255)`: the signed
/// encoding must fit 32 bytes.
pub fn check_integer_range(value: &BigInt) -> VmResult<()> {
    if integer_to_bytes(value).len() > MAX_INTEGER_SIZE {
        return Err(VmError::IntegerOverflow);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!StackItem::Null.get_bool());
        assert!(!StackItem::from_bool(false).get_bool());
        assert!(StackItem::from_int(5).get_bool());
        assert!(!StackItem::from_int(0).get_bool());
        assert!(!StackItem::from_bytes(vec![0, 0]).get_bool());
        assert!(StackItem::from_bytes(vec![0, 1]).get_bool());
        assert!(StackItem::from_array(vec![]).get_bool());
    }

    #[test]
    fn test_integer_round_trip() {
        for v in [0i64, 1, -1, 255, -256, i64::MAX, i64::MIN] {
            let item = StackItem::from_bytes(integer_to_bytes(&BigInt::from(v)));
            assert_eq!(item.get_integer().unwrap(), BigInt::from(v), "value {v}");
        }
    }

    #[test]
    fn test_oversized_integer_rejected() {
        let item = StackItem::from_bytes(vec![1u8; 33]);
        assert!(item.get_integer().is_err());
    }

    #[test]
    fn test_array_shares_state() {
        let array = StackItem::from_array(vec![StackItem::from_int(1)]);
        let alias = array.clone();
        if let StackItem::Array(items) = &array {
            items.with_mut(|v| v.push(StackItem::from_int(2)));
        }
        if let StackItem::Array(items) = &alias {
            assert_eq!(items.len(), 2);
        } else {
            panic!("expected array");
        }
    }

    #[test]
    fn test_array_identity_equality() {
        let a = StackItem::from_array(vec![]);
        let b = StackItem::from_array(vec![]);
        assert!(a.equals(&a.clone(), 1024).unwrap());
        assert!(!a.equals(&b, 1024).unwrap());
    }

    #[test]
    fn test_struct_deep_equality() {
        let a = StackItem::from_struct(vec![StackItem::from_int(1), StackItem::from_bytes(b"x".to_vec())]);
        let b = StackItem::from_struct(vec![StackItem::from_int(1), StackItem::from_bytes(b"x".to_vec())]);
        let c = StackItem::from_struct(vec![StackItem::from_int(2)]);
        assert!(a.equals(&b, 1024).unwrap());
        assert!(!a.equals(&c, 1024).unwrap());
    }

    #[test]
    fn test_primitive_equality_across_types() {
        // Integer 1 and byte string [1] encode identically.
        let one = StackItem::from_int(1);
        let bytes = StackItem::from_bytes(vec![1]);
        assert!(one.equals(&bytes, 1024).unwrap());
        assert!(!one.equals(&StackItem::from_int(2), 1024).unwrap());
    }

    #[test]
    fn test_map_insertion_order_and_lookup() {
        let map = MapRef::new();
        map.insert(StackItem::from_int(2), StackItem::from_int(20)).unwrap();
        map.insert(StackItem::from_int(1), StackItem::from_int(10)).unwrap();
        map.insert(StackItem::from_int(2), StackItem::from_int(22)).unwrap();

        assert_eq!(map.len(), 2);
        let keys: Vec<BigInt> = map
            .entries()
            .iter()
            .map(|(k, _)| k.get_integer().unwrap())
            .collect();
        assert_eq!(keys, vec![BigInt::from(2), BigInt::from(1)]);
        assert_eq!(
            map.get(&StackItem::from_int(2)).unwrap().unwrap().get_integer().unwrap(),
            BigInt::from(22)
        );
    }

    #[test]
    fn test_map_rejects_compound_keys() {
        let map = MapRef::new();
        assert!(map
            .insert(StackItem::from_array(vec![]), StackItem::Null)
            .is_err());
    }

    #[test]
    fn test_convert() {
        let item = StackItem::from_int(1);
        assert!(matches!(
            item.convert_to(StackItemType::Boolean).unwrap(),
            StackItem::Boolean(true)
        ));
        let buffer = item.convert_to(StackItemType::Buffer).unwrap();
        assert_eq!(buffer.item_type(), StackItemType::Buffer);
        assert!(item.convert_to(StackItemType::Map).is_err());

        let structure = StackItem::from_struct(vec![StackItem::from_int(1)]);
        let array = structure.convert_to(StackItemType::Array).unwrap();
        assert_eq!(array.item_type(), StackItemType::Array);
    }

    #[test]
    fn test_deep_copy_detaches_state() {
        let array = StackItem::from_array(vec![StackItem::from_buffer(vec![1])]);
        let copy = array.deep_copy(16).unwrap();
        if let StackItem::Array(items) = &array {
            items.with_mut(|v| v.push(StackItem::Null));
        }
        if let StackItem::Array(items) = &copy {
            assert_eq!(items.len(), 1);
        } else {
            panic!("expected array");
        }
    }

    #[test]
    fn test_integer_range_check() {
        assert!(check_integer_range(&(BigInt::from(1) << 254)).is_ok());
        assert!(check_integer_range(&(BigInt::from(1) << 256)).is_err());
    }
}
