//! The wire-encoding trait implemented by every canonical type.

use crate::{BinaryWriter, IoResult, MemoryReader};

/// A type with a canonical binary encoding.
pub trait Serializable: Sized {
    /// The exact number of bytes `serialize` will produce.
    fn size(&self) -> usize;

    /// Writes the canonical encoding to `writer`.
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()>;

    /// Reads a value from `reader`, validating the format.
    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self>;

    /// Serializes into a fresh byte vector.
    fn to_array(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::with_capacity(self.size());
        // Serialization into a Vec cannot fail; the writer never errors on growth.
        self.serialize(&mut writer)
            .expect("serialization to memory cannot fail");
        writer.into_bytes()
    }

    /// Deserializes from a byte slice, requiring full consumption.
    fn from_bytes(data: &[u8]) -> IoResult<Self> {
        let mut reader = MemoryReader::new(data);
        let value = Self::deserialize(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(crate::IoError::format(
                "from_bytes",
                format!("{} trailing bytes", reader.remaining()),
            ));
        }
        Ok(value)
    }
}

/// The serialized size of a var-int holding `value`.
pub fn var_int_size(value: u64) -> usize {
    match value {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// The serialized size of a length-prefixed byte string.
pub fn var_bytes_size(data: &[u8]) -> usize {
    var_int_size(data.len() as u64) + data.len()
}

/// Writes a var-int count followed by each element.
pub fn serialize_vec<T: Serializable>(
    items: &[T],
    writer: &mut BinaryWriter,
) -> IoResult<()> {
    writer.write_var_int(items.len() as u64);
    for item in items {
        item.serialize(writer)?;
    }
    Ok(())
}

/// Reads a var-int count capped at `max`, then that many elements.
pub fn deserialize_vec<T: Serializable>(
    reader: &mut MemoryReader<'_>,
    max: usize,
) -> IoResult<Vec<T>> {
    let count = reader.read_var_int(max as u64)? as usize;
    let mut items = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        items.push(T::deserialize(reader)?);
    }
    Ok(items)
}

/// The serialized size of a vector of elements.
pub fn vec_size<T: Serializable>(items: &[T]) -> usize {
    var_int_size(items.len() as u64) + items.iter().map(Serializable::size).sum::<usize>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Clone)]
    struct Pair(u16, u16);

    impl Serializable for Pair {
        fn size(&self) -> usize {
            4
        }

        fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
            writer.write_u16(self.0);
            writer.write_u16(self.1);
            Ok(())
        }

        fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
            Ok(Pair(reader.read_u16()?, reader.read_u16()?))
        }
    }

    #[test]
    fn test_vec_round_trip() {
        let items = vec![Pair(1, 2), Pair(3, 4)];
        let mut writer = BinaryWriter::new();
        serialize_vec(&items, &mut writer).unwrap();
        let bytes = writer.into_bytes();
        assert_eq!(bytes.len(), vec_size(&items));

        let mut reader = MemoryReader::new(&bytes);
        let decoded: Vec<Pair> = deserialize_vec(&mut reader, 16).unwrap();
        assert_eq!(decoded, items);
    }

    #[test]
    fn test_vec_cap_enforced() {
        let items = vec![Pair(0, 0); 3];
        let mut writer = BinaryWriter::new();
        serialize_vec(&items, &mut writer).unwrap();
        let bytes = writer.into_bytes();
        let mut reader = MemoryReader::new(&bytes);
        assert!(deserialize_vec::<Pair>(&mut reader, 2).is_err());
    }

    #[test]
    fn test_from_bytes_rejects_trailing() {
        let mut bytes = Pair(7, 9).to_array();
        bytes.push(0);
        assert!(Pair::from_bytes(&bytes).is_err());
    }
}
