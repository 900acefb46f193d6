//! Growable writer producing the canonical binary encoding.

use crate::{IoError, IoResult};

/// A writer that appends the canonical little-endian encoding to an
/// internal buffer.
#[derive(Default)]
pub struct BinaryWriter {
    buffer: Vec<u8>,
}

impl BinaryWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a writer with `capacity` bytes pre-allocated.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// The number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Consumes the writer, returning the buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// A view of the bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Writes a single byte.
    pub fn write_byte(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Writes a boolean as a single `0`/`1` byte.
    pub fn write_bool(&mut self, value: bool) {
        self.buffer.push(value as u8);
    }

    /// Writes a 16-bit unsigned integer, little-endian.
    pub fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a 16-bit signed integer, little-endian.
    pub fn write_i16(&mut self, value: i16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a 32-bit unsigned integer, little-endian.
    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a 32-bit signed integer, little-endian.
    pub fn write_i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a 32-bit signed integer, big-endian.
    pub fn write_i32_be(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    /// Writes a 64-bit unsigned integer, little-endian.
    pub fn write_u64(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a 64-bit signed integer, little-endian.
    pub fn write_i64(&mut self, value: i64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes raw bytes without a length prefix.
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Writes a variable-length integer in its minimal form.
    pub fn write_var_int(&mut self, value: u64) {
        match value {
            0..=0xfc => self.write_byte(value as u8),
            0xfd..=0xffff => {
                self.write_byte(0xfd);
                self.write_u16(value as u16);
            }
            0x1_0000..=0xffff_ffff => {
                self.write_byte(0xfe);
                self.write_u32(value as u32);
            }
            _ => {
                self.write_byte(0xff);
                self.write_u64(value);
            }
        }
    }

    /// Writes a length-prefixed byte string.
    pub fn write_var_bytes(&mut self, data: &[u8]) {
        self.write_var_int(data.len() as u64);
        self.write_bytes(data);
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn write_var_string(&mut self, value: &str) {
        self.write_var_bytes(value.as_bytes());
    }

    /// Writes a fixed-width, zero-padded UTF-8 string.
    pub fn write_fixed_string(&mut self, value: &str, length: usize) -> IoResult<()> {
        let bytes = value.as_bytes();
        if bytes.len() > length {
            return Err(IoError::format(
                "write_fixed_string",
                format!("string of {} bytes exceeds field width {length}", bytes.len()),
            ));
        }
        self.write_bytes(bytes);
        self.buffer.resize(self.buffer.len() + length - bytes.len(), 0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryReader;

    #[test]
    fn test_var_int_minimal_forms() {
        let mut writer = BinaryWriter::new();
        writer.write_var_int(0xfc);
        writer.write_var_int(0xfd);
        writer.write_var_int(0x1_0000);
        writer.write_var_int(0x1_0000_0000);
        let bytes = writer.into_bytes();
        assert_eq!(bytes[0], 0xfc);
        assert_eq!(bytes[1], 0xfd);
        assert_eq!(&bytes[2..4], &[0xfd, 0x00]);
        assert_eq!(bytes[4], 0xfe);
        assert_eq!(bytes[9], 0xff);
    }

    #[test]
    fn test_round_trip_through_reader() {
        let mut writer = BinaryWriter::new();
        writer.write_u32(0xdead_beef);
        writer.write_var_string("neo");
        writer.write_bool(true);
        let bytes = writer.into_bytes();

        let mut reader = MemoryReader::new(&bytes);
        assert_eq!(reader.read_u32().unwrap(), 0xdead_beef);
        assert_eq!(reader.read_var_string(16).unwrap(), "neo");
        assert!(reader.read_bool().unwrap());
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_fixed_string_pads_with_zeros() {
        let mut writer = BinaryWriter::new();
        writer.write_fixed_string("abc", 6).unwrap();
        assert_eq!(writer.as_bytes(), b"abc\0\0\0");
        assert!(writer.write_fixed_string("toolong", 3).is_err());
    }
}
