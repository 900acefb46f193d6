//! Positioned reader over an in-memory byte sequence.

use crate::{IoError, IoResult};

/// A bounds-checked reader over a byte slice.
///
/// Every read advances the position; a read past the end of the input
/// fails with [`IoError::EndOfStream`] and leaves the position unchanged.
pub struct MemoryReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> MemoryReader<'a> {
    /// Creates a new reader over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// The current position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The total length of the underlying data.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns whether the underlying data is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Moves the position to `position`.
    pub fn set_position(&mut self, position: usize) -> IoResult<()> {
        if position > self.data.len() {
            return Err(IoError::invalid_operation(
                "set_position",
                format!("position {position} is out of bounds"),
            ));
        }
        self.pos = position;
        Ok(())
    }

    fn ensure(&self, count: usize) -> IoResult<()> {
        if self.pos + count > self.data.len() {
            return Err(IoError::end_of_stream(
                self.pos + count - self.data.len(),
            ));
        }
        Ok(())
    }

    /// Peeks at the next byte without advancing.
    pub fn peek(&self) -> IoResult<u8> {
        self.ensure(1)?;
        Ok(self.data[self.pos])
    }

    /// Reads a single byte.
    pub fn read_byte(&mut self) -> IoResult<u8> {
        self.ensure(1)?;
        let b = self.data[self.pos];
        self.pos += 1;
        Ok(b)
    }

    /// Reads a boolean encoded as a single strict `0`/`1` byte.
    pub fn read_bool(&mut self) -> IoResult<bool> {
        match self.read_byte()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(IoError::format(
                "read_bool",
                format!("invalid boolean value {other}"),
            )),
        }
    }

    /// Reads a signed byte.
    pub fn read_i8(&mut self) -> IoResult<i8> {
        Ok(self.read_byte()? as i8)
    }

    /// Reads a 16-bit signed integer, little-endian.
    pub fn read_i16(&mut self) -> IoResult<i16> {
        Ok(i16::from_le_bytes(self.read_array::<2>()?))
    }

    /// Reads a 16-bit unsigned integer, little-endian.
    pub fn read_u16(&mut self) -> IoResult<u16> {
        Ok(u16::from_le_bytes(self.read_array::<2>()?))
    }

    /// Reads a 32-bit signed integer, little-endian.
    pub fn read_i32(&mut self) -> IoResult<i32> {
        Ok(i32::from_le_bytes(self.read_array::<4>()?))
    }

    /// Reads a 32-bit unsigned integer, little-endian.
    pub fn read_u32(&mut self) -> IoResult<u32> {
        Ok(u32::from_le_bytes(self.read_array::<4>()?))
    }

    /// Reads a 32-bit signed integer, big-endian.
    pub fn read_i32_be(&mut self) -> IoResult<i32> {
        Ok(i32::from_be_bytes(self.read_array::<4>()?))
    }

    /// Reads a 64-bit signed integer, little-endian.
    pub fn read_i64(&mut self) -> IoResult<i64> {
        Ok(i64::from_le_bytes(self.read_array::<8>()?))
    }

    /// Reads a 64-bit unsigned integer, little-endian.
    pub fn read_u64(&mut self) -> IoResult<u64> {
        Ok(u64::from_le_bytes(self.read_array::<8>()?))
    }

    /// Reads an exact-width byte array.
    pub fn read_array<const N: usize>(&mut self) -> IoResult<[u8; N]> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    /// Reads `count` bytes.
    pub fn read_bytes(&mut self, count: usize) -> IoResult<Vec<u8>> {
        self.ensure(count)?;
        let out = self.data[self.pos..self.pos + count].to_vec();
        self.pos += count;
        Ok(out)
    }

    /// Reads all remaining bytes.
    pub fn read_to_end(&mut self) -> Vec<u8> {
        let out = self.data[self.pos..].to_vec();
        self.pos = self.data.len();
        out
    }

    /// Reads a variable-length integer bounded by `max`.
    ///
    /// The prefix byte selects the width: `< 0xfd` inline, `0xfd` u16,
    /// `0xfe` u32, `0xff` u64.
    pub fn read_var_int(&mut self, max: u64) -> IoResult<u64> {
        let prefix = self.read_byte()?;
        let value = match prefix {
            0xfd => self.read_u16()? as u64,
            0xfe => self.read_u32()? as u64,
            0xff => self.read_u64()?,
            inline => inline as u64,
        };
        if value > max {
            return Err(IoError::format(
                "read_var_int",
                format!("value {value} exceeds maximum {max}"),
            ));
        }
        Ok(value)
    }

    /// Reads a length-prefixed byte string of at most `max` bytes.
    pub fn read_var_bytes(&mut self, max: usize) -> IoResult<Vec<u8>> {
        let length = self.read_var_int(max as u64)? as usize;
        self.read_bytes(length)
    }

    /// Reads a length-prefixed UTF-8 string of at most `max` bytes.
    pub fn read_var_string(&mut self, max: usize) -> IoResult<String> {
        let data = self.read_var_bytes(max)?;
        String::from_utf8(data)
            .map_err(|_| IoError::format("read_var_string", "invalid utf-8"))
    }

    /// Reads a fixed-width, zero-padded UTF-8 string.
    ///
    /// Bytes after the first NUL must all be zero.
    pub fn read_fixed_string(&mut self, length: usize) -> IoResult<String> {
        let data = self.read_bytes(length)?;
        let end = data.iter().position(|&b| b == 0).unwrap_or(length);
        if data[end..].iter().any(|&b| b != 0) {
            return Err(IoError::format(
                "read_fixed_string",
                "non-zero byte after terminator",
            ));
        }
        String::from_utf8(data[..end].to_vec())
            .map_err(|_| IoError::format("read_fixed_string", "invalid utf-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_width_reads() {
        let data = [0x78, 0x56, 0x34, 0x12, 0xff];
        let mut reader = MemoryReader::new(&data);
        assert_eq!(reader.read_u32().unwrap(), 0x12345678);
        assert_eq!(reader.read_byte().unwrap(), 0xff);
        assert!(matches!(
            reader.read_byte(),
            Err(IoError::EndOfStream { needed: 1 })
        ));
    }

    #[test]
    fn test_read_bool_strict() {
        let mut reader = MemoryReader::new(&[0, 1, 2]);
        assert!(!reader.read_bool().unwrap());
        assert!(reader.read_bool().unwrap());
        assert!(reader.read_bool().is_err());
    }

    #[test]
    fn test_var_int_forms() {
        let mut reader = MemoryReader::new(&[0x42]);
        assert_eq!(reader.read_var_int(u64::MAX).unwrap(), 0x42);

        let mut reader = MemoryReader::new(&[0xfd, 0x34, 0x12]);
        assert_eq!(reader.read_var_int(u64::MAX).unwrap(), 0x1234);

        let mut reader = MemoryReader::new(&[0xfe, 0x78, 0x56, 0x34, 0x12]);
        assert_eq!(reader.read_var_int(u64::MAX).unwrap(), 0x12345678);

        let mut reader = MemoryReader::new(&[0xff, 1, 0, 0, 0, 0, 0, 0, 0x80]);
        assert_eq!(
            reader.read_var_int(u64::MAX).unwrap(),
            0x8000_0000_0000_0001
        );
    }

    #[test]
    fn test_var_int_max_enforced() {
        let mut reader = MemoryReader::new(&[0xfd, 0x34, 0x12]);
        assert!(reader.read_var_int(0x1233).is_err());
    }

    #[test]
    fn test_fixed_string_padding() {
        let mut reader = MemoryReader::new(b"neo\0\0\0");
        assert_eq!(reader.read_fixed_string(6).unwrap(), "neo");

        let mut reader = MemoryReader::new(b"neo\0x\0");
        assert!(reader.read_fixed_string(6).is_err());
    }

    #[test]
    fn test_var_string() {
        let mut reader = MemoryReader::new(&[5, b'h', b'e', b'l', b'l', b'o']);
        assert_eq!(reader.read_var_string(100).unwrap(), "hello");
    }
}
