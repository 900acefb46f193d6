//! Incremental script construction.

use crate::op_code::OpCode;
use crate::{VmError, VmResult};
use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// Builds scripts opcode by opcode.
#[derive(Default)]
pub struct ScriptBuilder {
    bytes: Vec<u8>,
}

impl ScriptBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current length of the script.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns whether nothing has been emitted.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The script bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// A copy of the script bytes.
    pub fn to_array(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    /// Emits a bare opcode.
    pub fn emit(&mut self, opcode: OpCode) -> &mut Self {
        self.bytes.push(opcode as u8);
        self
    }

    /// Emits an opcode with raw operand bytes.
    pub fn emit_raw(&mut self, opcode: OpCode, operand: &[u8]) -> &mut Self {
        self.bytes.push(opcode as u8);
        self.bytes.extend_from_slice(operand);
        self
    }

    /// Emits the shortest push of an integer.
    pub fn emit_push_int<T: Into<BigInt>>(&mut self, value: T) -> &mut Self {
        let value: BigInt = value.into();
        if let Some(small) = value.to_i64() {
            if small == -1 {
                return self.emit(OpCode::PushM1);
            }
            if (0..=16).contains(&small) {
                let byte = OpCode::Push0 as u8 + small as u8;
                self.bytes.push(byte);
                return self;
            }
        }
        let bytes = value.to_signed_bytes_le();
        let (opcode, width) = match bytes.len() {
            0..=1 => (OpCode::PushInt8, 1),
            2 => (OpCode::PushInt16, 2),
            3..=4 => (OpCode::PushInt32, 4),
            5..=8 => (OpCode::PushInt64, 8),
            9..=16 => (OpCode::PushInt128, 16),
            _ => (OpCode::PushInt256, 32),
        };
        let mut padded = bytes.clone();
        let sign_fill = if value.sign() == num_bigint::Sign::Minus {
            0xff
        } else {
            0x00
        };
        padded.resize(width, sign_fill);
        self.emit_raw(opcode, &padded)
    }

    /// Emits a boolean push.
    pub fn emit_push_bool(&mut self, value: bool) -> &mut Self {
        self.emit(if value { OpCode::PushT } else { OpCode::PushF })
    }

    /// Emits a data push, choosing the shortest PUSHDATA form.
    pub fn emit_push_bytes(&mut self, data: &[u8]) -> &mut Self {
        if data.len() <= 0xff {
            self.bytes.push(OpCode::PushData1 as u8);
            self.bytes.push(data.len() as u8);
        } else if data.len() <= 0xffff {
            self.bytes.push(OpCode::PushData2 as u8);
            self.bytes.extend_from_slice(&(data.len() as u16).to_le_bytes());
        } else {
            self.bytes.push(OpCode::PushData4 as u8);
            self.bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        }
        self.bytes.extend_from_slice(data);
        self
    }

    /// Emits a UTF-8 string push.
    pub fn emit_push_string(&mut self, value: &str) -> &mut Self {
        self.emit_push_bytes(value.as_bytes())
    }

    /// Emits a null push.
    pub fn emit_push_null(&mut self) -> &mut Self {
        self.emit(OpCode::PushNull)
    }

    /// Emits a jump-family opcode with its offset operand. Short forms
    /// take an i8, long forms an i32.
    pub fn emit_jump(&mut self, opcode: OpCode, offset: i32) -> &mut Self {
        match opcode.operand_size().size {
            1 => {
                debug_assert!(i8::try_from(offset).is_ok());
                self.emit_raw(opcode, &[(offset as i8) as u8])
            }
            4 => {
                let bytes = offset.to_le_bytes();
                self.emit_raw(opcode, &bytes)
            }
            _ => {
                debug_assert!(false, "not a jump opcode: {opcode:?}");
                self
            }
        }
    }

    /// Emits a short TRY with i8 catch and finally offsets; 0 means the
    /// block is absent.
    pub fn emit_try(&mut self, catch_offset: i8, finally_offset: i8) -> &mut Self {
        self.emit_raw(
            OpCode::Try,
            &[catch_offset as u8, finally_offset as u8],
        )
    }

    /// Emits a SYSCALL with its little-endian id.
    pub fn emit_syscall(&mut self, id: u32) -> &mut Self {
        let bytes = id.to_le_bytes();
        self.emit_raw(OpCode::Syscall, &bytes)
    }

    /// Validates and returns the built script under strict rules.
    pub fn into_strict_script(self) -> VmResult<crate::script::Script> {
        crate::script::Script::new_strict(self.bytes)
            .map_err(|e| VmError::InvalidScript(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_int_uses_single_byte() {
        let mut sb = ScriptBuilder::new();
        sb.emit_push_int(0);
        sb.emit_push_int(16);
        sb.emit_push_int(-1);
        assert_eq!(
            sb.to_array(),
            vec![
                OpCode::Push0 as u8,
                OpCode::Push16 as u8,
                OpCode::PushM1 as u8
            ]
        );
    }

    #[test]
    fn test_larger_int_forms() {
        let mut sb = ScriptBuilder::new();
        sb.emit_push_int(17);
        assert_eq!(sb.to_array(), vec![OpCode::PushInt8 as u8, 17]);

        let mut sb = ScriptBuilder::new();
        sb.emit_push_int(-300);
        let bytes = sb.to_array();
        assert_eq!(bytes[0], OpCode::PushInt16 as u8);
        assert_eq!(i16::from_le_bytes([bytes[1], bytes[2]]), -300);
    }

    #[test]
    fn test_negative_padding_preserves_value() {
        let mut sb = ScriptBuilder::new();
        sb.emit_push_int(-1_000_000i64);
        let bytes = sb.to_array();
        assert_eq!(bytes[0], OpCode::PushInt32 as u8);
        assert_eq!(
            i32::from_le_bytes(bytes[1..5].try_into().unwrap()),
            -1_000_000
        );
    }

    #[test]
    fn test_pushdata_forms() {
        let mut sb = ScriptBuilder::new();
        sb.emit_push_bytes(&[0xaa; 3]);
        assert_eq!(sb.to_array()[..2], [OpCode::PushData1 as u8, 3]);

        let mut sb = ScriptBuilder::new();
        sb.emit_push_bytes(&vec![0u8; 300]);
        assert_eq!(sb.to_array()[0], OpCode::PushData2 as u8);
    }

    #[test]
    fn test_strict_validation_of_built_script() {
        let mut sb = ScriptBuilder::new();
        sb.emit_push_int(1);
        sb.emit(OpCode::Ret);
        assert!(sb.into_strict_script().is_ok());
    }
}
