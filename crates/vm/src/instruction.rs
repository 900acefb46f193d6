//! Instruction decoding.

use crate::op_code::OpCode;
use crate::{VmError, VmResult};

/// A decoded instruction: an opcode plus its operand bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    opcode: OpCode,
    operand: Vec<u8>,
    /// Total encoded size, including the opcode byte and any length prefix.
    size: usize,
}

impl Instruction {
    /// Decodes the instruction starting at `position` in `script`.
    pub fn decode(script: &[u8], position: usize) -> VmResult<Self> {
        let &opcode_byte = script.get(position).ok_or_else(|| {
            VmError::InvalidScript(format!("instruction pointer {position} out of range"))
        })?;
        let opcode = OpCode::from_byte(opcode_byte)?;
        let layout = opcode.operand_size();

        let mut cursor = position + 1;
        let operand_len = if layout.prefix > 0 {
            let prefix_end = cursor + layout.prefix;
            let prefix_bytes = script.get(cursor..prefix_end).ok_or_else(|| {
                VmError::InvalidScript(format!("truncated operand prefix at {cursor}"))
            })?;
            let mut value = 0usize;
            for (i, &b) in prefix_bytes.iter().enumerate() {
                value |= (b as usize) << (8 * i);
            }
            cursor = prefix_end;
            value
        } else {
            layout.size
        };

        let operand_end = cursor + operand_len;
        let operand = script
            .get(cursor..operand_end)
            .ok_or_else(|| {
                VmError::InvalidScript(format!(
                    "operand of {operand_len} bytes overruns script at {cursor}"
                ))
            })?
            .to_vec();

        Ok(Self {
            opcode,
            operand,
            size: operand_end - position,
        })
    }

    /// A bare RET, the implicit end-of-script instruction.
    pub fn ret() -> Self {
        Self {
            opcode: OpCode::Ret,
            operand: Vec::new(),
            size: 1,
        }
    }

    /// The opcode.
    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    /// The operand bytes.
    pub fn operand(&self) -> &[u8] {
        &self.operand
    }

    /// Total encoded size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    fn operand_array<const N: usize>(&self) -> VmResult<[u8; N]> {
        self.operand.get(..N).and_then(|s| s.try_into().ok()).ok_or_else(|| {
            VmError::InvalidScript(format!(
                "operand of {} bytes, expected {N}",
                self.operand.len()
            ))
        })
    }

    /// The operand as an i8 offset or index.
    pub fn token_i8(&self) -> VmResult<i8> {
        Ok(self.operand_array::<1>()?[0] as i8)
    }

    /// The second operand byte as an i8.
    pub fn token_i8_1(&self) -> VmResult<i8> {
        Ok(self.operand_array::<2>()?[1] as i8)
    }

    /// The operand as an unsigned byte.
    pub fn token_u8(&self) -> VmResult<u8> {
        Ok(self.operand_array::<1>()?[0])
    }

    /// The second operand byte.
    pub fn token_u8_1(&self) -> VmResult<u8> {
        Ok(self.operand_array::<2>()?[1])
    }

    /// The operand as a little-endian u16.
    pub fn token_u16(&self) -> VmResult<u16> {
        Ok(u16::from_le_bytes(self.operand_array::<2>()?))
    }

    /// The operand as a little-endian i32.
    pub fn token_i32(&self) -> VmResult<i32> {
        Ok(i32::from_le_bytes(self.operand_array::<4>()?))
    }

    /// The second i32 of an 8-byte operand.
    pub fn token_i32_1(&self) -> VmResult<i32> {
        let bytes = self.operand_array::<8>()?;
        Ok(i32::from_le_bytes(bytes[4..8].try_into().expect("slice length")))
    }

    /// The operand as a little-endian u32.
    pub fn token_u32(&self) -> VmResult<u32> {
        Ok(u32::from_le_bytes(self.operand_array::<4>()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_simple() {
        let script = [OpCode::Push1 as u8, OpCode::Ret as u8];
        let instruction = Instruction::decode(&script, 0).unwrap();
        assert_eq!(instruction.opcode(), OpCode::Push1);
        assert_eq!(instruction.size(), 1);
        let next = Instruction::decode(&script, 1).unwrap();
        assert_eq!(next.opcode(), OpCode::Ret);
    }

    #[test]
    fn test_decode_pushint16() {
        let script = [OpCode::PushInt16 as u8, 0x34, 0x12];
        let instruction = Instruction::decode(&script, 0).unwrap();
        assert_eq!(instruction.operand(), &[0x34, 0x12]);
        assert_eq!(instruction.size(), 3);
    }

    #[test]
    fn test_decode_pushdata1() {
        let script = [OpCode::PushData1 as u8, 3, 0xaa, 0xbb, 0xcc];
        let instruction = Instruction::decode(&script, 0).unwrap();
        assert_eq!(instruction.operand(), &[0xaa, 0xbb, 0xcc]);
        assert_eq!(instruction.size(), 5);
    }

    #[test]
    fn test_truncated_operand_rejected() {
        let script = [OpCode::PushInt32 as u8, 1, 2];
        assert!(Instruction::decode(&script, 0).is_err());

        let script = [OpCode::PushData1 as u8, 5, 1];
        assert!(Instruction::decode(&script, 0).is_err());
    }

    #[test]
    fn test_try_operand_tokens() {
        // TRY with catch offset 5, finally offset -3.
        let script = [OpCode::Try as u8, 5, 0xfd];
        let instruction = Instruction::decode(&script, 0).unwrap();
        assert_eq!(instruction.token_i8().unwrap(), 5);
        assert_eq!(instruction.token_i8_1().unwrap(), -3);
    }

    #[test]
    fn test_unknown_opcode_rejected() {
        assert!(Instruction::decode(&[0x42], 0).is_err());
    }
}
