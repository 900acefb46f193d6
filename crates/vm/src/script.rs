//! Scripts and their state-independent validation.

use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::{VmError, VmResult};
use std::sync::Arc;

/// An immutable script, cheaply cloneable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    bytes: Arc<Vec<u8>>,
}

impl Script {
    /// Wraps raw bytes without validation; malformed instructions fault at
    /// execution time instead.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(bytes),
        }
    }

    /// Wraps and validates: every opcode must be known, every operand in
    /// bounds, and every jump target inside the script. This is the
    /// state-independent check run at transaction acceptance.
    pub fn new_strict(bytes: Vec<u8>) -> VmResult<Self> {
        let script = Self::new(bytes);
        script.validate()?;
        Ok(script)
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The script length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns whether the script is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decodes the instruction at `position`.
    pub fn instruction_at(&self, position: usize) -> VmResult<Instruction> {
        Instruction::decode(&self.bytes, position)
    }

    fn validate(&self) -> VmResult<()> {
        let mut position = 0;
        while position < self.bytes.len() {
            let instruction = self.instruction_at(position)?;
            match instruction.opcode() {
                OpCode::Jmp
                | OpCode::JmpIf
                | OpCode::JmpIfNot
                | OpCode::JmpEq
                | OpCode::JmpNe
                | OpCode::JmpGt
                | OpCode::JmpGe
                | OpCode::JmpLt
                | OpCode::JmpLe
                | OpCode::Call
                | OpCode::EndTry => {
                    self.check_target(position, instruction.token_i8()? as i32)?;
                }
                OpCode::JmpL
                | OpCode::JmpIfL
                | OpCode::JmpIfNotL
                | OpCode::JmpEqL
                | OpCode::JmpNeL
                | OpCode::JmpGtL
                | OpCode::JmpGeL
                | OpCode::JmpLtL
                | OpCode::JmpLeL
                | OpCode::CallL
                | OpCode::EndTryL => {
                    self.check_target(position, instruction.token_i32()?)?;
                }
                OpCode::PushA => {
                    self.check_target(position, instruction.token_i32()?)?;
                }
                OpCode::Try => {
                    self.check_target(position, instruction.token_i8()? as i32)?;
                    self.check_target(position, instruction.token_i8_1()? as i32)?;
                }
                OpCode::TryL => {
                    self.check_target(position, instruction.token_i32()?)?;
                    self.check_target(position, instruction.token_i32_1()?)?;
                }
                OpCode::NewArrayT | OpCode::IsType | OpCode::Convert => {
                    let type_byte = instruction.token_u8()?;
                    crate::stack_item::StackItemType::from_byte(type_byte).ok_or_else(|| {
                        VmError::InvalidScript(format!("invalid type byte 0x{type_byte:02x}"))
                    })?;
                }
                _ => {}
            }
            position += instruction.size();
        }
        Ok(())
    }

    fn check_target(&self, position: usize, offset: i32) -> VmResult<()> {
        // Offset 0 in TRY means "no such block"; the opcode handlers treat
        // it specially, so it is always an acceptable target here.
        let target = position as i64 + offset as i64;
        if target < 0 || target > self.bytes.len() as i64 {
            return Err(VmError::InvalidScript(format!(
                "jump target {target} outside script of {} bytes",
                self.bytes.len()
            )));
        }
        Ok(())
    }
}

impl From<Vec<u8>> for Script {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_accepts_valid() {
        let script = vec![OpCode::Push1 as u8, OpCode::Push2 as u8, OpCode::Ret as u8];
        assert!(Script::new_strict(script).is_ok());
    }

    #[test]
    fn test_strict_rejects_unknown_opcode() {
        assert!(Script::new_strict(vec![0x42]).is_err());
    }

    #[test]
    fn test_strict_rejects_truncated_push() {
        assert!(Script::new_strict(vec![OpCode::PushInt32 as u8, 1]).is_err());
        assert!(Script::new_strict(vec![OpCode::PushData1 as u8, 9, 1, 2]).is_err());
    }

    #[test]
    fn test_strict_rejects_jump_outside() {
        // JMP +100 in a 3-byte script.
        assert!(Script::new_strict(vec![OpCode::Jmp as u8, 100, OpCode::Ret as u8]).is_err());
        // JMP -5 before script start.
        assert!(Script::new_strict(vec![OpCode::Jmp as u8, 0xfb, OpCode::Ret as u8]).is_err());
    }

    #[test]
    fn test_strict_accepts_jump_to_end() {
        // Jumping exactly to the end is the implicit RET position.
        assert!(Script::new_strict(vec![OpCode::Jmp as u8, 2]).is_ok());
    }

    #[test]
    fn test_strict_rejects_bad_convert_type() {
        assert!(Script::new_strict(vec![OpCode::Convert as u8, 0x77]).is_err());
    }
}
