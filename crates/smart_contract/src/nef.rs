// Copyright (C) 2015-2025 The Neo Project.
//
// nef.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The NEF (Neo Executable Format) file.

use crate::call_flags::CallFlags;
use neo_core::UInt160;
use neo_cryptography::hash::hash256;
use neo_io::serializable::{var_bytes_size, var_int_size, vec_size};
use neo_io::{BinaryWriter, IoError, IoResult, MemoryReader, Serializable};

/// The NEF magic, `NEF3` little-endian.
pub const NEF_MAGIC: u32 = 0x3346_454e;

/// The widest compiler field, zero padded.
pub const COMPILER_FIELD_SIZE: usize = 64;

/// The longest source URL.
pub const MAX_SOURCE_LENGTH: usize = 256;

/// The largest script a NEF may carry.
pub const MAX_NEF_SCRIPT_SIZE: usize = 512 * 1024;

/// The most method tokens a NEF may carry.
pub const MAX_METHOD_TOKENS: usize = 128;

/// A static call target embedded at compile time, used by `CALLT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodToken {
    /// The target contract.
    pub hash: UInt160,
    /// The target method.
    pub method: String,
    /// The number of parameters the call pops.
    pub parameters_count: u16,
    /// Whether the call leaves a return value.
    pub has_return_value: bool,
    /// The call flags requested.
    pub call_flags: CallFlags,
}

impl Serializable for MethodToken {
    fn size(&self) -> usize {
        20 + var_int_size(self.method.len() as u64) + self.method.len() + 2 + 1 + 1
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.hash.serialize(writer)?;
        writer.write_var_string(&self.method);
        writer.write_u16(self.parameters_count);
        writer.write_bool(self.has_return_value);
        writer.write_byte(self.call_flags.bits());
        Ok(())
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let hash = UInt160::deserialize(reader)?;
        let method = reader.read_var_string(32)?;
        if method.starts_with('_') {
            return Err(IoError::format("MethodToken", "method starts with '_'"));
        }
        let parameters_count = reader.read_u16()?;
        let has_return_value = reader.read_bool()?;
        let bits = reader.read_byte()?;
        let call_flags = CallFlags::from_bits(bits)
            .ok_or_else(|| IoError::format("MethodToken", "invalid call flags"))?;
        Ok(Self {
            hash,
            method,
            parameters_count,
            has_return_value,
            call_flags,
        })
    }
}

/// A compiled contract: compiler stamp, optional source URL, method
/// tokens, script and checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NefFile {
    /// The compiler name and version.
    pub compiler: String,
    /// A URL pointing at the source, may be empty.
    pub source: String,
    /// Static call targets for `CALLT`.
    pub tokens: Vec<MethodToken>,
    /// The contract script.
    pub script: Vec<u8>,
    /// First 4 bytes of the double SHA-256 of everything before it.
    pub checksum: u32,
}

impl NefFile {
    /// Assembles a NEF with a freshly computed checksum.
    pub fn new(compiler: String, source: String, tokens: Vec<MethodToken>, script: Vec<u8>) -> Self {
        let mut file = Self {
            compiler,
            source,
            tokens,
            script,
            checksum: 0,
        };
        file.checksum = file.compute_checksum();
        file
    }

    /// Computes the checksum over the serialized header and body.
    pub fn compute_checksum(&self) -> u32 {
        let bytes = self.to_array();
        let preamble = &bytes[..bytes.len() - 4];
        let digest = hash256(preamble);
        u32::from_le_bytes(digest[..4].try_into().expect("digest length"))
    }

    fn check(&self) -> IoResult<()> {
        if self.script.is_empty() {
            return Err(IoError::format("NefFile", "empty script"));
        }
        if self.script.len() > MAX_NEF_SCRIPT_SIZE {
            return Err(IoError::format("NefFile", "script too large"));
        }
        if self.compiler.len() > COMPILER_FIELD_SIZE {
            return Err(IoError::format("NefFile", "compiler name too long"));
        }
        Ok(())
    }
}

impl Serializable for NefFile {
    fn size(&self) -> usize {
        4 + COMPILER_FIELD_SIZE
            + var_int_size(self.source.len() as u64)
            + self.source.len()
            + 1
            + vec_size(&self.tokens)
            + 2
            + var_bytes_size(&self.script)
            + 4
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u32(NEF_MAGIC);
        writer.write_fixed_string(&self.compiler, COMPILER_FIELD_SIZE)?;
        writer.write_var_string(&self.source);
        writer.write_byte(0);
        neo_io::serializable::serialize_vec(&self.tokens, writer)?;
        writer.write_u16(0);
        writer.write_var_bytes(&self.script);
        writer.write_u32(self.checksum);
        Ok(())
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let magic = reader.read_u32()?;
        if magic != NEF_MAGIC {
            return Err(IoError::format("NefFile", "wrong magic"));
        }
        let compiler = reader.read_fixed_string(COMPILER_FIELD_SIZE)?;
        let source = reader.read_var_string(MAX_SOURCE_LENGTH)?;
        if reader.read_byte()? != 0 {
            return Err(IoError::format("NefFile", "reserved byte not zero"));
        }
        let tokens: Vec<MethodToken> =
            neo_io::serializable::deserialize_vec(reader, MAX_METHOD_TOKENS)?;
        if reader.read_u16()? != 0 {
            return Err(IoError::format("NefFile", "reserved word not zero"));
        }
        let script = reader.read_var_bytes(MAX_NEF_SCRIPT_SIZE)?;
        let checksum = reader.read_u32()?;
        let file = Self {
            compiler,
            source,
            tokens,
            script,
            checksum,
        };
        file.check()?;
        if checksum != file.compute_checksum() {
            return Err(IoError::format("NefFile", "checksum mismatch"));
        }
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NefFile {
        NefFile::new("neo-core-v3.0".into(), String::new(), vec![], vec![0x11, 0x40])
    }

    #[test]
    fn test_round_trip() {
        let nef = sample();
        let decoded = NefFile::from_bytes(&nef.to_array()).unwrap();
        assert_eq!(decoded, nef);
        assert_eq!(nef.to_array().len(), nef.size());
    }

    #[test]
    fn test_checksum_mismatch_rejected() {
        let mut bytes = sample().to_array();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(NefFile::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_script_corruption_rejected() {
        let nef = sample();
        let mut bytes = nef.to_array();
        // Flip a script byte without fixing the checksum.
        let script_pos = bytes.len() - 5;
        bytes[script_pos] ^= 0x01;
        assert!(NefFile::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_empty_script_rejected() {
        let mut nef = sample();
        nef.script = vec![];
        nef.checksum = nef.compute_checksum();
        assert!(NefFile::from_bytes(&nef.to_array()).is_err());
    }

    #[test]
    fn test_wrong_magic_rejected() {
        let mut bytes = sample().to_array();
        bytes[0] ^= 0x01;
        assert!(NefFile::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_method_token_round_trip() {
        let token = MethodToken {
            hash: UInt160::from([7u8; 20]),
            method: "transfer".into(),
            parameters_count: 4,
            has_return_value: true,
            call_flags: CallFlags::ALL,
        };
        assert_eq!(MethodToken::from_bytes(&token.to_array()).unwrap(), token);
    }
}
