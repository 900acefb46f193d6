// Copyright (C) 2015-2025 The Neo Project.
//
// witness.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The witness carried alongside each signer.

use crate::UInt160;
use neo_config::MAX_WITNESS_SCRIPT_SIZE;
use neo_cryptography::hash::hash160;
use neo_io::serializable::var_bytes_size;
use neo_io::{BinaryWriter, IoResult, MemoryReader, Serializable};

/// A pair of invocation and verification scripts.
///
/// Executing the invocation script followed by the verification script
/// must HALT with a truthy top of stack for the signer to be accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Witness {
    /// The script pushing the signatures.
    pub invocation_script: Vec<u8>,
    /// The script performing the check, usually a signature contract.
    pub verification_script: Vec<u8>,
}

impl Witness {
    /// Creates a witness from its two scripts.
    pub fn new(invocation_script: Vec<u8>, verification_script: Vec<u8>) -> Self {
        Self {
            invocation_script,
            verification_script,
        }
    }

    /// The empty witness, `(0x00, 0x00)` on the wire.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The script hash of the verification script.
    pub fn script_hash(&self) -> UInt160 {
        UInt160::from(hash160(&self.verification_script))
    }
}

impl Serializable for Witness {
    fn size(&self) -> usize {
        var_bytes_size(&self.invocation_script) + var_bytes_size(&self.verification_script)
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_var_bytes(&self.invocation_script);
        writer.write_var_bytes(&self.verification_script);
        Ok(())
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let invocation_script = reader.read_var_bytes(MAX_WITNESS_SCRIPT_SIZE)?;
        let verification_script = reader.read_var_bytes(MAX_WITNESS_SCRIPT_SIZE)?;
        Ok(Self {
            invocation_script,
            verification_script,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_witness_encoding() {
        let witness = Witness::empty();
        assert_eq!(witness.to_array(), vec![0x00, 0x00]);
        assert_eq!(witness.size(), 2);
    }

    #[test]
    fn test_round_trip() {
        let witness = Witness::new(vec![1, 2, 3], vec![4, 5]);
        let decoded = Witness::from_bytes(&witness.to_array()).unwrap();
        assert_eq!(decoded, witness);
    }

    #[test]
    fn test_script_size_cap() {
        let mut writer = BinaryWriter::new();
        writer.write_var_bytes(&vec![0u8; 1025]);
        writer.write_var_bytes(&[]);
        let bytes = writer.into_bytes();
        let mut reader = MemoryReader::new(&bytes);
        assert!(Witness::deserialize(&mut reader).is_err());
    }

    #[test]
    fn test_script_hash() {
        let witness = Witness::new(vec![], vec![0x51]);
        assert_eq!(
            witness.script_hash().as_bytes(),
            &neo_cryptography::hash::hash160(&[0x51])
        );
    }
}
