// Copyright (C) 2015-2025 The Neo Project.
//
// attributes.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Transaction attributes.

use crate::UInt256;
use neo_io::serializable::var_bytes_size;
use neo_io::{BinaryWriter, IoError, IoResult, MemoryReader, Serializable};

/// The largest oracle response payload.
pub const MAX_ORACLE_RESULT_SIZE: usize = 0xffff;

/// The fixed network fee an oracle response attribute carries, in datoshi.
pub const ORACLE_RESPONSE_FIXED_FEE: i64 = 10_000_000;

/// Result codes an oracle response may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OracleResponseCode {
    /// The request completed successfully.
    Success = 0x00,
    /// The protocol of the URL is not supported.
    ProtocolNotSupported = 0x10,
    /// The consensus of oracle nodes was not reached.
    ConsensusUnreachable = 0x12,
    /// The requested resource does not exist.
    NotFound = 0x14,
    /// The request timed out.
    Timeout = 0x16,
    /// The oracle nodes may not access the resource.
    Forbidden = 0x18,
    /// The response is larger than allowed.
    ResponseTooLarge = 0x1a,
    /// The requester cannot pay the response fee.
    InsufficientFunds = 0x1c,
    /// The content type is not supported.
    ContentTypeNotSupported = 0x1f,
    /// The request failed for another reason.
    Error = 0xff,
}

impl OracleResponseCode {
    /// Decodes a response code byte.
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Success),
            0x10 => Some(Self::ProtocolNotSupported),
            0x12 => Some(Self::ConsensusUnreachable),
            0x14 => Some(Self::NotFound),
            0x16 => Some(Self::Timeout),
            0x18 => Some(Self::Forbidden),
            0x1a => Some(Self::ResponseTooLarge),
            0x1c => Some(Self::InsufficientFunds),
            0x1f => Some(Self::ContentTypeNotSupported),
            0xff => Some(Self::Error),
            _ => None,
        }
    }
}

/// An attribute attached to a transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionAttribute {
    /// Marks the transaction as high priority; only committee senders may use it.
    HighPriority,
    /// Carries the result of an oracle request back on chain.
    OracleResponse {
        /// The id of the request being answered.
        id: u64,
        /// The outcome.
        code: OracleResponseCode,
        /// The response payload; empty unless `code` is `Success`.
        result: Vec<u8>,
    },
    /// Declares a conflict with another transaction hash.
    Conflicts {
        /// The hash this transaction conflicts with.
        hash: UInt256,
    },
    /// Marks a notary-assisted transaction; gated behind a hardfork.
    NotaryAssisted {
        /// The number of keys involved.
        n_keys: u8,
    },
}

impl TransactionAttribute {
    const TYPE_HIGH_PRIORITY: u8 = 0x01;
    const TYPE_ORACLE_RESPONSE: u8 = 0x11;
    const TYPE_CONFLICTS: u8 = 0x21;
    const TYPE_NOTARY_ASSISTED: u8 = 0x22;

    /// The wire tag of this attribute.
    pub fn attribute_type(&self) -> u8 {
        match self {
            TransactionAttribute::HighPriority => Self::TYPE_HIGH_PRIORITY,
            TransactionAttribute::OracleResponse { .. } => Self::TYPE_ORACLE_RESPONSE,
            TransactionAttribute::Conflicts { .. } => Self::TYPE_CONFLICTS,
            TransactionAttribute::NotaryAssisted { .. } => Self::TYPE_NOTARY_ASSISTED,
        }
    }

    /// Whether several attributes of this type may coexist on one transaction.
    pub fn allow_multiple(&self) -> bool {
        matches!(self, TransactionAttribute::Conflicts { .. })
    }

    /// The extra network fee this attribute requires, in datoshi.
    pub fn network_fee(&self) -> i64 {
        match self {
            TransactionAttribute::OracleResponse { .. } => ORACLE_RESPONSE_FIXED_FEE,
            _ => 0,
        }
    }
}

impl Serializable for TransactionAttribute {
    fn size(&self) -> usize {
        1 + match self {
            TransactionAttribute::HighPriority => 0,
            TransactionAttribute::OracleResponse { id: _, code: _, result } => {
                8 + 1 + var_bytes_size(result)
            }
            TransactionAttribute::Conflicts { .. } => 32,
            TransactionAttribute::NotaryAssisted { .. } => 1,
        }
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_byte(self.attribute_type());
        match self {
            TransactionAttribute::HighPriority => {}
            TransactionAttribute::OracleResponse { id, code, result } => {
                writer.write_u64(*id);
                writer.write_byte(*code as u8);
                writer.write_var_bytes(result);
            }
            TransactionAttribute::Conflicts { hash } => hash.serialize(writer)?,
            TransactionAttribute::NotaryAssisted { n_keys } => writer.write_byte(*n_keys),
        }
        Ok(())
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let tag = reader.read_byte()?;
        match tag {
            Self::TYPE_HIGH_PRIORITY => Ok(TransactionAttribute::HighPriority),
            Self::TYPE_ORACLE_RESPONSE => {
                let id = reader.read_u64()?;
                let code_byte = reader.read_byte()?;
                let code = OracleResponseCode::from_byte(code_byte).ok_or_else(|| {
                    IoError::format(
                        "TransactionAttribute",
                        format!("unknown oracle response code 0x{code_byte:02x}"),
                    )
                })?;
                let result = reader.read_var_bytes(MAX_ORACLE_RESULT_SIZE)?;
                if code != OracleResponseCode::Success && !result.is_empty() {
                    return Err(IoError::format(
                        "TransactionAttribute",
                        "non-success oracle response with payload",
                    ));
                }
                Ok(TransactionAttribute::OracleResponse { id, code, result })
            }
            Self::TYPE_CONFLICTS => Ok(TransactionAttribute::Conflicts {
                hash: UInt256::deserialize(reader)?,
            }),
            Self::TYPE_NOTARY_ASSISTED => Ok(TransactionAttribute::NotaryAssisted {
                n_keys: reader.read_byte()?,
            }),
            other => Err(IoError::format(
                "TransactionAttribute",
                format!("unknown attribute type 0x{other:02x}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_high_priority_round_trip() {
        let attr = TransactionAttribute::HighPriority;
        assert_eq!(attr.to_array(), vec![0x01]);
        assert_eq!(
            TransactionAttribute::from_bytes(&attr.to_array()).unwrap(),
            attr
        );
    }

    #[test]
    fn test_oracle_response_round_trip() {
        let attr = TransactionAttribute::OracleResponse {
            id: 7,
            code: OracleResponseCode::Success,
            result: vec![1, 2, 3],
        };
        let decoded = TransactionAttribute::from_bytes(&attr.to_array()).unwrap();
        assert_eq!(decoded, attr);
        assert_eq!(attr.network_fee(), ORACLE_RESPONSE_FIXED_FEE);
    }

    #[test]
    fn test_oracle_failure_must_be_empty() {
        let attr = TransactionAttribute::OracleResponse {
            id: 7,
            code: OracleResponseCode::Timeout,
            result: vec![1],
        };
        assert!(TransactionAttribute::from_bytes(&attr.to_array()).is_err());
    }

    #[test]
    fn test_conflicts_round_trip() {
        let attr = TransactionAttribute::Conflicts {
            hash: UInt256::from([5u8; 32]),
        };
        assert!(attr.allow_multiple());
        assert_eq!(
            TransactionAttribute::from_bytes(&attr.to_array()).unwrap(),
            attr
        );
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(TransactionAttribute::from_bytes(&[0x99]).is_err());
    }
}
