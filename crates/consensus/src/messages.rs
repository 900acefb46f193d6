// Copyright (C) 2015-2025 The Neo Project.
//
// messages.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! dBFT message types and their wire encoding.

use neo_config::MAX_TRANSACTIONS_PER_BLOCK;
use neo_core::UInt256;
use neo_io::serializable::{var_bytes_size, vec_size};
use neo_io::{BinaryWriter, IoError, IoResult, MemoryReader, Serializable};

/// Why a validator requested a view change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChangeViewReason {
    /// The round timer expired.
    Timeout = 0x0,
    /// Other validators already moved on.
    ChangeAgreement = 0x1,
    /// A proposed transaction could not be found.
    TxNotFound = 0x2,
    /// A proposed transaction is rejected by policy.
    TxRejectedByPolicy = 0x3,
    /// A proposed transaction is invalid.
    TxInvalid = 0x4,
    /// The proposed block violates policy.
    BlockRejectedByPolicy = 0x5,
}

impl ChangeViewReason {
    fn from_byte(byte: u8) -> IoResult<Self> {
        match byte {
            0x0 => Ok(Self::Timeout),
            0x1 => Ok(Self::ChangeAgreement),
            0x2 => Ok(Self::TxNotFound),
            0x3 => Ok(Self::TxRejectedByPolicy),
            0x4 => Ok(Self::TxInvalid),
            0x5 => Ok(Self::BlockRejectedByPolicy),
            other => Err(IoError::format(
                "ChangeViewReason",
                format!("unknown reason 0x{other:02x}"),
            )),
        }
    }
}

/// A view-change request. The new view is the sender's current view plus
/// one; views only move forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeView {
    /// The sender's clock, for recovery ordering.
    pub timestamp: u64,
    /// Why the sender gave up on the view.
    pub reason: ChangeViewReason,
}

/// The primary's block proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareRequest {
    /// The block version being proposed.
    pub version: u32,
    /// The hash the proposed block builds on.
    pub prev_hash: UInt256,
    /// The proposed block timestamp, milliseconds.
    pub timestamp: u64,
    /// The proposed block nonce.
    pub nonce: u64,
    /// The transactions of the proposed block, by hash.
    pub transaction_hashes: Vec<UInt256>,
}

/// A backup's acknowledgement of the primary's proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareResponse {
    /// The hash of the primary's preparation payload.
    pub preparation_hash: UInt256,
}

/// A validator's signature over the proposed block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// The 64-byte block signature.
    pub signature: Vec<u8>,
}

/// A request for the current round's evidence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryRequest {
    /// The sender's clock.
    pub timestamp: u64,
}

/// A compact change-view record inside a recovery message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeViewCompact {
    /// The sending validator.
    pub validator_index: u8,
    /// The view the validator was leaving.
    pub original_view_number: u8,
    /// The sender's clock.
    pub timestamp: u64,
}

/// A compact preparation record inside a recovery message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparationCompact {
    /// The validator that sent a preparation.
    pub validator_index: u8,
}

/// A compact commit record inside a recovery message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitCompact {
    /// The view the commit was sent in.
    pub view_number: u8,
    /// The committing validator.
    pub validator_index: u8,
    /// The block signature.
    pub signature: Vec<u8>,
}

/// Everything a validator has seen this round, for peers catching up.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecoveryMessage {
    /// Change-view evidence per validator.
    pub change_view_messages: Vec<ChangeViewCompact>,
    /// The primary's proposal, if seen.
    pub prepare_request: Option<PrepareRequest>,
    /// The preparation hash backups acknowledged, when the request itself
    /// is absent.
    pub preparation_hash: Option<UInt256>,
    /// Preparation evidence per validator.
    pub preparation_messages: Vec<PreparationCompact>,
    /// Commit evidence per validator.
    pub commit_messages: Vec<CommitCompact>,
}

/// The payload variants of a consensus message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsensusMessagePayload {
    /// A view change request.
    ChangeView(ChangeView),
    /// The primary's proposal.
    PrepareRequest(PrepareRequest),
    /// A backup acknowledgement.
    PrepareResponse(PrepareResponse),
    /// A block signature.
    Commit(Commit),
    /// A plea for evidence.
    RecoveryRequest(RecoveryRequest),
    /// The evidence itself.
    RecoveryMessage(RecoveryMessage),
}

impl ConsensusMessagePayload {
    fn type_byte(&self) -> u8 {
        match self {
            ConsensusMessagePayload::ChangeView(_) => 0x00,
            ConsensusMessagePayload::PrepareRequest(_) => 0x20,
            ConsensusMessagePayload::PrepareResponse(_) => 0x21,
            ConsensusMessagePayload::Commit(_) => 0x30,
            ConsensusMessagePayload::RecoveryRequest(_) => 0x40,
            ConsensusMessagePayload::RecoveryMessage(_) => 0x41,
        }
    }
}

/// A dBFT message: the round header plus a typed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusMessage {
    /// The block height being decided.
    pub block_index: u32,
    /// The index of the sending validator.
    pub validator_index: u8,
    /// The view the message belongs to.
    pub view_number: u8,
    /// The payload.
    pub payload: ConsensusMessagePayload,
}

impl ConsensusMessage {
    /// Creates a message.
    pub fn new(
        block_index: u32,
        validator_index: u8,
        view_number: u8,
        payload: ConsensusMessagePayload,
    ) -> Self {
        Self {
            block_index,
            validator_index,
            view_number,
            payload,
        }
    }
}

impl Serializable for ConsensusMessage {
    fn size(&self) -> usize {
        let body = match &self.payload {
            ConsensusMessagePayload::ChangeView(_) => 8 + 1,
            ConsensusMessagePayload::PrepareRequest(request) => {
                4 + 32 + 8 + 8 + vec_size(&request.transaction_hashes)
            }
            ConsensusMessagePayload::PrepareResponse(_) => 32,
            ConsensusMessagePayload::Commit(commit) => commit.signature.len(),
            ConsensusMessagePayload::RecoveryRequest(_) => 8,
            ConsensusMessagePayload::RecoveryMessage(recovery) => {
                let prepare_size = match &recovery.prepare_request {
                    Some(request) => {
                        1 + 4 + 32 + 8 + 8 + vec_size(&request.transaction_hashes)
                    }
                    None => 1 + if recovery.preparation_hash.is_some() { 33 } else { 1 },
                };
                neo_io::serializable::var_int_size(recovery.change_view_messages.len() as u64)
                    + recovery.change_view_messages.len() * (1 + 1 + 8)
                    + prepare_size
                    + neo_io::serializable::var_int_size(
                        recovery.preparation_messages.len() as u64
                    )
                    + recovery.preparation_messages.len()
                    + neo_io::serializable::var_int_size(recovery.commit_messages.len() as u64)
                    + recovery
                        .commit_messages
                        .iter()
                        .map(|c| 1 + 1 + var_bytes_size(&c.signature))
                        .sum::<usize>()
            }
        };
        1 + 4 + 1 + 1 + body
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_byte(self.payload.type_byte());
        writer.write_u32(self.block_index);
        writer.write_byte(self.validator_index);
        writer.write_byte(self.view_number);
        match &self.payload {
            ConsensusMessagePayload::ChangeView(change_view) => {
                writer.write_u64(change_view.timestamp);
                writer.write_byte(change_view.reason as u8);
            }
            ConsensusMessagePayload::PrepareRequest(request) => {
                serialize_prepare_request(request, writer)?;
            }
            ConsensusMessagePayload::PrepareResponse(response) => {
                response.preparation_hash.serialize(writer)?;
            }
            ConsensusMessagePayload::Commit(commit) => {
                if commit.signature.len() != 64 {
                    return Err(IoError::format("Commit", "signature must be 64 bytes"));
                }
                writer.write_bytes(&commit.signature);
            }
            ConsensusMessagePayload::RecoveryRequest(request) => {
                writer.write_u64(request.timestamp);
            }
            ConsensusMessagePayload::RecoveryMessage(recovery) => {
                writer.write_var_int(recovery.change_view_messages.len() as u64);
                for compact in &recovery.change_view_messages {
                    writer.write_byte(compact.validator_index);
                    writer.write_byte(compact.original_view_number);
                    writer.write_u64(compact.timestamp);
                }
                match &recovery.prepare_request {
                    Some(request) => {
                        writer.write_byte(1);
                        serialize_prepare_request(request, writer)?;
                    }
                    None => {
                        writer.write_byte(0);
                        match &recovery.preparation_hash {
                            Some(hash) => {
                                writer.write_byte(1);
                                hash.serialize(writer)?;
                            }
                            None => writer.write_byte(0),
                        }
                    }
                }
                writer.write_var_int(recovery.preparation_messages.len() as u64);
                for compact in &recovery.preparation_messages {
                    writer.write_byte(compact.validator_index);
                }
                writer.write_var_int(recovery.commit_messages.len() as u64);
                for compact in &recovery.commit_messages {
                    writer.write_byte(compact.view_number);
                    writer.write_byte(compact.validator_index);
                    writer.write_var_bytes(&compact.signature);
                }
            }
        }
        Ok(())
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let type_byte = reader.read_byte()?;
        let block_index = reader.read_u32()?;
        let validator_index = reader.read_byte()?;
        let view_number = reader.read_byte()?;
        let payload = match type_byte {
            0x00 => ConsensusMessagePayload::ChangeView(ChangeView {
                timestamp: reader.read_u64()?,
                reason: ChangeViewReason::from_byte(reader.read_byte()?)?,
            }),
            0x20 => ConsensusMessagePayload::PrepareRequest(deserialize_prepare_request(reader)?),
            0x21 => ConsensusMessagePayload::PrepareResponse(PrepareResponse {
                preparation_hash: UInt256::deserialize(reader)?,
            }),
            0x30 => ConsensusMessagePayload::Commit(Commit {
                signature: reader.read_bytes(64)?,
            }),
            0x40 => ConsensusMessagePayload::RecoveryRequest(RecoveryRequest {
                timestamp: reader.read_u64()?,
            }),
            0x41 => {
                let change_view_count = reader.read_var_int(255)? as usize;
                let mut change_view_messages = Vec::with_capacity(change_view_count);
                for _ in 0..change_view_count {
                    change_view_messages.push(ChangeViewCompact {
                        validator_index: reader.read_byte()?,
                        original_view_number: reader.read_byte()?,
                        timestamp: reader.read_u64()?,
                    });
                }
                let prepare_request = if reader.read_bool()? {
                    Some(deserialize_prepare_request(reader)?)
                } else {
                    None
                };
                let preparation_hash = if prepare_request.is_none() && reader.read_bool()? {
                    Some(UInt256::deserialize(reader)?)
                } else {
                    None
                };
                let preparation_count = reader.read_var_int(255)? as usize;
                let mut preparation_messages = Vec::with_capacity(preparation_count);
                for _ in 0..preparation_count {
                    preparation_messages.push(PreparationCompact {
                        validator_index: reader.read_byte()?,
                    });
                }
                let commit_count = reader.read_var_int(255)? as usize;
                let mut commit_messages = Vec::with_capacity(commit_count);
                for _ in 0..commit_count {
                    commit_messages.push(CommitCompact {
                        view_number: reader.read_byte()?,
                        validator_index: reader.read_byte()?,
                        signature: reader.read_var_bytes(64)?,
                    });
                }
                ConsensusMessagePayload::RecoveryMessage(RecoveryMessage {
                    change_view_messages,
                    prepare_request,
                    preparation_hash,
                    preparation_messages,
                    commit_messages,
                })
            }
            other => {
                return Err(IoError::format(
                    "ConsensusMessage",
                    format!("unknown message type 0x{other:02x}"),
                ))
            }
        };
        Ok(Self {
            block_index,
            validator_index,
            view_number,
            payload,
        })
    }
}

fn serialize_prepare_request(request: &PrepareRequest, writer: &mut BinaryWriter) -> IoResult<()> {
    writer.write_u32(request.version);
    request.prev_hash.serialize(writer)?;
    writer.write_u64(request.timestamp);
    writer.write_u64(request.nonce);
    neo_io::serializable::serialize_vec(&request.transaction_hashes, writer)
}

fn deserialize_prepare_request(reader: &mut MemoryReader<'_>) -> IoResult<PrepareRequest> {
    Ok(PrepareRequest {
        version: reader.read_u32()?,
        prev_hash: UInt256::deserialize(reader)?,
        timestamp: reader.read_u64()?,
        nonce: reader.read_u64()?,
        transaction_hashes: neo_io::serializable::deserialize_vec(
            reader,
            MAX_TRANSACTIONS_PER_BLOCK as usize,
        )?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(message: ConsensusMessage) {
        let bytes = message.to_array();
        assert_eq!(bytes.len(), message.size(), "size of {message:?}");
        let decoded = ConsensusMessage::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_change_view_round_trip() {
        round_trip(ConsensusMessage::new(
            5,
            2,
            1,
            ConsensusMessagePayload::ChangeView(ChangeView {
                timestamp: 123_456,
                reason: ChangeViewReason::Timeout,
            }),
        ));
    }

    #[test]
    fn test_prepare_request_round_trip() {
        round_trip(ConsensusMessage::new(
            10,
            0,
            0,
            ConsensusMessagePayload::PrepareRequest(PrepareRequest {
                version: 0,
                prev_hash: UInt256::from([1u8; 32]),
                timestamp: 99,
                nonce: 7,
                transaction_hashes: vec![UInt256::from([2u8; 32]), UInt256::from([3u8; 32])],
            }),
        ));
    }

    #[test]
    fn test_prepare_response_and_commit_round_trip() {
        round_trip(ConsensusMessage::new(
            10,
            1,
            0,
            ConsensusMessagePayload::PrepareResponse(PrepareResponse {
                preparation_hash: UInt256::from([9u8; 32]),
            }),
        ));
        round_trip(ConsensusMessage::new(
            10,
            1,
            0,
            ConsensusMessagePayload::Commit(Commit {
                signature: vec![0xabu8; 64],
            }),
        ));
    }

    #[test]
    fn test_recovery_round_trip() {
        round_trip(ConsensusMessage::new(
            10,
            3,
            2,
            ConsensusMessagePayload::RecoveryMessage(RecoveryMessage {
                change_view_messages: vec![ChangeViewCompact {
                    validator_index: 1,
                    original_view_number: 1,
                    timestamp: 55,
                }],
                prepare_request: Some(PrepareRequest {
                    version: 0,
                    prev_hash: UInt256::from([4u8; 32]),
                    timestamp: 60,
                    nonce: 1,
                    transaction_hashes: vec![],
                }),
                preparation_hash: None,
                preparation_messages: vec![
                    PreparationCompact { validator_index: 0 },
                    PreparationCompact { validator_index: 1 },
                ],
                commit_messages: vec![CommitCompact {
                    view_number: 2,
                    validator_index: 0,
                    signature: vec![0x11u8; 64],
                }],
            }),
        ));
    }

    #[test]
    fn test_recovery_with_preparation_hash_only() {
        round_trip(ConsensusMessage::new(
            10,
            3,
            2,
            ConsensusMessagePayload::RecoveryMessage(RecoveryMessage {
                preparation_hash: Some(UInt256::from([8u8; 32])),
                ..RecoveryMessage::default()
            }),
        ));
    }

    #[test]
    fn test_invalid_commit_signature_length_rejected() {
        let message = ConsensusMessage::new(
            1,
            0,
            0,
            ConsensusMessagePayload::Commit(Commit {
                signature: vec![0u8; 63],
            }),
        );
        let mut writer = BinaryWriter::new();
        assert!(message.serialize(&mut writer).is_err());
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(ConsensusMessage::from_bytes(&[0x99, 0, 0, 0, 0, 0, 0]).is_err());
    }
}
