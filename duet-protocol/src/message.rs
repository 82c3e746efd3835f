//! Peer-to-peer protocol messages and their binary encoding.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::file::{FileChunk, FileMetadata, SharedFileEntry};
use crate::types::FileId;

/// Messages exchanged between two peers over one logical channel.
///
/// Variant order is the wire tag; append new variants at the end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    Hello {
        name: String,
    },
    /// Offer of our public keys, sent first by the acceptor.
    KeyExchange {
        dh_public_key: Vec<u8>,
        signing_public_key: Vec<u8>,
    },
    /// Answer to a `KeyExchange`; never itself answered.
    KeyExchangeReply {
        dh_public_key: Vec<u8>,
        signing_public_key: Vec<u8>,
    },
    Challenge {
        challenge: [u8; 32],
    },
    ChallengeResponse {
        /// Compact 64-byte ECDSA signature.
        signature: Vec<u8>,
    },
    VerificationComplete,
    Disconnected,
    FilesUpdate {
        files: Vec<SharedFileEntry>,
    },
    RequestFile {
        file_id: FileId,
    },
    FileMetadata(FileMetadata),
    FileChunk(FileChunk),
}

impl Message {
    /// Number of known wire tags.
    pub const TAG_COUNT: u32 = 11;

    /// Short name of the message kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Hello { .. } => "hello",
            Message::KeyExchange { .. } => "key_exchange",
            Message::KeyExchangeReply { .. } => "key_exchange_reply",
            Message::Challenge { .. } => "challenge",
            Message::ChallengeResponse { .. } => "challenge_response",
            Message::VerificationComplete => "verification_complete",
            Message::Disconnected => "disconnected",
            Message::FilesUpdate { .. } => "files_update",
            Message::RequestFile { .. } => "request_file",
            Message::FileMetadata(_) => "file_metadata",
            Message::FileChunk(_) => "file_chunk",
        }
    }
}

/// Errors decoding or encoding a wire message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown message tag {0}")]
    UnknownTag(u32),
    #[error("malformed message: {0}")]
    Malformed(postcard::Error),
    #[error("failed to encode message: {0}")]
    Encode(postcard::Error),
}

/// Serialize a `Message` to compact binary via postcard.
pub fn encode_message(msg: &Message) -> Result<Vec<u8>, ProtocolError> {
    postcard::to_allocvec(msg).map_err(ProtocolError::Encode)
}

/// Deserialize a `Message` from postcard bytes.
///
/// The leading varint tag is checked first so that messages from a newer
/// protocol revision are reported as `UnknownTag` rather than as garbage.
pub fn decode_message(data: &[u8]) -> Result<Message, ProtocolError> {
    let (tag, _) = postcard::take_from_bytes::<u32>(data).map_err(ProtocolError::Malformed)?;
    if tag >= Message::TAG_COUNT {
        return Err(ProtocolError::UnknownTag(tag));
    }
    postcard::from_bytes(data).map_err(ProtocolError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::IV_LEN;

    #[test]
    fn key_exchange_roundtrip() {
        let msg = Message::KeyExchange {
            dh_public_key: vec![0x02; 33],
            signing_public_key: vec![0x03; 33],
        };
        let encoded = encode_message(&msg).unwrap();
        assert_eq!(decode_message(&encoded).unwrap(), msg);
    }

    #[test]
    fn encrypted_chunk_roundtrip() {
        let msg = Message::FileChunk(FileChunk {
            file_id: FileId::from("f-1"),
            chunk_index: 2,
            data: vec![9; 100],
            is_last: true,
            encrypted: true,
            iv: Some([7; IV_LEN]),
        });
        let encoded = encode_message(&msg).unwrap();
        assert_eq!(decode_message(&encoded).unwrap(), msg);
    }

    #[test]
    fn unit_variants_encode_to_single_tag_byte() {
        assert_eq!(encode_message(&Message::VerificationComplete).unwrap(), vec![5]);
        assert_eq!(encode_message(&Message::Disconnected).unwrap(), vec![6]);
    }

    #[test]
    fn unknown_tag_is_distinct_error() {
        let err = decode_message(&[42, 0, 0]).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownTag(42)), "got {err:?}");

        let err = decode_message(&[Message::TAG_COUNT as u8]).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownTag(11)), "got {err:?}");
    }

    #[test]
    fn truncated_message_is_malformed() {
        let msg = Message::Hello {
            name: "alice".to_string(),
        };
        let encoded = encode_message(&msg).unwrap();
        let err = decode_message(&encoded[..3]).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)), "got {err:?}");

        let err = decode_message(&[]).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)), "got {err:?}");
    }

    #[test]
    fn message_kind_names() {
        assert_eq!(Message::VerificationComplete.kind(), "verification_complete");
        assert_eq!(
            Message::RequestFile {
                file_id: FileId::from("x")
            }
            .kind(),
            "request_file"
        );
    }
}
