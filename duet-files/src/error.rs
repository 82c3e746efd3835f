//! Transfer failures that abort a single file's reassembly.

use duet_protocol::FileId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    /// An encrypted chunk could not be decrypted. Nothing of the file is kept.
    #[error("decryption failed for {file_id} chunk {chunk_index}: {reason}")]
    DecryptionFailure {
        file_id: FileId,
        chunk_index: u32,
        reason: String,
    },

    #[error("{file_id}: reassembled {actual} bytes, metadata announced {expected}")]
    SizeMismatch {
        file_id: FileId,
        expected: u64,
        actual: u64,
    },

    #[error("{file_id}: {total_chunks} chunks announced for {size} bytes")]
    InconsistentMetadata {
        file_id: FileId,
        size: u64,
        total_chunks: u32,
    },

    #[error("{file_id}: announced {size} bytes, limit is {limit}")]
    TooLarge { file_id: FileId, size: u64, limit: u64 },
}

impl TransferError {
    pub fn file_id(&self) -> &FileId {
        match self {
            TransferError::DecryptionFailure { file_id, .. }
            | TransferError::SizeMismatch { file_id, .. }
            | TransferError::InconsistentMetadata { file_id, .. }
            | TransferError::TooLarge { file_id, .. } => file_id,
        }
    }
}
