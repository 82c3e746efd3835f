//! File sharing protocol types.

use serde::{Deserialize, Serialize};

use crate::types::FileId;

/// Size of a single transfer chunk: 64KB. The final chunk of a file may be shorter.
pub const CHUNK_SIZE: usize = 65_536;

/// AES-GCM initialisation vector length in bytes.
pub const IV_LEN: usize = 12;

/// Number of chunks needed to carry `size` bytes, or `None` when the count
/// does not fit the wire's `u32` chunk index.
pub fn chunk_count(size: u64) -> Option<u32> {
    u32::try_from(size.div_ceil(CHUNK_SIZE as u64)).ok()
}

/// Byte range of chunk `index` within a file of `size` bytes.
///
/// Returns `None` when the index lies past the end of the file.
pub fn chunk_range(index: u32, size: u64) -> Option<std::ops::Range<usize>> {
    let start = index as u64 * CHUNK_SIZE as u64;
    if start >= size {
        return None;
    }
    let end = std::cmp::min(start + CHUNK_SIZE as u64, size);
    Some(start as usize..end as usize)
}

/// One entry of a peer's manifest of offered files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedFileEntry {
    pub id: FileId,
    pub name: String,
    pub size: u64,
}

/// Announces an upcoming chunked transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub file_id: FileId,
    pub name: String,
    pub size: u64,
    pub total_chunks: u32,
    /// Whether the chunks that follow are encrypted with the session key.
    pub encrypted: bool,
}

/// A single chunk of file data, cleartext or AES-GCM ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChunk {
    pub file_id: FileId,
    pub chunk_index: u32,
    pub data: Vec<u8>,
    pub is_last: bool,
    pub encrypted: bool,
    /// Present when `encrypted` is set.
    pub iv: Option<[u8; IV_LEN]>,
}
