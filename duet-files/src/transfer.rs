//! Chunked file transfer: splitting and sending on one side, reassembly on
//! the other.
//!
//! Files travel as one `FileMetadata` message followed by `FileChunk`
//! messages of [`CHUNK_SIZE`] bytes (the last may be shorter). When the
//! sender holds a session key for the peer, every chunk is encrypted with a
//! fresh IV. The receiver accepts chunks in any order, ignores duplicates,
//! and delivers the file once every index is populated.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use duet_crypto::{decrypt_chunk, encrypt_chunk, SessionKey};
use duet_protocol::file::{chunk_count, chunk_range};
use duet_protocol::{FileChunk, FileId, FileMetadata, Message, PeerId, CHUNK_SIZE};
use sha2::{Digest, Sha256};

use crate::error::TransferError;
use crate::shared::SharedFile;

/// Largest file the receiver will reassemble. Files are held in memory.
pub const MAX_FILE_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// Transfer progress metrics.
#[derive(Debug, Default)]
pub struct TransferMetrics {
    pub bytes_transferred: AtomicU64,
    pub chunks_transferred: AtomicU64,
    pub files_completed: AtomicU64,
}

impl TransferMetrics {
    fn record_chunk(&self, bytes: usize) {
        self.bytes_transferred
            .fetch_add(bytes as u64, Ordering::Relaxed);
        self.chunks_transferred.fetch_add(1, Ordering::Relaxed);
    }

    pub fn chunks(&self) -> u64 {
        self.chunks_transferred.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes_transferred.load(Ordering::Relaxed)
    }

    pub fn files(&self) -> u64 {
        self.files_completed.load(Ordering::Relaxed)
    }
}

fn sha256_hex(data: &[u8]) -> String {
    data_encoding::HEXLOWER.encode(&Sha256::digest(data))
}

/// Splits shared files into protocol messages.
#[derive(Clone)]
pub struct FileSender {
    chunk_delay: Duration,
    metrics: Arc<TransferMetrics>,
}

impl FileSender {
    /// `chunk_delay` is slept between consecutive chunk sends.
    pub fn new(chunk_delay: Duration) -> Self {
        Self {
            chunk_delay,
            metrics: Arc::default(),
        }
    }

    pub fn metrics(&self) -> &TransferMetrics {
        &self.metrics
    }

    /// Send `file` as metadata followed by its chunks, in index order.
    ///
    /// `emit` hands each message to the transport; its first error stops the
    /// send and is returned. Returns the number of chunks sent. Dropping the
    /// future between chunks cancels the transfer.
    pub async fn send_file<F>(
        &self,
        file: &SharedFile,
        key: Option<&SessionKey>,
        mut emit: F,
    ) -> Result<u32>
    where
        F: FnMut(Message) -> Result<()>,
    {
        let size = file.size();
        let total_chunks = chunk_count(size)
            .with_context(|| format!("file {} is too large to send ({size} bytes)", file.id()))?;

        tracing::info!(
            file_id = %file.id(),
            file_name = %file.name(),
            file_size = size,
            total_chunks,
            encrypted = key.is_some(),
            sha256 = %sha256_hex(&file.data),
            "sending file"
        );

        emit(Message::FileMetadata(FileMetadata {
            file_id: file.id().clone(),
            name: file.name().to_string(),
            size,
            total_chunks,
            encrypted: key.is_some(),
        }))?;

        for index in 0..total_chunks {
            if index > 0 && !self.chunk_delay.is_zero() {
                tokio::time::sleep(self.chunk_delay).await;
            }

            let Some(range) = chunk_range(index, size) else {
                break;
            };
            let plaintext = &file.data[range];
            let chunk_len = plaintext.len();

            let (data, encrypted, iv) = match key {
                Some(key) => match encrypt_chunk(plaintext, key) {
                    Ok((ciphertext, iv)) => (ciphertext, true, Some(iv)),
                    Err(e) => {
                        tracing::warn!(
                            file_id = %file.id(),
                            chunk_index = index,
                            error = %e,
                            "chunk encryption failed, sending cleartext"
                        );
                        (plaintext.to_vec(), false, None)
                    }
                },
                None => (plaintext.to_vec(), false, None),
            };

            emit(Message::FileChunk(FileChunk {
                file_id: file.id().clone(),
                chunk_index: index,
                data,
                is_last: index + 1 == total_chunks,
                encrypted,
                iv,
            }))?;

            self.metrics.record_chunk(chunk_len);
            tracing::debug!(file_id = %file.id(), chunk_index = index, chunk_size = chunk_len, "sent chunk");
        }

        self.metrics.files_completed.fetch_add(1, Ordering::Relaxed);
        tracing::info!(file_id = %file.id(), chunks = total_chunks, "file send complete");
        Ok(total_chunks)
    }
}

/// A fully reassembled file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedFile {
    pub file_id: FileId,
    pub name: String,
    pub data: Vec<u8>,
}

/// Result of feeding one chunk to the receiver.
#[derive(Debug, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Chunk for an unknown transfer or out-of-range index; dropped.
    Ignored,
    /// Index already populated; nothing changed.
    Duplicate,
    /// Stored; carries the new progress percentage.
    Progress(u8),
    /// Last missing chunk arrived; the buffer has been released.
    Complete(CompletedFile),
}

/// Receive-side state for one in-flight file.
///
/// Slots are filled as chunks arrive; nothing is reserved up front, so memory
/// tracks what the peer actually sent.
#[derive(Debug)]
pub struct TransferBuffer {
    file_id: FileId,
    name: String,
    size: u64,
    total_chunks: u32,
    slots: BTreeMap<u32, Vec<u8>>,
}

impl TransferBuffer {
    fn new(meta: &FileMetadata) -> Self {
        Self {
            file_id: meta.file_id.clone(),
            name: meta.name.clone(),
            size: meta.size,
            total_chunks: meta.total_chunks,
            slots: BTreeMap::new(),
        }
    }

    fn populated(&self) -> u32 {
        self.slots.len() as u32
    }

    pub fn is_complete(&self) -> bool {
        self.populated() == self.total_chunks
    }

    /// Percentage of populated slots, 0–100.
    pub fn progress(&self) -> u8 {
        if self.total_chunks == 0 {
            return 100;
        }
        (self.populated() as u64 * 100 / self.total_chunks as u64) as u8
    }

    fn assemble(self) -> Result<CompletedFile, TransferError> {
        let data: Vec<u8> = self.slots.into_values().flatten().collect();
        if data.len() as u64 != self.size {
            return Err(TransferError::SizeMismatch {
                file_id: self.file_id,
                expected: self.size,
                actual: data.len() as u64,
            });
        }
        Ok(CompletedFile {
            file_id: self.file_id,
            name: self.name,
            data,
        })
    }
}

/// Reassembles incoming files, one buffer per (sender, file).
#[derive(Default)]
pub struct FileReceiver {
    buffers: HashMap<(PeerId, FileId), TransferBuffer>,
    metrics: Arc<TransferMetrics>,
}

impl FileReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metrics(&self) -> &TransferMetrics {
        &self.metrics
    }

    /// Start a transfer. A zero-byte file completes immediately.
    ///
    /// Metadata for a transfer already in flight restarts it.
    pub fn on_metadata(
        &mut self,
        peer: &PeerId,
        meta: &FileMetadata,
    ) -> Result<Option<CompletedFile>, TransferError> {
        if chunk_count(meta.size) != Some(meta.total_chunks) {
            return Err(TransferError::InconsistentMetadata {
                file_id: meta.file_id.clone(),
                size: meta.size,
                total_chunks: meta.total_chunks,
            });
        }
        if meta.size > MAX_FILE_SIZE {
            return Err(TransferError::TooLarge {
                file_id: meta.file_id.clone(),
                size: meta.size,
                limit: MAX_FILE_SIZE,
            });
        }

        tracing::info!(
            peer = %peer,
            file_id = %meta.file_id,
            file_name = %meta.name,
            file_size = meta.size,
            total_chunks = meta.total_chunks,
            encrypted = meta.encrypted,
            "receiving file"
        );

        let buffer = TransferBuffer::new(meta);
        if buffer.is_complete() {
            self.metrics.files_completed.fetch_add(1, Ordering::Relaxed);
            return buffer.assemble().map(Some);
        }

        let key = (peer.clone(), meta.file_id.clone());
        if self.buffers.insert(key, buffer).is_some() {
            tracing::warn!(peer = %peer, file_id = %meta.file_id, "restarting transfer already in flight");
        }
        Ok(None)
    }

    /// Store one chunk, decrypting it with `key` when it is marked encrypted.
    ///
    /// A decryption failure or size mismatch releases the buffer; the file is
    /// never delivered.
    pub fn on_chunk(
        &mut self,
        peer: &PeerId,
        chunk: FileChunk,
        key: Option<&SessionKey>,
    ) -> Result<ChunkOutcome, TransferError> {
        let buffer_key = (peer.clone(), chunk.file_id.clone());
        let Some(buffer) = self.buffers.get_mut(&buffer_key) else {
            tracing::warn!(peer = %peer, file_id = %chunk.file_id, "chunk for unknown transfer, dropping");
            return Ok(ChunkOutcome::Ignored);
        };

        let index = chunk.chunk_index;
        if index >= buffer.total_chunks {
            tracing::warn!(
                peer = %peer,
                file_id = %chunk.file_id,
                chunk_index = index,
                total_chunks = buffer.total_chunks,
                "chunk index out of range, dropping"
            );
            return Ok(ChunkOutcome::Ignored);
        }
        if buffer.slots.contains_key(&index) {
            tracing::debug!(file_id = %chunk.file_id, chunk_index = chunk.chunk_index, "duplicate chunk");
            return Ok(ChunkOutcome::Duplicate);
        }

        let data = if chunk.encrypted {
            let decrypted = match (key, chunk.iv.as_ref()) {
                (Some(key), Some(iv)) => {
                    decrypt_chunk(&chunk.data, iv, key).map_err(|e| e.to_string())
                }
                (None, _) => Err("no session key for peer".to_string()),
                (_, None) => Err("encrypted chunk without iv".to_string()),
            };
            match decrypted {
                Ok(plaintext) => plaintext,
                Err(reason) => {
                    self.buffers.remove(&buffer_key);
                    tracing::warn!(
                        peer = %peer,
                        file_id = %chunk.file_id,
                        chunk_index = chunk.chunk_index,
                        %reason,
                        "decryption failed, aborting transfer"
                    );
                    return Err(TransferError::DecryptionFailure {
                        file_id: chunk.file_id,
                        chunk_index: chunk.chunk_index,
                        reason,
                    });
                }
            }
        } else {
            chunk.data
        };

        self.metrics.record_chunk(data.len());
        buffer.slots.insert(index, data);
        tracing::debug!(
            file_id = %chunk.file_id,
            chunk_index = index,
            populated = buffer.populated(),
            total_chunks = buffer.total_chunks,
            "stored chunk"
        );

        if !buffer.is_complete() {
            return Ok(ChunkOutcome::Progress(buffer.progress()));
        }

        let Some(buffer) = self.buffers.remove(&buffer_key) else {
            return Ok(ChunkOutcome::Ignored);
        };
        let completed = buffer.assemble()?;
        self.metrics.files_completed.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            peer = %peer,
            file_id = %completed.file_id,
            file_name = %completed.name,
            file_size = completed.data.len(),
            sha256 = %sha256_hex(&completed.data),
            "file receive complete"
        );
        Ok(ChunkOutcome::Complete(completed))
    }

    /// Drop every buffer from `peer`, returning the abandoned file ids.
    pub fn discard_peer(&mut self, peer: &PeerId) -> Vec<FileId> {
        let abandoned: Vec<FileId> = self
            .buffers
            .keys()
            .filter(|(p, _)| p == peer)
            .map(|(_, file_id)| file_id.clone())
            .collect();
        for file_id in &abandoned {
            self.buffers.remove(&(peer.clone(), file_id.clone()));
            tracing::info!(peer = %peer, file_id = %file_id, "abandoned partial transfer");
        }
        abandoned
    }

    pub fn progress(&self, peer: &PeerId, file_id: &FileId) -> Option<u8> {
        self.buffers
            .get(&(peer.clone(), file_id.clone()))
            .map(TransferBuffer::progress)
    }

    pub fn in_flight(&self) -> usize {
        self.buffers.len()
    }
}
