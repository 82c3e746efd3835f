//! Shared-file set, chunked transfer, reassembly, and download storage.

pub mod error;
pub mod shared;
pub mod store;
pub mod transfer;

pub use error::TransferError;
pub use shared::{SharedFile, SharedFiles};
pub use store::DownloadDir;
pub use transfer::{
    ChunkOutcome, CompletedFile, FileReceiver, FileSender, TransferMetrics, MAX_FILE_SIZE,
};
