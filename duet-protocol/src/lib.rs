//! Shared identifiers, wire messages, and file manifest types for duet.

pub mod file;
pub mod message;
pub mod types;

pub use file::{FileChunk, FileMetadata, SharedFileEntry, CHUNK_SIZE};
pub use message::{decode_message, encode_message, Message, ProtocolError};
pub use types::{FileId, PeerId};
