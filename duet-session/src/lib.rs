//! Secure peer sessions for duet.
//!
//! A [`Session`] owns one local identity and drives, per remote peer, the
//! authenticated handshake and the encrypted file exchange that follows it.

pub mod handshake;
pub mod registry;
pub mod session;

pub use handshake::{Handshake, HandshakeError, HandshakeStep, LocalIdentity};
pub use registry::{ConnectionStatus, PeerRegistry, PeerSession, RegistryError};
pub use session::{Session, SessionConfig, SessionError, SessionEvent};
