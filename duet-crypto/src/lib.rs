//! Cryptographic primitives for the duet handshake and chunk transfer.
//!
//! - secp256k1 ECDH + HKDF-SHA256 for the per-session symmetric key
//! - ECDSA (secp256k1, SHA-256, compact 64-byte form) for challenge-response
//! - AES-256-GCM with a fresh random 96-bit IV per chunk
//!
//! Everything here is stateless. Key pairs live only as long as the session
//! that generated them.

pub mod auth;
pub mod cipher;
pub mod error;
pub mod hex;
pub mod keys;

pub use auth::{generate_challenge, sign, verify, CHALLENGE_LEN, SIGNATURE_LEN};
pub use cipher::{decrypt_chunk, encrypt_chunk, IV_LEN};
pub use error::CryptoError;
pub use keys::{
    derive_shared_key, generate_key_agreement_pair, generate_signing_pair, validate_public_key, KeyPair,
    SessionKey, PUBLIC_KEY_LEN,
};
