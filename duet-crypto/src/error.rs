//! Error taxonomy for cryptographic operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// No usable secure random source, or key generation could not complete.
    #[error("crypto initialisation failed: {0}")]
    InitFailure(String),

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("key derivation failed")]
    KeyDerivation,

    #[error("encryption failed")]
    EncryptionFailure,

    /// The GCM tag did not verify: tampered ciphertext or wrong key.
    #[error("authentication failure")]
    AuthenticationFailure,

    #[error("invalid hex: {0}")]
    InvalidHex(#[from] data_encoding::DecodeError),
}
