//! Ephemeral secp256k1 key pairs and shared-key derivation.

use std::fmt;

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::OsRng;
use hkdf::Hkdf;
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey};
use sha2::Sha256;

use crate::error::CryptoError;
use crate::hex;

/// Length of a compressed SEC1 public key.
pub const PUBLIC_KEY_LEN: usize = 33;

/// Length of the derived symmetric key.
pub const SHARED_KEY_LEN: usize = 32;

const HKDF_INFO: &[u8] = b"duet-file-transfer-v1";

/// A scalar of all zeroes or one above the curve order is rejected; retry a
/// few times before concluding the random source is broken.
const MAX_KEYGEN_ATTEMPTS: usize = 8;

/// Fill `buf` from the OS CSPRNG, failing loudly if it is unavailable.
pub(crate) fn fill_random(buf: &mut [u8]) -> Result<(), CryptoError> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| CryptoError::InitFailure(e.to_string()))
}

/// A secp256k1 key pair. Used either for key agreement or for signing,
/// never both.
#[derive(Clone)]
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a fresh key pair from the OS random source.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut bytes = [0u8; 32];
        for _ in 0..MAX_KEYGEN_ATTEMPTS {
            fill_random(&mut bytes)?;
            if let Ok(pair) = Self::from_secret_bytes(&bytes) {
                return Ok(pair);
            }
        }
        Err(CryptoError::InitFailure(
            "random source produced no valid scalar".to_string(),
        ))
    }

    /// Rebuild a key pair from a raw 32-byte scalar.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let secret = SecretKey::from_slice(bytes)
            .map_err(|_| CryptoError::InitFailure("invalid secret scalar".to_string()))?;
        let public = secret.public_key();
        Ok(Self { secret, public })
    }

    /// Compressed SEC1 encoding of the public key (33 bytes).
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.public.to_encoded_point(true).as_bytes().to_vec()
    }

    /// Short hex fingerprint of the public key, safe to log.
    pub fn fingerprint(&self) -> String {
        hex::fingerprint(&self.public_key_bytes())
    }

    pub(crate) fn signing_key(&self) -> SigningKey {
        SigningKey::from(&self.secret)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.fingerprint())
            .finish_non_exhaustive()
    }
}

/// Generate the ephemeral pair used for ECDH.
pub fn generate_key_agreement_pair() -> Result<KeyPair, CryptoError> {
    KeyPair::generate()
}

/// Generate the ephemeral pair used for challenge signatures.
pub fn generate_signing_pair() -> Result<KeyPair, CryptoError> {
    KeyPair::generate()
}

/// Check that `bytes` is a valid SEC1-encoded secp256k1 public key.
pub fn validate_public_key(bytes: &[u8]) -> Result<(), CryptoError> {
    PublicKey::from_sec1_bytes(bytes)
        .map(|_| ())
        .map_err(|_| CryptoError::InvalidPublicKey)
}

/// 256-bit symmetric key shared by exactly one pair of peers.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey([u8; SHARED_KEY_LEN]);

impl SessionKey {
    pub fn from_bytes(bytes: [u8; SHARED_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SHARED_KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey({})", hex::fingerprint(&self.0))
    }
}

/// Derive the session key from our agreement pair and the peer's public key.
///
/// ECDH over secp256k1 (x-coordinate of the shared point), then HKDF-SHA256
/// with no salt and a fixed info string. Both sides obtain the same bytes.
pub fn derive_shared_key(local: &KeyPair, remote_public: &[u8]) -> Result<SessionKey, CryptoError> {
    let remote = PublicKey::from_sec1_bytes(remote_public).map_err(|_| CryptoError::InvalidPublicKey)?;
    let shared = k256::ecdh::diffie_hellman(local.secret.to_nonzero_scalar(), remote.as_affine());

    let hkdf = Hkdf::<Sha256>::new(None, shared.raw_secret_bytes());
    let mut key = [0u8; SHARED_KEY_LEN];
    hkdf.expand(HKDF_INFO, &mut key)
        .map_err(|_| CryptoError::KeyDerivation)?;

    Ok(SessionKey(key))
}
