//! Challenge-response authentication over ECDSA secp256k1.

use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, VerifyingKey};

use crate::error::CryptoError;
use crate::keys::{fill_random, KeyPair};

pub const CHALLENGE_LEN: usize = 32;

/// Compact `r || s` signature length.
pub const SIGNATURE_LEN: usize = 64;

/// Fresh random challenge for a peer to sign.
pub fn generate_challenge() -> Result<[u8; CHALLENGE_LEN], CryptoError> {
    let mut challenge = [0u8; CHALLENGE_LEN];
    fill_random(&mut challenge)?;
    Ok(challenge)
}

/// Sign `challenge` (SHA-256 digest, deterministic RFC 6979 nonce).
pub fn sign(challenge: &[u8], signer: &KeyPair) -> [u8; SIGNATURE_LEN] {
    let signature: Signature = signer.signing_key().sign(challenge);
    let mut out = [0u8; SIGNATURE_LEN];
    out.copy_from_slice(&signature.to_bytes());
    out
}

/// Check `signature` over `challenge` against a compressed SEC1 public key.
///
/// Malformed signatures or keys verify as `false` rather than erroring.
pub fn verify(challenge: &[u8], signature: &[u8], signing_public_key: &[u8]) -> bool {
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_sec1_bytes(signing_public_key) else {
        return false;
    };
    key.verify(challenge, &signature).is_ok()
}
