//! AES-256-GCM encryption of individual transfer chunks.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};

use crate::error::CryptoError;
use crate::keys::{fill_random, SessionKey};

/// AES-GCM nonce length in bytes.
pub const IV_LEN: usize = 12;

/// Encrypt one chunk under `key` with a freshly generated IV.
///
/// The returned ciphertext carries the 16-byte GCM tag appended.
pub fn encrypt_chunk(
    plaintext: &[u8],
    key: &SessionKey,
) -> Result<(Vec<u8>, [u8; IV_LEN]), CryptoError> {
    let mut iv = [0u8; IV_LEN];
    fill_random(&mut iv).map_err(|_| CryptoError::EncryptionFailure)?;

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|_| CryptoError::EncryptionFailure)?;
    Ok((ciphertext, iv))
}

/// Decrypt and authenticate one chunk.
pub fn decrypt_chunk(
    ciphertext: &[u8],
    iv: &[u8; IV_LEN],
    key: &SessionKey,
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| CryptoError::AuthenticationFailure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{derive_shared_key, generate_key_agreement_pair};

    fn pair_keys() -> (SessionKey, SessionKey) {
        let a = generate_key_agreement_pair().unwrap();
        let b = generate_key_agreement_pair().unwrap();
        (
            derive_shared_key(&a, &b.public_key_bytes()).unwrap(),
            derive_shared_key(&b, &a.public_key_bytes()).unwrap(),
        )
    }

    #[test]
    fn encrypt_then_decrypt_with_peer_key() {
        let (ours, theirs) = pair_keys();
        let plaintext = b"chunk payload".to_vec();

        let (ciphertext, iv) = encrypt_chunk(&plaintext, &ours).unwrap();
        assert_ne!(ciphertext, plaintext);
        assert_eq!(ciphertext.len(), plaintext.len() + 16);

        assert_eq!(decrypt_chunk(&ciphertext, &iv, &theirs).unwrap(), plaintext);
    }

    #[test]
    fn fresh_iv_per_call() {
        let (key, _) = pair_keys();
        let (c1, iv1) = encrypt_chunk(b"same", &key).unwrap();
        let (c2, iv2) = encrypt_chunk(b"same", &key).unwrap();
        assert_ne!(iv1, iv2);
        assert_ne!(c1, c2);
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let (key, _) = pair_keys();
        let (other, _) = pair_keys();
        let (ciphertext, iv) = encrypt_chunk(b"secret", &key).unwrap();

        let err = decrypt_chunk(&ciphertext, &iv, &other).unwrap_err();
        assert!(matches!(err, CryptoError::AuthenticationFailure));
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let (key, _) = pair_keys();
        let (mut ciphertext, iv) = encrypt_chunk(b"secret", &key).unwrap();
        ciphertext[0] ^= 0x01;

        let err = decrypt_chunk(&ciphertext, &iv, &key).unwrap_err();
        assert!(matches!(err, CryptoError::AuthenticationFailure));
    }

    #[test]
    fn empty_plaintext_roundtrips() {
        let (key, _) = pair_keys();
        let (ciphertext, iv) = encrypt_chunk(&[], &key).unwrap();
        assert!(decrypt_chunk(&ciphertext, &iv, &key).unwrap().is_empty());
    }
}
