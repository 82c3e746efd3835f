//! Hex helpers for logging and persisting key material.

use data_encoding::{HEXLOWER, HEXLOWER_PERMISSIVE};
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

pub fn to_hex(bytes: &[u8]) -> String {
    HEXLOWER.encode(bytes)
}

/// Parse hex, accepting either case.
pub fn from_hex(text: &str) -> Result<Vec<u8>, CryptoError> {
    Ok(HEXLOWER_PERMISSIVE.decode(text.trim().as_bytes())?)
}

/// First 8 hex characters of the SHA-256 of `bytes`.
pub fn fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    HEXLOWER.encode(&digest[..4])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let bytes = vec![0x00, 0x0f, 0xab, 0xff];
        let text = to_hex(&bytes);
        assert_eq!(text, "000fabff");
        assert_eq!(from_hex(&text).unwrap(), bytes);
        assert_eq!(from_hex("000FABFF").unwrap(), bytes);
    }

    #[test]
    fn invalid_hex_is_rejected() {
        assert!(matches!(from_hex("xyz"), Err(CryptoError::InvalidHex(_))));
        assert!(from_hex("abc").is_err());
    }

    #[test]
    fn fingerprint_is_short_and_stable() {
        let fp = fingerprint(b"key");
        assert_eq!(fp.len(), 8);
        assert_eq!(fp, fingerprint(b"key"));
        assert_ne!(fp, fingerprint(b"other"));
    }
}
