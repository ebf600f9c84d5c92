use std::fmt;

use aes_gcm::aead::OsRng;
use aes_gcm::aead::rand_core::RngCore;
use thiserror::Error;

/// Key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("encryption key is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("encryption key must be exactly {KEY_LEN} bytes, got {0}")]
    InvalidLength(usize),
}

/// The process-wide 256-bit message key.
///
/// Loaded once at startup and handed to the [`Codec`](crate::Codec).
/// `Debug` never prints the key material.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Decode a key from its 64-character hex form.
    pub fn from_hex(encoded: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(encoded.trim())?;
        let len = bytes.len();
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| KeyError::InvalidLength(len))?;
        Ok(Self(key))
    }

    /// Generate a random key from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let key = EncryptionKey::generate();
        let decoded = EncryptionKey::from_hex(&key.to_hex()).unwrap();
        assert_eq!(key, decoded);
    }

    #[test]
    fn short_key_rejected() {
        let err = EncryptionKey::from_hex(&"ab".repeat(31)).unwrap_err();
        assert!(matches!(err, KeyError::InvalidLength(31)));
    }

    #[test]
    fn long_key_rejected() {
        let err = EncryptionKey::from_hex(&"ab".repeat(33)).unwrap_err();
        assert!(matches!(err, KeyError::InvalidLength(33)));
    }

    #[test]
    fn non_hex_rejected() {
        let err = EncryptionKey::from_hex(&"zz".repeat(32)).unwrap_err();
        assert!(matches!(err, KeyError::InvalidHex(_)));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let key = EncryptionKey::generate();
        let padded = format!("  {}\n", key.to_hex());
        assert_eq!(EncryptionKey::from_hex(&padded).unwrap(), key);
    }

    #[test]
    fn debug_is_redacted() {
        let key = EncryptionKey::from_bytes([0xAB; KEY_LEN]);
        let debug = format!("{key:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("ab"));
    }
}
