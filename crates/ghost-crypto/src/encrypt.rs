use std::fmt;

use aes_gcm::{
    AesGcm, Key, Nonce, Tag,
    aead::{AeadInPlace, KeyInit, OsRng, consts::U16, rand_core::RngCore},
    aes::Aes256,
};
use thiserror::Error;

use crate::envelope::{EncryptedEnvelope, NONCE_LEN, TAG_LEN};
use crate::keys::EncryptionKey;

/// AES-256-GCM with a 128-bit nonce.
type Aes256Gcm128 = AesGcm<Aes256, U16>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The envelope could not be parsed: missing, truncated or mis-encoded fields.
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// The tag did not verify: tampered data or a different key.
    #[error("envelope failed authentication")]
    Unauthenticated,

    #[error("encryption failed")]
    Encryption,
}

/// Seals and opens message bodies under the configured key.
#[derive(Clone)]
pub struct Codec {
    cipher: Aes256Gcm128,
}

impl Codec {
    pub fn new(key: &EncryptionKey) -> Self {
        let cipher = Aes256Gcm128::new(Key::<Aes256Gcm128>::from_slice(key.as_bytes()));
        Self { cipher }
    }

    /// Encrypt a plaintext under a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedEnvelope, CodecError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let mut buffer = plaintext.to_vec();
        let tag = self
            .cipher
            .encrypt_in_place_detached(Nonce::<U16>::from_slice(&nonce), b"", &mut buffer)
            .map_err(|_| CodecError::Encryption)?;

        let mut tag_bytes = [0u8; TAG_LEN];
        tag_bytes.copy_from_slice(tag.as_slice());

        Ok(EncryptedEnvelope {
            nonce,
            tag: tag_bytes,
            ciphertext: buffer,
        })
    }

    /// Verify and decrypt. No plaintext is released unless the tag verifies.
    pub fn decrypt(&self, envelope: &EncryptedEnvelope) -> Result<Vec<u8>, CodecError> {
        let mut buffer = envelope.ciphertext.clone();
        self.cipher
            .decrypt_in_place_detached(
                Nonce::<U16>::from_slice(&envelope.nonce),
                b"",
                &mut buffer,
                Tag::from_slice(&envelope.tag),
            )
            .map_err(|_| CodecError::Unauthenticated)?;
        Ok(buffer)
    }

    /// Encrypt straight to the flat string form used for storage.
    pub fn seal(&self, plaintext: &[u8]) -> Result<String, CodecError> {
        Ok(self.encrypt(plaintext)?.to_string())
    }

    /// Parse the flat string form and decrypt it.
    pub fn open(&self, sealed: &str) -> Result<Vec<u8>, CodecError> {
        let envelope: EncryptedEnvelope = sealed.parse()?;
        self.decrypt(&envelope)
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec").finish_non_exhaustive()
    }
}
