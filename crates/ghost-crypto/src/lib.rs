/// Ghost Crypto Library
///
/// Server-side message sealing with a single process-wide AES-256-GCM key.
/// Every message body is stored and relayed as an `EncryptedEnvelope`
/// (128-bit nonce, 128-bit tag, ciphertext); plaintext only exists for the
/// duration of a request.

pub mod encrypt;
pub mod envelope;
pub mod keys;

pub use encrypt::{Codec, CodecError};
pub use envelope::EncryptedEnvelope;
pub use keys::{EncryptionKey, KeyError};
