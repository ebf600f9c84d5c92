use std::fmt;
use std::str::FromStr;

use crate::encrypt::CodecError;

/// Nonce width in bytes (128-bit).
pub const NONCE_LEN: usize = 16;

/// Authentication tag width in bytes (128-bit).
pub const TAG_LEN: usize = 16;

/// Field separator of the flat string form. Never produced by hex encoding.
const SEPARATOR: char = ':';

/// One sealed message body.
///
/// String form: `hex(nonce):hex(tag):hex(ciphertext)`.
/// Binary form: `nonce(16) || tag(16) || ciphertext`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    pub nonce: [u8; NONCE_LEN],
    pub tag: [u8; TAG_LEN],
    pub ciphertext: Vec<u8>,
}

impl EncryptedEnvelope {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_LEN + TAG_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.tag);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, CodecError> {
        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(CodecError::Malformed(format!(
                "envelope is {} bytes, need at least {}",
                data.len(),
                NONCE_LEN + TAG_LEN
            )));
        }
        let (nonce, rest) = data.split_at(NONCE_LEN);
        let (tag, ciphertext) = rest.split_at(TAG_LEN);

        Ok(Self {
            nonce: fixed(nonce, "nonce")?,
            tag: fixed(tag, "tag")?,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

impl fmt::Display for EncryptedEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            hex::encode(self.nonce),
            hex::encode(self.tag),
            hex::encode(&self.ciphertext)
        )
    }
}

impl FromStr for EncryptedEnvelope {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(SEPARATOR);
        let (Some(nonce), Some(tag), Some(ciphertext), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(CodecError::Malformed(
                "expected exactly three ':'-separated fields".into(),
            ));
        };

        let nonce = decode_field(nonce, "nonce")?;
        let tag = decode_field(tag, "tag")?;
        let ciphertext = decode_field(ciphertext, "ciphertext")?;

        Ok(Self {
            nonce: fixed(&nonce, "nonce")?,
            tag: fixed(&tag, "tag")?,
            ciphertext,
        })
    }
}

fn decode_field(field: &str, name: &str) -> Result<Vec<u8>, CodecError> {
    hex::decode(field).map_err(|e| CodecError::Malformed(format!("{name}: {e}")))
}

fn fixed<const N: usize>(bytes: &[u8], name: &str) -> Result<[u8; N], CodecError> {
    bytes.try_into().map_err(|_| {
        CodecError::Malformed(format!("{name} is {} bytes, expected {N}", bytes.len()))
    })
}
