pub(crate) mod ssh;

use std::fmt;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use crate::error::{AuditError, Result};

pub use ssh::{KeyObject, NativeKey, WrappedKey};

/// Encrypted-at-rest secret as exported by the data-access layer.
///
/// The ciphertext is base64 and `digest` is the hex SHA-256 of the
/// plaintext, so a rotated key or truncated column shows up as a digest
/// mismatch rather than silently yielding garbage.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SealedValue {
    #[serde(default)]
    pub ciphertext: Option<String>,
    #[serde(default)]
    pub digest: Option<String>,
}

impl SealedValue {
    pub fn seal(plaintext: &str) -> Self {
        Self {
            ciphertext: Some(STANDARD.encode(plaintext)),
            digest: Some(sha256_hex(plaintext.as_bytes())),
        }
    }

    pub fn reveal(&self) -> Result<Revealed> {
        let ciphertext = self
            .ciphertext
            .as_deref()
            .ok_or_else(|| AuditError::Decryption("value is missing".into()))?;

        let bytes = STANDARD
            .decode(ciphertext.trim())
            .map_err(|e| AuditError::Decryption(format!("malformed ciphertext ({e})")))?;

        if let Some(expected) = &self.digest {
            if !sha256_hex(&bytes).eq_ignore_ascii_case(expected.trim()) {
                return Err(AuditError::Decryption("integrity digest mismatch".into()));
            }
        }

        String::from_utf8(bytes)
            .map(Revealed)
            .map_err(|_| AuditError::Decryption("value is not valid UTF-8".into()))
    }
}

impl fmt::Debug for SealedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedValue")
            .field("ciphertext", &self.ciphertext.as_ref().map(|_| "[sealed]"))
            .field("digest", &self.digest)
            .finish()
    }
}

/// Plaintext secret. Never rendered by `Debug` or `Display`.
pub struct Revealed(String);

impl Revealed {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Revealed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

impl fmt::Display for Revealed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
