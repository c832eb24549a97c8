//! Builder authentication tokens.
//!
//! Only the SHA-256 digest of a token is persisted. The plaintext is handed
//! to the operator once, when the builder is registered or its token is
//! regenerated, and is then presented by the builder on every request.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Plaintext bearer token presented by a builder.
#[derive(Clone, PartialEq, Eq)]
pub struct BuilderToken(String);

impl BuilderToken {
    /// Generates a fresh random token of 64 hexadecimal characters.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!(
            "{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple()
        ))
    }

    /// Wraps a token received over the wire.
    ///
    /// Surrounding whitespace is dropped; no other validation happens because
    /// an unknown token is simply not found.
    #[must_use]
    pub fn from_raw(value: &str) -> Self {
        Self(value.trim().to_owned())
    }

    /// Returns the token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Computes the digest stored for this token.
    #[must_use]
    pub fn digest(&self) -> TokenDigest {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        TokenDigest(format!("{:x}", hasher.finalize()))
    }
}

impl fmt::Debug for BuilderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BuilderToken(<redacted>)")
    }
}

/// Hex-encoded SHA-256 digest of a builder token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenDigest(String);

impl TokenDigest {
    /// Reconstructs a digest read back from storage.
    #[must_use]
    pub const fn from_persisted(value: String) -> Self {
        Self(value)
    }

    /// Returns the digest as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
