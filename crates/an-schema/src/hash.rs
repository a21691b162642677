//! SHA-256 digest newtype.

use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Sentinel value left in formulas whose checksum has not been filled in yet.
pub const PLACEHOLDER_SHA256: &str = "REPLACE_WITH_ACTUAL_SHA256";

/// Errors produced when validating a digest string.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DigestError {
    /// The digest is empty or still the authoring placeholder.
    #[error("checksum is a placeholder, run `an hash` on the archive and fill it in")]
    Placeholder,

    /// The hex portion is not exactly 64 characters long.
    #[error("invalid SHA256 digest: expected 64 hex characters, got {0}")]
    InvalidLength(usize),

    /// The digest contains characters outside `[0-9a-f]`.
    #[error("invalid SHA256 digest: contains non-hex characters in '{0}'")]
    InvalidHex(String),
}

/// A validated SHA-256 digest (64 lowercase hex characters).
///
/// Validated at construction and at deserialization time, so an invalid hex
/// string can never propagate into the fetch pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Create a new digest, validating the input.
    ///
    /// Accepts strings with or without a `sha256:` prefix.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::Placeholder`] for the empty string or the
    /// authoring sentinel, and the other variants for malformed hex.
    pub fn parse(s: &str) -> Result<Self, DigestError> {
        let hex = s.strip_prefix("sha256:").unwrap_or(s);

        if hex.is_empty() || hex == PLACEHOLDER_SHA256 {
            return Err(DigestError::Placeholder);
        }
        if hex.len() != 64 {
            return Err(DigestError::InvalidLength(hex.len()));
        }
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DigestError::InvalidHex(hex.to_string()));
        }

        Ok(Self(hex.to_lowercase()))
    }

    /// Compute the digest of in-memory data.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hex::encode(hasher.finalize()))
    }

    /// Compute the digest of a file, streaming it in 8 KiB blocks.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read.
    pub fn compute_file(path: &std::path::Path) -> std::io::Result<Self> {
        use std::io::Read;

        let mut hasher = Sha256::new();
        let mut file = std::fs::File::open(path)?;
        let mut buffer = [0u8; 8192];
        loop {
            let count = file.read(&mut buffer)?;
            if count == 0 {
                break;
            }
            hasher.update(&buffer[..count]);
        }
        Ok(Self(hex::encode(hasher.finalize())))
    }

    /// Get the digest as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Sha256Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Sha256Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_placeholder_sentinel() {
        assert_eq!(
            Sha256Digest::parse(PLACEHOLDER_SHA256),
            Err(DigestError::Placeholder)
        );
        assert_eq!(Sha256Digest::parse(""), Err(DigestError::Placeholder));
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(
            Sha256Digest::parse("abc123"),
            Err(DigestError::InvalidLength(6))
        );
    }

    #[test]
    fn rejects_non_hex() {
        let s = "g".repeat(64);
        assert!(matches!(
            Sha256Digest::parse(&s),
            Err(DigestError::InvalidHex(_))
        ));
    }

    #[test]
    fn accepts_prefixed_and_lowercases() {
        let upper = format!("sha256:{}", "A".repeat(64));
        let digest = Sha256Digest::parse(&upper).unwrap();
        assert_eq!(digest.as_str(), "a".repeat(64));
    }

    #[test]
    fn compute_matches_known_vector() {
        // SHA-256 of the empty string
        assert_eq!(
            Sha256Digest::compute(b"").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn compute_deterministic() {
        assert_eq!(
            Sha256Digest::compute(b"an"),
            Sha256Digest::compute(b"an")
        );
    }
}
