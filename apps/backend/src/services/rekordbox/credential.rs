//! Connection parameters for a Rekordbox source.

use std::path::{Path, PathBuf};

use super::SourceError;

/// Length of the hex-encoded SQLCipher raw key.
const KEY_HEX_LEN: usize = 64;

/// Raw SQLCipher key, validated as 32 bytes of hex.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Validates a 64 character hexadecimal key.
    pub fn parse(raw: &str) -> Result<Self, SourceError> {
        let raw = raw.trim();
        if raw.len() != KEY_HEX_LEN {
            return Err(SourceError::MalformedCredential(format!(
                "expected {} character hex string, got {} characters",
                KEY_HEX_LEN,
                raw.len()
            )));
        }

        let mut bytes = [0u8; KEY_HEX_LEN / 2];
        hex::decode_to_slice(raw, &mut bytes).map_err(|e| {
            SourceError::MalformedCredential(format!("not a hex string: {}", e))
        })?;

        Ok(Self(raw.to_ascii_lowercase()))
    }

    /// The `PRAGMA key` statement that unlocks the database with this raw key.
    pub(super) fn key_pragma(&self) -> String {
        format!("PRAGMA key = \"x'{}'\";", self.0)
    }

    /// First characters of the key, safe for logs.
    pub fn preview(&self) -> String {
        format!("{}...", &self.0[..5])
    }
}

// Never print the key itself
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// Validated location and credential of a Rekordbox database.
#[derive(Debug, Clone)]
pub struct SourceParams {
    location: PathBuf,
    credential: Credential,
}

impl SourceParams {
    /// Validates the location first, then the credential.
    pub fn new(location: &str, credential: &str) -> Result<Self, SourceError> {
        let trimmed = location.trim();
        if trimmed.is_empty() {
            return Err(SourceError::InvalidLocation(
                "database path is required".to_string(),
            ));
        }

        let path = PathBuf::from(trimmed);
        if !path.exists() {
            return Err(SourceError::Unavailable(format!(
                "database file not found at: {}",
                path.display()
            )));
        }
        if !path.is_file() {
            return Err(SourceError::InvalidLocation(format!(
                "{} is not a file",
                path.display()
            )));
        }

        let credential = Credential::parse(credential)?;

        Ok(Self {
            location: path,
            credential,
        })
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }
}
