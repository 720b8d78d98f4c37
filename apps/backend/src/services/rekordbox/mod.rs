//! Read-only access to a Rekordbox 6/7 `master.db`.
//!
//! The database is SQLite, encrypted with SQLCipher in stock installations.
//! Decryption is delegated to the SQLite build `rusqlite` links against; this
//! module only validates connection parameters, opens the file as a scoped
//! handle and turns `djmd*` rows into import candidates.

mod credential;
mod reader;

pub use credential::{Credential, SourceParams};
pub use reader::RekordboxSource;

use serde::Serialize;
use thiserror::Error;

/// Reasons a Rekordbox source cannot be used. All of them are run-level:
/// nothing is imported when one occurs.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The location is empty or does not point at a regular file.
    #[error("Invalid database location: {0}")]
    InvalidLocation(String),

    /// The credential is not a 64 character hex string.
    #[error("Invalid encryption key format: {0}")]
    MalformedCredential(String),

    /// The file is missing, unreadable, encrypted with another key, or not a
    /// Rekordbox database.
    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

impl SourceError {
    /// Stable machine-readable code for API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            SourceError::InvalidLocation(_) => "invalid_location",
            SourceError::MalformedCredential(_) => "malformed_credential",
            SourceError::Unavailable(_) => "source_unavailable",
        }
    }
}

impl From<rusqlite::Error> for SourceError {
    fn from(err: rusqlite::Error) -> Self {
        SourceError::Unavailable(err.to_string())
    }
}

/// A track as read from Rekordbox, not yet reconciled into the library.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateTrack {
    /// `djmdContent.ID`, the sole matching key.
    pub foreign_id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: Option<String>,
    /// Seconds.
    pub duration: f64,
    pub file_path: String,
    pub bpm: Option<f64>,
    pub key: Option<String>,
    /// My Tag labels.
    pub tags: Vec<String>,
}

/// A playlist or playlist folder as read from Rekordbox.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidatePlaylist {
    pub foreign_id: String,
    pub name: String,
    pub parent_foreign_id: Option<String>,
    pub is_folder: bool,
    /// Member `djmdContent.ID`s in `TrackNo` order.
    pub track_foreign_ids: Vec<String>,
}
