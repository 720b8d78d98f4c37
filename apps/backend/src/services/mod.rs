//! Application services for the TurntableIQ backend.

pub mod import;
pub mod library;
pub mod rekordbox;
pub mod sessions;

pub use import::{import_all, import_playlists, ImportOptions, ImportSummary};
pub use library::{SqliteTrackStore, TrackStore};
pub use sessions::{Session, SessionRegistry};
