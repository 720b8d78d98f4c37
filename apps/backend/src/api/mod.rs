//! API endpoint handlers for the TurntableIQ backend.
//!
//! Note: Path parameters use `:id` syntax, the form axum 0.7 routes on.

pub mod database;
pub mod playlists;
pub mod rekordbox;
pub mod tags;
pub mod tracks;
