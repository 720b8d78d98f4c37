use serde::{Deserialize, Serialize};

/// Column list shared by every `SELECT` that maps through [`Track::from_row`].
pub const TRACK_COLUMNS: &str = "id, title, artist, album, genre, duration, file_path, bpm, key, \
     energy, rekordbox_id, created_at, updated_at";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// A track owned by the local library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: i64,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: Option<String>,
    /// Length in seconds.
    pub duration: f64,
    pub file_path: String,
    pub bpm: Option<f64>,
    pub key: Option<String>,
    pub energy: Option<f64>,
    pub rekordbox_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Track {
    /// Maps a row selected with [`TRACK_COLUMNS`]. Tags are loaded separately.
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Track {
            id: row.get(0)?,
            title: row.get(1)?,
            artist: row.get(2)?,
            album: row.get(3)?,
            genre: row.get(4)?,
            duration: row.get(5)?,
            file_path: row.get(6)?,
            bpm: row.get(7)?,
            key: row.get(8)?,
            energy: row.get(9)?,
            rekordbox_id: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
            tags: Vec::new(),
        })
    }

    /// Returns true if a tag with this name is linked to the track.
    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|t| t.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub is_folder: bool,
    pub rekordbox_id: Option<String>,
    pub track_count: i64,
    /// Member track ids in playlist order.
    pub tracks: Vec<i64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub track_count: i64,
    pub playlist_count: i64,
    pub tag_count: i64,
    pub database_size: u64,
}
