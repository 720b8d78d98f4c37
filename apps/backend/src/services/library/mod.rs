//! The locally owned track library.
//!
//! [`TrackStore`] is the narrow contract the importer writes through.
//! [`SqliteTrackStore`] implements it over the application database, and
//! [`queries`] holds the read/maintenance operations behind the REST API.

pub mod queries;

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::{Tag, Track, TRACK_COLUMNS};
use crate::db::now_timestamp;

/// Field values for a track that does not exist yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrack {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: Option<String>,
    pub duration: f64,
    pub file_path: String,
    pub bpm: Option<f64>,
    pub key: Option<String>,
    pub rekordbox_id: Option<String>,
    /// Tag names to link on creation.
    pub tags: Vec<String>,
}

/// Persistence operations the importer needs.
///
/// Every write is atomic on its own: either the track row and all of its tag
/// links are stored, or nothing is.
pub trait TrackStore {
    fn find_by_foreign_id(&self, foreign_id: &str) -> rusqlite::Result<Option<Track>>;

    /// Stores a new track and returns it with its assigned local id.
    fn insert(&mut self, track: NewTrack) -> rusqlite::Result<Track>;

    /// Overwrites the mutable fields of an existing track and links any of
    /// `tags` that are not linked yet. Existing links are kept.
    fn update(&mut self, track: &Track, tags: &[String]) -> rusqlite::Result<Track>;
}

/// [`TrackStore`] over the application SQLite database.
pub struct SqliteTrackStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteTrackStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl TrackStore for SqliteTrackStore<'_> {
    fn find_by_foreign_id(&self, foreign_id: &str) -> rusqlite::Result<Option<Track>> {
        let track = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM tracks WHERE rekordbox_id = ?1",
                    TRACK_COLUMNS
                ),
                [foreign_id],
                Track::from_row,
            )
            .optional()?;

        match track {
            Some(mut track) => {
                track.tags = load_tags(self.conn, track.id)?;
                Ok(Some(track))
            }
            None => Ok(None),
        }
    }

    fn insert(&mut self, track: NewTrack) -> rusqlite::Result<Track> {
        let tx = self.conn.unchecked_transaction()?;
        let now = now_timestamp();

        tx.execute(
            r#"
            INSERT INTO tracks (title, artist, album, genre, duration, file_path, bpm, key,
                                rekordbox_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
            "#,
            params![
                track.title,
                track.artist,
                track.album,
                track.genre,
                track.duration,
                track.file_path,
                track.bpm,
                track.key,
                track.rekordbox_id,
                now,
            ],
        )?;
        let id = tx.last_insert_rowid();

        for name in &track.tags {
            link_tag(&tx, id, name)?;
        }

        let stored = fetch_track(&tx, id)?;
        tx.commit()?;
        Ok(stored)
    }

    fn update(&mut self, track: &Track, tags: &[String]) -> rusqlite::Result<Track> {
        let tx = self.conn.unchecked_transaction()?;

        let changed = tx.execute(
            r#"
            UPDATE tracks
            SET title = ?1, artist = ?2, album = ?3, genre = ?4, duration = ?5,
                file_path = ?6, bpm = ?7, key = ?8, updated_at = ?9
            WHERE id = ?10
            "#,
            params![
                track.title,
                track.artist,
                track.album,
                track.genre,
                track.duration,
                track.file_path,
                track.bpm,
                track.key,
                track.updated_at,
                track.id,
            ],
        )?;
        if changed == 0 {
            return Err(rusqlite::Error::QueryReturnedNoRows);
        }

        for name in tags {
            link_tag(&tx, track.id, name)?;
        }

        let stored = fetch_track(&tx, track.id)?;
        tx.commit()?;
        Ok(stored)
    }
}

/// Loads one track with its tags.
pub(crate) fn fetch_track(conn: &Connection, id: i64) -> rusqlite::Result<Track> {
    let mut track = conn.query_row(
        &format!("SELECT {} FROM tracks WHERE id = ?1", TRACK_COLUMNS),
        [id],
        Track::from_row,
    )?;
    track.tags = load_tags(conn, id)?;
    Ok(track)
}

pub(crate) fn load_tags(conn: &Connection, track_id: i64) -> rusqlite::Result<Vec<Tag>> {
    let mut stmt = conn.prepare_cached(
        r#"
        SELECT t.id, t.name FROM tags t
        JOIN track_tags tt ON tt.tag_id = t.id
        WHERE tt.track_id = ?1
        ORDER BY t.name
        "#,
    )?;
    let tags = stmt
        .query_map([track_id], |row| {
            Ok(Tag {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(tags)
}

/// Returns the tag with this name, creating it when missing.
pub(crate) fn ensure_tag(conn: &Connection, name: &str) -> rusqlite::Result<Tag> {
    conn.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", [name])?;
    conn.query_row(
        "SELECT id, name FROM tags WHERE name = ?1",
        [name],
        |row| {
            Ok(Tag {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        },
    )
}

/// Links a tag by name. Linking twice is a no-op.
pub(crate) fn link_tag(conn: &Connection, track_id: i64, name: &str) -> rusqlite::Result<Tag> {
    let tag = ensure_tag(conn, name)?;
    conn.execute(
        "INSERT OR IGNORE INTO track_tags (track_id, tag_id) VALUES (?1, ?2)",
        params![track_id, tag.id],
    )?;
    Ok(tag)
}
