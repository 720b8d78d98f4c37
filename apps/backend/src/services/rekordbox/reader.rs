//! Scoped read handle over a Rekordbox database.

use std::collections::HashMap;

use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};

use super::{CandidatePlaylist, CandidateTrack, SourceError, SourceParams};

/// Joins every lookup table the library cares about.
const CONTENT_QUERY: &str = "
    SELECT c.ID, c.Title, c.Length, c.BPM, c.FolderPath,
           a.Name, al.Name, g.Name, k.ScaleName
    FROM djmdContent c
    LEFT JOIN djmdArtist a ON c.ArtistID = a.ID
    LEFT JOIN djmdAlbum al ON c.AlbumID = al.ID
    LEFT JOIN djmdGenre g ON c.GenreID = g.ID
    LEFT JOIN djmdKey k ON c.KeyID = k.ID
    WHERE COALESCE(c.rb_local_deleted, 0) = 0
    ORDER BY c.ID
";

/// Same joins for schemas that predate the `rb_local_deleted` column.
const CONTENT_UNFILTERED_QUERY: &str = "
    SELECT c.ID, c.Title, c.Length, c.BPM, c.FolderPath,
           a.Name, al.Name, g.Name, k.ScaleName
    FROM djmdContent c
    LEFT JOIN djmdArtist a ON c.ArtistID = a.ID
    LEFT JOIN djmdAlbum al ON c.AlbumID = al.ID
    LEFT JOIN djmdGenre g ON c.GenreID = g.ID
    LEFT JOIN djmdKey k ON c.KeyID = k.ID
    ORDER BY c.ID
";

/// Older or stripped-down schemas without the lookup tables.
const CONTENT_FALLBACK_QUERY: &str = "
    SELECT ID, Title, Length, BPM, FolderPath, NULL, NULL, NULL, NULL
    FROM djmdContent
    ORDER BY ID
";

const MY_TAG_QUERY: &str = "
    SELECT st.ContentID, t.Name
    FROM djmdSongMyTag st
    JOIN djmdMyTag t ON st.MyTagID = t.ID
    WHERE t.Name IS NOT NULL AND t.Name != ''
    ORDER BY st.ContentID, t.Name
";

const PLAYLIST_QUERY: &str = "
    SELECT ID, Name, ParentID, COALESCE(Attribute, 0)
    FROM djmdPlaylist
    WHERE COALESCE(rb_local_deleted, 0) = 0
    ORDER BY COALESCE(Seq, 0), ID
";

const PLAYLIST_MEMBER_QUERY: &str = "
    SELECT PlaylistID, ContentID
    FROM djmdSongPlaylist
    ORDER BY PlaylistID, TrackNo
";

/// Rekordbox stores BPM multiplied by 100.
const BPM_SCALE: f64 = 100.0;

/// `Length` values at or above this are taken to be milliseconds.
///
/// Tracks of 1000 seconds or longer (about 16m40s) cannot be told apart from
/// millisecond values and are scaled down too.
const MILLISECOND_THRESHOLD: f64 = 1000.0;

/// Attribute value of a playlist folder in `djmdPlaylist`.
const FOLDER_ATTRIBUTE: i64 = 1;

/// An open, read-only Rekordbox database.
///
/// The connection is closed when the handle is dropped, whichever way the
/// read ends.
pub struct RekordboxSource {
    conn: Connection,
    track_count: i64,
}

impl std::fmt::Debug for RekordboxSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RekordboxSource")
            .field("track_count", &self.track_count)
            .finish_non_exhaustive()
    }
}

/// One `djmdContent` row before normalization.
struct ContentRow {
    id: Value,
    title: Option<String>,
    length: Option<f64>,
    bpm: Option<f64>,
    folder_path: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    genre: Option<String>,
    key: Option<String>,
}

impl RekordboxSource {
    /// Opens the database read-only, unlocks it and checks that it really is
    /// a Rekordbox library.
    pub fn open(params: &SourceParams) -> Result<Self, SourceError> {
        let location = params.location();
        tracing::info!(
            path = %location.display(),
            key = %params.credential().preview(),
            "Opening Rekordbox database"
        );

        let conn = Connection::open_with_flags(
            location,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| SourceError::Unavailable(format!("cannot open database: {}", e)))?;

        conn.execute_batch(&params.credential().key_pragma())
            .map_err(|e| SourceError::Unavailable(format!("cannot apply key: {}", e)))?;

        let track_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM djmdContent", [], |row| row.get(0))
            .map_err(|e| {
                SourceError::Unavailable(format!(
                    "not a Rekordbox database or wrong key: {}",
                    e
                ))
            })?;

        tracing::info!(track_count, "Connected to Rekordbox database");

        Ok(Self { conn, track_count })
    }

    /// Number of rows in `djmdContent` at open time.
    pub fn track_count(&self) -> i64 {
        self.track_count
    }

    /// Reads every track in one pass, in `djmdContent.ID` order.
    pub fn read_tracks(&self) -> Result<Vec<CandidateTrack>, SourceError> {
        let rows = match self.query_content(CONTENT_QUERY) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "Content query failed, retrying without the deleted filter");
                match self.query_content(CONTENT_UNFILTERED_QUERY) {
                    Ok(rows) => rows,
                    Err(e) => {
                        tracing::warn!(error = %e, "Joined content query failed, using bare djmdContent columns");
                        self.query_content(CONTENT_FALLBACK_QUERY)?
                    }
                }
            }
        };

        let mut tags = self.read_my_tags();

        let tracks: Vec<CandidateTrack> = rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                let mut track = normalize_content_row(i, row);
                if let Some(labels) = tags.remove(&track.foreign_id) {
                    track.tags = labels;
                }
                track
            })
            .collect();

        tracing::info!(count = tracks.len(), "Extracted tracks from Rekordbox");
        Ok(tracks)
    }

    /// Reads playlists and folders with their ordered members.
    pub fn read_playlists(&self) -> Result<Vec<CandidatePlaylist>, SourceError> {
        let mut members: HashMap<String, Vec<String>> = HashMap::new();
        {
            let mut stmt = self.conn.prepare(PLAYLIST_MEMBER_QUERY)?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let playlist_id = value_to_id(row.get(0)?);
                let content_id = value_to_id(row.get(1)?);
                if playlist_id.is_empty() || content_id.is_empty() {
                    continue;
                }
                members.entry(playlist_id).or_default().push(content_id);
            }
        }

        let mut stmt = self.conn.prepare(PLAYLIST_QUERY)?;
        let playlists = stmt
            .query_map([], |row| {
                Ok((
                    value_to_id(row.get(0)?),
                    row.get::<_, Option<String>>(1)?,
                    value_to_id(row.get(2)?),
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .map(|(foreign_id, name, parent, attribute)| CandidatePlaylist {
                track_foreign_ids: members.remove(&foreign_id).unwrap_or_default(),
                name: name.unwrap_or_default(),
                parent_foreign_id: normalize_parent(parent),
                is_folder: attribute == FOLDER_ATTRIBUTE,
                foreign_id,
            })
            .collect::<Vec<_>>();

        tracing::info!(count = playlists.len(), "Extracted playlists from Rekordbox");
        Ok(playlists)
    }

    fn query_content(&self, sql: &str) -> rusqlite::Result<Vec<ContentRow>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ContentRow {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    length: row.get(2)?,
                    bpm: row.get(3)?,
                    folder_path: row.get(4)?,
                    artist: row.get(5)?,
                    album: row.get(6)?,
                    genre: row.get(7)?,
                    key: row.get(8)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// My Tag labels keyed by content id. Libraries without the tables have none.
    fn read_my_tags(&self) -> HashMap<String, Vec<String>> {
        let mut tags: HashMap<String, Vec<String>> = HashMap::new();

        let result = self.conn.prepare(MY_TAG_QUERY).and_then(|mut stmt| {
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let content_id = value_to_id(row.get(0)?);
                let name: String = row.get(1)?;
                let labels = tags.entry(content_id).or_default();
                if !labels.contains(&name) {
                    labels.push(name);
                }
            }
            Ok(())
        });

        if let Err(e) = result {
            tracing::debug!(error = %e, "No My Tag data in source");
            tags.clear();
        }

        tags
    }
}

/// Rekordbox ids are VARCHAR in version 6+ but integers in older exports.
fn value_to_id(value: Value) -> String {
    match value {
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s.trim().to_string(),
        Value::Null | Value::Blob(_) => String::new(),
    }
}

fn normalize_parent(parent: String) -> Option<String> {
    match parent.as_str() {
        "" | "root" => None,
        _ => Some(parent),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// `Length` is seconds in current libraries; large values are milliseconds.
pub(crate) fn normalize_duration(raw: Option<f64>) -> f64 {
    match raw {
        Some(v) if v.is_finite() && v > 0.0 => {
            if v < MILLISECOND_THRESHOLD {
                v
            } else {
                v / 1000.0
            }
        }
        _ => 0.0,
    }
}

pub(crate) fn normalize_bpm(raw: Option<f64>) -> Option<f64> {
    raw.filter(|v| v.is_finite() && *v > 0.0)
        .map(|v| v / BPM_SCALE)
}

/// Splits `"Artist - Title"` when the artist is unknown.
pub(crate) fn split_artist_title(artist: Option<String>, title: String) -> (String, String) {
    if let Some(artist) = non_empty(artist) {
        return (artist, title);
    }
    match title.split_once(" - ") {
        Some((artist, rest)) if !artist.trim().is_empty() && !rest.trim().is_empty() => {
            (artist.trim().to_string(), rest.trim().to_string())
        }
        _ => (String::new(), title),
    }
}

fn normalize_content_row(index: usize, row: ContentRow) -> CandidateTrack {
    let title = non_empty(row.title).unwrap_or_else(|| format!("Track {}", index + 1));
    let (artist, title) = split_artist_title(row.artist, title);

    CandidateTrack {
        foreign_id: value_to_id(row.id),
        title,
        artist,
        album: non_empty(row.album).unwrap_or_default(),
        genre: non_empty(row.genre),
        duration: normalize_duration(row.length),
        file_path: row.folder_path.unwrap_or_default(),
        bpm: normalize_bpm(row.bpm),
        key: non_empty(row.key),
        tags: Vec::new(),
    }
}
