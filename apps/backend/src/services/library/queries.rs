//! Read and maintenance queries over the library.

use rusqlite::{params, Connection, OptionalExtension};

use super::{ensure_tag, fetch_track, link_tag, load_tags};
use crate::db::models::{DatabaseStats, Playlist, Tag, Track, TRACK_COLUMNS};

/// Pagination and search for [`list_tracks`].
#[derive(Debug, Clone, Default)]
pub struct TrackFilter {
    pub skip: u32,
    pub limit: u32,
    /// Substring matched against title, artist, album and genre.
    pub search: Option<String>,
}

/// Values for a playlist created through the API.
#[derive(Debug, Clone, Default)]
pub struct NewPlaylist {
    pub name: String,
    pub parent_id: Option<i64>,
    pub is_folder: bool,
    pub track_ids: Vec<i64>,
}

/// Returns one page of tracks, ordered by title, and the total match count.
pub fn list_tracks(conn: &Connection, filter: &TrackFilter) -> rusqlite::Result<(Vec<Track>, i64)> {
    let pattern = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", escape_like(s)));

    let total: i64 = conn.query_row(
        r#"
        SELECT COUNT(*) FROM tracks
        WHERE ?1 IS NULL
           OR title LIKE ?1 ESCAPE '\' OR artist LIKE ?1 ESCAPE '\'
           OR album LIKE ?1 ESCAPE '\' OR genre LIKE ?1 ESCAPE '\'
        "#,
        params![pattern],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        r#"
        SELECT {} FROM tracks
        WHERE ?1 IS NULL
           OR title LIKE ?1 ESCAPE '\' OR artist LIKE ?1 ESCAPE '\'
           OR album LIKE ?1 ESCAPE '\' OR genre LIKE ?1 ESCAPE '\'
        ORDER BY title COLLATE NOCASE, id
        LIMIT ?2 OFFSET ?3
        "#,
        TRACK_COLUMNS
    ))?;

    let mut items = stmt
        .query_map(params![pattern, filter.limit, filter.skip], Track::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for track in &mut items {
        track.tags = load_tags(conn, track.id)?;
    }

    Ok((items, total))
}

/// Makes `%` and `_` match literally in a `LIKE ... ESCAPE '\'` pattern.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

pub fn get_track(conn: &Connection, id: i64) -> rusqlite::Result<Option<Track>> {
    match fetch_track(conn, id) {
        Ok(track) => Ok(Some(track)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Deletes a track and its tag and playlist links. Returns false if it did
/// not exist.
pub fn delete_track(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let deleted = conn.execute("DELETE FROM tracks WHERE id = ?1", [id])?;
    Ok(deleted > 0)
}

pub fn list_tags(conn: &Connection) -> rusqlite::Result<Vec<Tag>> {
    let mut stmt = conn.prepare("SELECT id, name FROM tags ORDER BY name")?;
    let tags = stmt
        .query_map([], |row| {
            Ok(Tag {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(tags)
}

/// Creates a tag, or returns the existing one with the same name.
pub fn create_tag(conn: &Connection, name: &str) -> rusqlite::Result<Tag> {
    ensure_tag(conn, name)
}

/// Links a tag to a track and returns the updated track, or `None` if the
/// track does not exist.
pub fn add_tag_to_track(conn: &Connection, track_id: i64, name: &str) -> rusqlite::Result<Option<Track>> {
    let exists: Option<i64> = conn
        .query_row("SELECT id FROM tracks WHERE id = ?1", [track_id], |row| {
            row.get(0)
        })
        .optional()?;
    if exists.is_none() {
        return Ok(None);
    }

    let tx = conn.unchecked_transaction()?;
    link_tag(&tx, track_id, name)?;
    let track = fetch_track(&tx, track_id)?;
    tx.commit()?;
    Ok(Some(track))
}

const PLAYLIST_COLUMNS: &str = "id, name, parent_id, is_folder, rekordbox_id, created_at, updated_at";

fn playlist_from_row(row: &rusqlite::Row) -> rusqlite::Result<Playlist> {
    Ok(Playlist {
        id: row.get(0)?,
        name: row.get(1)?,
        parent_id: row.get(2)?,
        is_folder: row.get(3)?,
        rekordbox_id: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        track_count: 0,
        tracks: Vec::new(),
    })
}

pub(crate) fn playlist_track_ids(conn: &Connection, playlist_id: i64) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = conn.prepare_cached(
        "SELECT track_id FROM playlist_tracks WHERE playlist_id = ?1 ORDER BY position",
    )?;
    let ids = stmt
        .query_map([playlist_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<i64>, _>>()?;
    Ok(ids)
}

pub fn get_playlist(conn: &Connection, id: i64) -> rusqlite::Result<Option<Playlist>> {
    let playlist = conn
        .query_row(
            &format!("SELECT {} FROM playlists WHERE id = ?1", PLAYLIST_COLUMNS),
            [id],
            playlist_from_row,
        )
        .optional()?;

    match playlist {
        Some(mut playlist) => {
            playlist.tracks = playlist_track_ids(conn, playlist.id)?;
            playlist.track_count = playlist.tracks.len() as i64;
            Ok(Some(playlist))
        }
        None => Ok(None),
    }
}

/// All playlists and folders, ordered by name, with their member ids.
pub fn list_playlists(conn: &Connection) -> rusqlite::Result<Vec<Playlist>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM playlists ORDER BY name COLLATE NOCASE, id",
        PLAYLIST_COLUMNS
    ))?;
    let mut playlists = stmt
        .query_map([], playlist_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for playlist in &mut playlists {
        playlist.tracks = playlist_track_ids(conn, playlist.id)?;
        playlist.track_count = playlist.tracks.len() as i64;
    }

    Ok(playlists)
}

/// Replaces a playlist's members, keeping the given order. Repeated ids keep
/// their first position.
pub(crate) fn replace_playlist_tracks(
    conn: &Connection,
    playlist_id: i64,
    track_ids: &[i64],
) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM playlist_tracks WHERE playlist_id = ?1",
        [playlist_id],
    )?;

    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO playlist_tracks (playlist_id, track_id, position) VALUES (?1, ?2, ?3)",
    )?;
    for (position, track_id) in track_ids.iter().enumerate() {
        stmt.execute(params![playlist_id, track_id, position as i64])?;
    }
    Ok(())
}

/// Creates a playlist. Unknown track or parent ids fail the whole insert.
pub fn create_playlist(conn: &Connection, playlist: &NewPlaylist) -> rusqlite::Result<Playlist> {
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "INSERT INTO playlists (name, parent_id, is_folder) VALUES (?1, ?2, ?3)",
        params![playlist.name, playlist.parent_id, playlist.is_folder],
    )?;
    let id = tx.last_insert_rowid();
    replace_playlist_tracks(&tx, id, &playlist.track_ids)?;

    let created = get_playlist(&tx, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
    tx.commit()?;
    Ok(created)
}

/// Row counts and on-disk size of the library database.
pub fn database_stats(conn: &Connection) -> rusqlite::Result<DatabaseStats> {
    let count = |table: &str| -> rusqlite::Result<i64> {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })
    };

    let page_count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
    let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;

    Ok(DatabaseStats {
        track_count: count("tracks")?,
        playlist_count: count("playlists")?,
        tag_count: count("tags")?,
        database_size: (page_count * page_size).max(0) as u64,
    })
}

pub fn vacuum(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("VACUUM;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db_memory;

    fn seed_track(conn: &Connection, title: &str, artist: &str, genre: Option<&str>) -> i64 {
        conn.execute(
            "INSERT INTO tracks (title, artist, genre) VALUES (?1, ?2, ?3)",
            params![title, artist, genre],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn test_list_tracks_paginates() {
        let conn = init_db_memory().unwrap();
        for title in ["Charlie", "Alpha", "Bravo"] {
            seed_track(&conn, title, "", None);
        }

        let (items, total) = list_tracks(
            &conn,
            &TrackFilter {
                skip: 1,
                limit: 1,
                search: None,
            },
        )
        .unwrap();

        assert_eq!(total, 3);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Bravo");
    }

    #[test]
    fn test_list_tracks_search_matches_any_field() {
        let conn = init_db_memory().unwrap();
        seed_track(&conn, "Windowlicker", "Aphex Twin", Some("IDM"));
        seed_track(&conn, "Strings of Life", "Derrick May", Some("Techno"));
        seed_track(&conn, "Xtal", "Aphex Twin", Some("Ambient"));

        let filter = |search: &str| TrackFilter {
            skip: 0,
            limit: 100,
            search: Some(search.to_string()),
        };

        let (items, total) = list_tracks(&conn, &filter("aphex")).unwrap();
        assert_eq!(total, 2);
        assert_eq!(items.len(), 2);

        let (_, total) = list_tracks(&conn, &filter("techno")).unwrap();
        assert_eq!(total, 1);

        let (_, total) = list_tracks(&conn, &filter("   ")).unwrap();
        assert_eq!(total, 3, "blank search lists everything");

        let (_, total) = list_tracks(&conn, &filter("%")).unwrap();
        assert_eq!(total, 0, "wildcards match literally");
    }

    #[test]
    fn test_delete_track_cascades_links() {
        let conn = init_db_memory().unwrap();
        let id = seed_track(&conn, "Gone", "", None);
        add_tag_to_track(&conn, id, "Old").unwrap();

        assert!(delete_track(&conn, id).unwrap());
        assert!(!delete_track(&conn, id).unwrap());
        assert!(get_track(&conn, id).unwrap().is_none());

        let links: i64 = conn
            .query_row("SELECT COUNT(*) FROM track_tags", [], |row| row.get(0))
            .unwrap();
        assert_eq!(links, 0);
    }

    #[test]
    fn test_tags() {
        let conn = init_db_memory().unwrap();
        let first = create_tag(&conn, "Vocal").unwrap();
        let again = create_tag(&conn, "Vocal").unwrap();
        assert_eq!(first, again);

        let id = seed_track(&conn, "Song", "", None);
        let track = add_tag_to_track(&conn, id, "Vocal").unwrap().unwrap();
        assert!(track.has_tag("Vocal"));
        assert!(add_tag_to_track(&conn, 404, "Vocal").unwrap().is_none());

        assert_eq!(list_tags(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_create_and_list_playlists() {
        let conn = init_db_memory().unwrap();
        let a = seed_track(&conn, "A", "", None);
        let b = seed_track(&conn, "B", "", None);

        let folder = create_playlist(
            &conn,
            &NewPlaylist {
                name: "Gigs".to_string(),
                is_folder: true,
                ..Default::default()
            },
        )
        .unwrap();

        let playlist = create_playlist(
            &conn,
            &NewPlaylist {
                name: "Closing".to_string(),
                parent_id: Some(folder.id),
                is_folder: false,
                track_ids: vec![b, a, b],
            },
        )
        .unwrap();

        assert_eq!(playlist.tracks, vec![b, a]);
        assert_eq!(playlist.track_count, 2);

        let all = list_playlists(&conn).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "Closing");
        assert_eq!(all[0].parent_id, Some(folder.id));
        assert!(all[1].is_folder);
    }

    #[test]
    fn test_create_playlist_with_unknown_track_fails() {
        let conn = init_db_memory().unwrap();
        let result = create_playlist(
            &conn,
            &NewPlaylist {
                name: "Broken".to_string(),
                track_ids: vec![42],
                ..Default::default()
            },
        );
        assert!(result.is_err());
        assert!(list_playlists(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_stats_and_vacuum() {
        let conn = init_db_memory().unwrap();
        seed_track(&conn, "One", "", None);
        create_tag(&conn, "Tag").unwrap();

        let stats = database_stats(&conn).unwrap();
        assert_eq!(stats.track_count, 1);
        assert_eq!(stats.tag_count, 1);
        assert_eq!(stats.playlist_count, 0);
        assert!(stats.database_size > 0);

        vacuum(&conn).unwrap();
    }
}
