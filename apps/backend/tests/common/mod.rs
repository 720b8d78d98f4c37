//! Test infrastructure for TurntableIQ backend integration tests.
//!
//! Provides a `TestApp` wrapper around `axum_test::TestServer` backed by an
//! in-memory library, and `RekordboxFixture` for building throwaway
//! Rekordbox-shaped databases on disk.

use axum_test::TestServer;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use turntable::{build_router, config::Config, db, AppState};

/// All-zero raw key. Plain SQLite test fixtures ignore it.
pub const TEST_KEY: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Test application wrapper around axum_test::TestServer.
pub struct TestApp {
    server: TestServer,
    db: Arc<Mutex<Connection>>,
}

impl TestApp {
    /// Create a new test application with in-memory database and the
    /// production router.
    pub async fn new() -> Self {
        let config = Config {
            server: turntable::config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: Vec::new(),
            },
            database: turntable::config::DatabaseConfig {
                path: ":memory:".into(),
            },
            import: Default::default(),
        };
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Self {
        let conn = db::init_db_memory().expect("Failed to initialize test database");
        let state = AppState::new(config, conn);
        let db = Arc::clone(&state.db);

        let server = TestServer::new(build_router(state)).expect("Failed to create test server");

        Self { server, db }
    }

    /// Get a reference to the test server.
    pub fn server(&self) -> &TestServer {
        &self.server
    }

    /// Get a reference to the database connection.
    ///
    /// Useful for seeding test data or verifying database state.
    #[allow(dead_code)]
    pub fn db(&self) -> &Arc<Mutex<Connection>> {
        &self.db
    }

    /// Insert a track directly into the library and return its id.
    #[allow(dead_code)]
    pub async fn seed_track(&self, title: &str, artist: &str) -> i64 {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO tracks (title, artist, file_path) VALUES (?1, ?2, ?3)",
            rusqlite::params![title, artist, format!("/music/{}.mp3", title)],
        )
        .expect("Failed to seed track");
        db.last_insert_rowid()
    }

    #[allow(dead_code)]
    pub async fn count(&self, table: &str) -> i64 {
        let db = self.db.lock().await;
        db.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })
        .expect("Failed to count rows")
    }

    /// Connect a Rekordbox fixture and return the session id.
    #[allow(dead_code)]
    pub async fn connect(&self, fixture: &RekordboxFixture) -> String {
        let response = self
            .server
            .post("/api/rekordbox/connect")
            .json(&serde_json::json!({
                "db_path": fixture.path_str(),
                "db_key": TEST_KEY,
            }))
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        body["session_id"]
            .as_str()
            .expect("session_id should be a string")
            .to_string()
    }
}

/// A Rekordbox-shaped SQLite database in a temporary directory.
#[allow(dead_code)]
pub struct RekordboxFixture {
    conn: Connection,
    path: PathBuf,
    _dir: tempfile::TempDir,
}

#[allow(dead_code)]
impl RekordboxFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("master.db");
        let conn = Connection::open(&path).expect("Failed to create fixture database");
        conn.execute_batch(
            r#"
            CREATE TABLE djmdArtist (ID VARCHAR(255) PRIMARY KEY, Name VARCHAR(255));
            CREATE TABLE djmdAlbum (ID VARCHAR(255) PRIMARY KEY, Name VARCHAR(255));
            CREATE TABLE djmdGenre (ID VARCHAR(255) PRIMARY KEY, Name VARCHAR(255));
            CREATE TABLE djmdKey (ID VARCHAR(255) PRIMARY KEY, ScaleName VARCHAR(255));
            CREATE TABLE djmdContent (
                ID VARCHAR(255) PRIMARY KEY, Title VARCHAR(255), ArtistID VARCHAR(255),
                AlbumID VARCHAR(255), GenreID VARCHAR(255), KeyID VARCHAR(255),
                BPM INTEGER DEFAULT 0, Length INTEGER DEFAULT 0,
                FolderPath VARCHAR(255) DEFAULT '', rb_local_deleted INTEGER DEFAULT 0
            );
            CREATE TABLE djmdMyTag (ID VARCHAR(255) PRIMARY KEY, Name VARCHAR(255));
            CREATE TABLE djmdSongMyTag (
                ID VARCHAR(255) PRIMARY KEY, MyTagID VARCHAR(255), ContentID VARCHAR(255)
            );
            CREATE TABLE djmdPlaylist (
                ID VARCHAR(255) PRIMARY KEY, Seq INTEGER, Name VARCHAR(255),
                Attribute INTEGER DEFAULT 0, ParentID VARCHAR(255) DEFAULT 'root',
                rb_local_deleted INTEGER DEFAULT 0
            );
            CREATE TABLE djmdSongPlaylist (
                ID VARCHAR(255) PRIMARY KEY, PlaylistID VARCHAR(255),
                ContentID VARCHAR(255), TrackNo INTEGER
            );
            "#,
        )
        .expect("Failed to create fixture schema");

        Self {
            conn,
            path,
            _dir: dir,
        }
    }

    pub fn path_str(&self) -> &str {
        self.path.to_str().expect("temp path should be utf-8")
    }

    /// Adds a track. `bpm` is in beats per minute, `length` in seconds.
    pub fn add_track(&self, id: &str, title: &str, artist: Option<&str>, bpm: f64, length: i64) {
        let artist_id = artist.map(|name| {
            let artist_id = format!("artist-{}", name);
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO djmdArtist (ID, Name) VALUES (?1, ?2)",
                    rusqlite::params![artist_id, name],
                )
                .expect("Failed to insert artist");
            artist_id
        });

        self.conn
            .execute(
                r#"
                INSERT INTO djmdContent (ID, Title, ArtistID, BPM, Length, FolderPath)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                rusqlite::params![
                    id,
                    title,
                    artist_id,
                    (bpm * 100.0).round() as i64,
                    length,
                    format!("/Music/{}.mp3", id)
                ],
            )
            .expect("Failed to insert track");
    }

    /// Overwrites the title of an existing track.
    pub fn rename_track(&self, id: &str, title: &str) {
        self.conn
            .execute(
                "UPDATE djmdContent SET Title = ?1 WHERE ID = ?2",
                [title, id],
            )
            .expect("Failed to rename track");
    }

    pub fn tag_track(&self, id: &str, tag: &str) {
        let tag_id = format!("tag-{}", tag);
        self.conn
            .execute(
                "INSERT OR IGNORE INTO djmdMyTag (ID, Name) VALUES (?1, ?2)",
                rusqlite::params![tag_id, tag],
            )
            .expect("Failed to insert tag");
        self.conn
            .execute(
                "INSERT INTO djmdSongMyTag (ID, MyTagID, ContentID) VALUES (?1, ?2, ?3)",
                rusqlite::params![format!("{}-{}", tag_id, id), tag_id, id],
            )
            .expect("Failed to link tag");
    }

    pub fn add_playlist(&self, id: &str, name: &str, parent: Option<&str>, is_folder: bool, tracks: &[&str]) {
        self.conn
            .execute(
                r#"
                INSERT INTO djmdPlaylist (ID, Seq, Name, Attribute, ParentID)
                VALUES (?1, (SELECT COUNT(*) FROM djmdPlaylist), ?2, ?3, ?4)
                "#,
                rusqlite::params![id, name, if is_folder { 1 } else { 0 }, parent.unwrap_or("root")],
            )
            .expect("Failed to insert playlist");

        for (position, track) in tracks.iter().enumerate() {
            self.conn
                .execute(
                    r#"
                    INSERT INTO djmdSongPlaylist (ID, PlaylistID, ContentID, TrackNo)
                    VALUES (?1, ?2, ?3, ?4)
                    "#,
                    rusqlite::params![
                        format!("{}-{}", id, position),
                        id,
                        track,
                        position as i64 + 1
                    ],
                )
                .expect("Failed to insert playlist member");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_app_creation() {
        let app = TestApp::new().await;
        assert!(app.db.lock().await.is_autocommit());
    }

    #[tokio::test]
    async fn test_health_check_endpoint() {
        let app = TestApp::new().await;
        let response = app.server().get("/api/health").await;

        response.assert_status_ok();
        response.assert_json(&serde_json::json!({ "status": "healthy" }));
    }

    #[tokio::test]
    async fn test_root_endpoint() {
        let app = TestApp::new().await;
        let response = app.server().get("/").await;

        response.assert_status_ok();
        response.assert_json_contains(&serde_json::json!({
            "app": "TurntableIQ API",
            "status": "Running",
            "sessions": 0
        }));
    }

    #[test]
    fn test_fixture_builds() {
        let fixture = RekordboxFixture::new();
        fixture.add_track("1", "Song", Some("Artist"), 120.0, 200);
        assert!(std::path::Path::new(fixture.path_str()).exists());
    }
}
