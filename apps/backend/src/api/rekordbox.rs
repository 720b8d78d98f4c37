//! Rekordbox connection and import endpoints.
//!
//! Connect validates a source and registers a session. Import re-opens the
//! session's source, reads every candidate, and only then takes the library
//! lock to reconcile, so a source that fails to open never touches the
//! library.

use std::sync::Arc;
use std::time::Instant;

use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::services::import::RecordFailure;
use crate::services::rekordbox::{RekordboxSource, SourceParams};
use crate::services::{
    import_all, import_playlists, ImportOptions, Session, SqliteTrackStore,
};
use crate::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Request body for connecting a Rekordbox database.
#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    /// Path to `master.db`.
    pub db_path: String,
    /// 64 character hex SQLCipher key.
    pub db_key: String,
}

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub success: bool,
    pub message: String,
    pub session_id: Uuid,
    pub track_count: i64,
}

/// Optional request body for imports. An empty body or one without a
/// session id uses the most recent session.
#[derive(Debug, Default, Deserialize)]
pub struct ImportRequest {
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub success: bool,
    pub message: String,
    pub count: usize,
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub failures: Vec<RecordFailure>,
    pub interrupted: bool,
}

// =============================================================================
// Router
// =============================================================================

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/connect", post(connect))
        .route("/import", post(import_tracks))
        .route("/import-playlists", post(import_playlists_handler))
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /api/rekordbox/connect
pub async fn connect(
    State(state): State<AppState>,
    Json(request): Json<ConnectRequest>,
) -> Result<Json<ConnectResponse>> {
    let params = SourceParams::new(&request.db_path, &request.db_key)?;

    let probe = params.clone();
    let track_count = tokio::task::spawn_blocking(move || {
        RekordboxSource::open(&probe).map(|source| source.track_count())
    })
    .await
    .map_err(|e| AppError::Internal(format!("Connect task failed: {}", e)))??;

    let session = state.sessions.register(params, track_count).await;
    tracing::info!(session_id = %session.id, track_count, "Rekordbox session connected");

    Ok(Json(ConnectResponse {
        success: true,
        message: format!(
            "Successfully connected to Rekordbox database with {} tracks",
            track_count
        ),
        session_id: session.id,
        track_count,
    }))
}

/// POST /api/rekordbox/import
pub async fn import_tracks(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ImportResponse>> {
    let request = parse_import_request(&body)?;
    let session = resolve_session(&state, request.session_id).await?;
    let options = import_options(&state);
    let db = Arc::clone(&state.db);

    tracing::info!(session_id = %session.id, "Starting track import");

    let summary = tokio::task::spawn_blocking(move || -> Result<_> {
        let candidates = {
            let source = RekordboxSource::open(&session.params)?;
            source.read_tracks()?
        };

        let conn = db.blocking_lock();
        let mut store = SqliteTrackStore::new(&conn);
        Ok(import_all(&mut store, candidates, &options))
    })
    .await
    .map_err(|e| AppError::Internal(format!("Import task failed: {}", e)))??;

    Ok(Json(ImportResponse {
        success: true,
        message: import_message("tracks", summary.seen, summary.failed, summary.interrupted),
        count: summary.seen,
        added: summary.inserted,
        updated: summary.updated,
        unchanged: summary.unchanged,
        failed: summary.failed,
        failures: summary.failures,
        interrupted: summary.interrupted,
    }))
}

/// POST /api/rekordbox/import-playlists
pub async fn import_playlists_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ImportResponse>> {
    let request = parse_import_request(&body)?;
    let session = resolve_session(&state, request.session_id).await?;
    let options = import_options(&state);
    let db = Arc::clone(&state.db);

    tracing::info!(session_id = %session.id, "Starting playlist import");

    let summary = tokio::task::spawn_blocking(move || -> Result<_> {
        let candidates = {
            let source = RekordboxSource::open(&session.params)?;
            source.read_playlists()?
        };

        let conn = db.blocking_lock();
        Ok(import_playlists(&conn, candidates, &options))
    })
    .await
    .map_err(|e| AppError::Internal(format!("Playlist import task failed: {}", e)))??;

    Ok(Json(ImportResponse {
        success: true,
        message: import_message("playlists", summary.seen, summary.failed, summary.interrupted),
        count: summary.seen,
        added: summary.inserted,
        updated: summary.updated,
        unchanged: summary.unchanged,
        failed: summary.failed,
        failures: summary.failures,
        interrupted: summary.interrupted,
    }))
}

// =============================================================================
// Helpers
// =============================================================================

/// An empty body selects the latest session. Anything else must be a valid
/// request, so a session id that does not parse is rejected rather than
/// falling back to another source.
fn parse_import_request(body: &[u8]) -> Result<ImportRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ImportRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid import request: {}", e)))
}

async fn resolve_session(state: &AppState, session_id: Option<Uuid>) -> Result<Session> {
    match session_id {
        Some(id) => state
            .sessions
            .get(&id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("Session {} not found", id))),
        None => state.sessions.latest().await.ok_or(AppError::NotConnected),
    }
}

fn import_options(state: &AppState) -> ImportOptions {
    ImportOptions {
        deadline: state
            .config
            .import
            .max_run_duration()
            .map(|limit| Instant::now() + limit),
    }
}

fn import_message(kind: &str, seen: usize, failed: usize, interrupted: bool) -> String {
    let mut message = format!("Successfully imported {} {} from Rekordbox", seen - failed, kind);
    if failed > 0 {
        message.push_str(&format!(", {} failed", failed));
    }
    if interrupted {
        message.push_str(", stopped at the time limit");
    }
    message
}
