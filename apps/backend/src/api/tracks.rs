//! Track API endpoints.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::models::Track;
use crate::error::{AppError, Result};
use crate::services::library::queries::{self, TrackFilter};
use crate::AppState;

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 1000;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Query parameters for listing tracks.
#[derive(Debug, Deserialize)]
pub struct ListTracksQuery {
    /// Number of tracks to skip (default: 0).
    pub skip: Option<u32>,
    /// Page size, 1 to 1000 (default: 100).
    pub limit: Option<u32>,
    /// Substring matched against title, artist, album and genre.
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TrackListResponse {
    pub items: Vec<Track>,
    pub total: i64,
    pub skip: u32,
    pub limit: u32,
}

/// Request body for tagging a track.
#[derive(Debug, Deserialize)]
pub struct AddTagRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

// =============================================================================
// Router
// =============================================================================

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tracks))
        .route("/:id", get(get_track).delete(delete_track))
        .route("/:id/tags", post(add_tag))
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /api/tracks
pub async fn list_tracks(
    State(state): State<AppState>,
    Query(query): Query<ListTracksQuery>,
) -> Result<Json<TrackListResponse>> {
    let skip = query.skip.unwrap_or(0);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }

    let db = state.db.lock().await;
    let (items, total) = queries::list_tracks(
        &db,
        &TrackFilter {
            skip,
            limit,
            search: query.search,
        },
    )?;

    Ok(Json(TrackListResponse {
        items,
        total,
        skip,
        limit,
    }))
}

/// GET /api/tracks/:id
pub async fn get_track(
    State(state): State<AppState>,
    Path(track_id): Path<i64>,
) -> Result<Json<Track>> {
    let db = state.db.lock().await;
    queries::get_track(&db, track_id)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Track not found".to_string()))
}

/// DELETE /api/tracks/:id
pub async fn delete_track(
    State(state): State<AppState>,
    Path(track_id): Path<i64>,
) -> Result<Json<SuccessResponse>> {
    let db = state.db.lock().await;
    if !queries::delete_track(&db, track_id)? {
        return Err(AppError::NotFound("Track not found".to_string()));
    }

    tracing::info!(track_id, "Deleted track");
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/tracks/:id/tags
pub async fn add_tag(
    State(state): State<AppState>,
    Path(track_id): Path<i64>,
    Json(request): Json<AddTagRequest>,
) -> Result<Json<Track>> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Tag name is required".to_string()));
    }

    let db = state.db.lock().await;
    queries::add_tag_to_track(&db, track_id, name)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Track not found".to_string()))
}
