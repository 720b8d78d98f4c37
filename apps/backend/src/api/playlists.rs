//! Playlist API endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::models::Playlist;
use crate::error::{AppError, Result};
use crate::services::library::queries::{self, NewPlaylist};
use crate::AppState;

/// Request body for creating a playlist or folder.
#[derive(Debug, Deserialize)]
pub struct CreatePlaylistRequest {
    pub name: String,
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub is_folder: bool,
    /// Member track ids in playlist order.
    #[serde(default)]
    pub tracks: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct PlaylistListResponse {
    pub items: Vec<Playlist>,
    pub total: usize,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_playlists).post(create_playlist))
        .route("/:id", get(get_playlist))
}

/// GET /api/playlists
pub async fn list_playlists(State(state): State<AppState>) -> Result<Json<PlaylistListResponse>> {
    let db = state.db.lock().await;
    let items = queries::list_playlists(&db)?;
    Ok(Json(PlaylistListResponse {
        total: items.len(),
        items,
    }))
}

/// GET /api/playlists/:id
pub async fn get_playlist(
    State(state): State<AppState>,
    Path(playlist_id): Path<i64>,
) -> Result<Json<Playlist>> {
    let db = state.db.lock().await;
    queries::get_playlist(&db, playlist_id)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Playlist not found".to_string()))
}

/// POST /api/playlists
pub async fn create_playlist(
    State(state): State<AppState>,
    Json(request): Json<CreatePlaylistRequest>,
) -> Result<(StatusCode, Json<Playlist>)> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Playlist name is required".to_string()));
    }
    if request.is_folder && !request.tracks.is_empty() {
        return Err(AppError::BadRequest("Folders cannot contain tracks".to_string()));
    }

    let db = state.db.lock().await;

    if let Some(parent_id) = request.parent_id {
        let parent = queries::get_playlist(&db, parent_id)?
            .ok_or_else(|| AppError::BadRequest(format!("Unknown parent playlist {}", parent_id)))?;
        if !parent.is_folder {
            return Err(AppError::BadRequest(format!(
                "Parent playlist {} is not a folder",
                parent_id
            )));
        }
    }
    for track_id in &request.tracks {
        if queries::get_track(&db, *track_id)?.is_none() {
            return Err(AppError::BadRequest(format!("Unknown track {}", track_id)));
        }
    }

    let playlist = queries::create_playlist(
        &db,
        &NewPlaylist {
            name: name.to_string(),
            parent_id: request.parent_id,
            is_folder: request.is_folder,
            track_ids: request.tracks,
        },
    )?;

    tracing::info!(playlist_id = playlist.id, name = %playlist.name, "Created playlist");
    Ok((StatusCode::CREATED, Json(playlist)))
}
