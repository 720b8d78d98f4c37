//! Tag API endpoints.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::db::models::Tag;
use crate::error::{AppError, Result};
use crate::services::library::queries;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTagRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct TagListResponse {
    pub items: Vec<Tag>,
    pub total: usize,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_tags).post(create_tag))
}

/// GET /api/tags
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<TagListResponse>> {
    let db = state.db.lock().await;
    let items = queries::list_tags(&db)?;
    Ok(Json(TagListResponse {
        total: items.len(),
        items,
    }))
}

/// POST /api/tags
///
/// Creating a tag that already exists returns the existing one.
pub async fn create_tag(
    State(state): State<AppState>,
    Json(request): Json<CreateTagRequest>,
) -> Result<(StatusCode, Json<Tag>)> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Tag name is required".to_string()));
    }

    let db = state.db.lock().await;
    let tag = queries::create_tag(&db, name)?;
    Ok((StatusCode::CREATED, Json(tag)))
}
