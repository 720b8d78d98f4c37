//! Library database maintenance endpoints.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::db::models::DatabaseStats;
use crate::error::Result;
use crate::services::library::queries;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct VacuumResponse {
    pub success: bool,
    pub message: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/vacuum", post(vacuum))
}

/// GET /api/database/stats
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<DatabaseStats>> {
    let db = state.db.lock().await;
    let stats = queries::database_stats(&db)?;
    tracing::debug!(?stats, "Database stats");
    Ok(Json(stats))
}

/// POST /api/database/vacuum
pub async fn vacuum(State(state): State<AppState>) -> Result<Json<VacuumResponse>> {
    let db = state.db.lock().await;
    queries::vacuum(&db)?;
    tracing::info!("Database vacuumed");

    Ok(Json(VacuumResponse {
        success: true,
        message: "Database optimized successfully".to_string(),
    }))
}
