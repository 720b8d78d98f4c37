//! TurntableIQ Backend Library
//!
//! DJ library management: a local SQLite track library with a REST API and
//! Rekordbox import. This library exposes modules for use in integration tests.

use axum::{extract::State, http::HeaderValue, response::Json, routing::get, Router};
use rusqlite::Connection;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod services;

use config::Config;
use services::SessionRegistry;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<Mutex<Connection>>,
    pub sessions: SessionRegistry,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: Config, conn: Connection) -> Self {
        Self {
            config: Arc::new(config),
            db: Arc::new(Mutex::new(conn)),
            sessions: SessionRegistry::new(),
            start_time: std::time::Instant::now(),
        }
    }
}

#[derive(Serialize)]
pub struct ApiResponse {
    pub app: String,
    pub version: String,
    pub status: String,
    pub uptime_seconds: u64,
    pub sessions: usize,
}

pub async fn root(State(state): State<AppState>) -> Json<ApiResponse> {
    Json(ApiResponse {
        app: "TurntableIQ API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "Running".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        sessions: state.sessions.len().await,
    })
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Build the complete application router.
///
/// Shared by `main.rs` and the integration tests so both run against the
/// same routes and layers.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/", get(root))
        .route("/api/health", get(health_check))
        .nest("/api/rekordbox", api::rekordbox::router())
        .nest("/api/tracks", api::tracks::router())
        .nest("/api/tags", api::tags::router())
        .nest("/api/playlists", api::playlists::router())
        .nest("/api/database", api::database::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Any origin when none are configured, otherwise only the listed ones.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(allowed)
}
