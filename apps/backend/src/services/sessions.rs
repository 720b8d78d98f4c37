//! Registry of connected Rekordbox sources.
//!
//! Connecting validates a source once and hands back a session id; imports
//! name the session they read from instead of relying on one process-wide
//! connection.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::services::rekordbox::SourceParams;

/// A validated source the library can import from.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub params: SourceParams,
    /// Tracks in the source when it was connected.
    pub track_count: i64,
    pub connected_at: String,
}

#[derive(Debug, Default)]
struct Registry {
    sessions: HashMap<Uuid, Session>,
    latest: Option<Uuid>,
}

/// Shared session registry held in application state.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<Registry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connected source and makes it the default for imports.
    ///
    /// Reconnecting a location already in the registry refreshes that
    /// session in place and keeps its id, so the registry holds at most one
    /// session per file.
    pub async fn register(&self, params: SourceParams, track_count: i64) -> Session {
        let mut registry = self.inner.write().await;

        let existing = registry
            .sessions
            .values()
            .find(|s| s.params.location() == params.location())
            .map(|s| s.id);

        let session = Session {
            id: existing.unwrap_or_else(Uuid::new_v4),
            params,
            track_count,
            connected_at: crate::db::now_timestamp(),
        };

        registry.sessions.insert(session.id, session.clone());
        registry.latest = Some(session.id);

        tracing::debug!(
            session_id = %session.id,
            reconnected = existing.is_some(),
            "Registered Rekordbox session"
        );
        session
    }

    pub async fn get(&self, id: &Uuid) -> Option<Session> {
        self.inner.read().await.sessions.get(id).cloned()
    }

    /// The most recently connected session.
    pub async fn latest(&self) -> Option<Session> {
        let registry = self.inner.read().await;
        registry
            .latest
            .and_then(|id| registry.sessions.get(&id))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.sessions.is_empty()
    }
}
