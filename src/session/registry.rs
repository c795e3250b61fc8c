use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use super::models::{Session, SessionId};
use crate::shared::AppError;

/// Tracks the sessions that are currently connected.
///
/// A single lock serializes register/unregister process-wide.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a new session under a fresh id
    #[instrument(skip(self))]
    pub async fn register(&self, display_name: &str) -> Result<Session, AppError> {
        let trimmed = display_name.trim();
        if trimmed.is_empty() {
            return Err(AppError::InvalidName(display_name.to_string()));
        }

        let session = Session::new(trimmed.to_string());
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session.clone());

        info!(
            session_id = %session.id,
            display_name = %session.display_name,
            live_sessions = sessions.len(),
            "Session registered"
        );

        Ok(session)
    }

    /// Removes a session, returning it if it was live. Unknown ids are a no-op.
    #[instrument(skip(self))]
    pub async fn unregister(&self, session_id: &SessionId) -> Option<Session> {
        let removed = self.sessions.write().await.remove(session_id);

        match &removed {
            Some(session) => info!(
                session_id = %session_id,
                display_name = %session.display_name,
                "Session unregistered"
            ),
            None => debug!(session_id = %session_id, "Unregister of unknown session ignored"),
        }

        removed
    }

    pub async fn lookup(&self, session_id: &SessionId) -> Option<Session> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Resolves many ids at once, silently skipping the ones that are gone
    pub async fn resolve(&self, session_ids: &[SessionId]) -> Vec<Session> {
        let sessions = self.sessions.read().await;
        session_ids
            .iter()
            .filter_map(|id| sessions.get(id).cloned())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
