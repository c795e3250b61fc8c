use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::types::{ConnectionState, CoordinatorConfig};
use crate::event::{ChatEvent, EventDispatcher};
use crate::message::{Message, MessageSequencer};
use crate::room::{JoinOutcome, RoomDirectory, RoomId, RoomSummary};
use crate::session::{Session, SessionId, SessionRegistry};
use crate::shared::AppError;

/// Single entry point for everything a connected client can do.
///
/// Sequences calls to the session registry, the room directory and the
/// message sequencer. The state owners publish their own events; the
/// coordinator only adds `connect`/`disconnect` and the `NotConnected` check.
pub struct Coordinator {
    registry: Arc<SessionRegistry>,
    directory: Arc<RoomDirectory>,
    sequencer: MessageSequencer,
    dispatcher: Arc<EventDispatcher>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new(CoordinatorConfig::default())
    }
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        let dispatcher = Arc::new(EventDispatcher::new(config.dispatcher));
        Self::with_dispatcher(config, dispatcher)
    }

    /// Builds the core around an existing dispatcher
    pub fn with_dispatcher(config: CoordinatorConfig, dispatcher: Arc<EventDispatcher>) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let directory = Arc::new(RoomDirectory::new(
            Arc::clone(&registry),
            Arc::clone(&dispatcher),
            config.transcript_capacity,
        ));
        let sequencer = MessageSequencer::new(
            Arc::clone(&directory),
            Arc::clone(&registry),
            Arc::clone(&dispatcher),
        );

        Self {
            registry,
            directory,
            sequencer,
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// Registers a new session and announces it
    #[instrument(skip(self))]
    pub async fn connect(&self, display_name: &str) -> Result<Session, AppError> {
        let session = self.registry.register(display_name).await?;

        info!(
            session_id = %session.id,
            display_name = %session.display_name,
            "Session connected"
        );

        self.dispatcher
            .publish(ChatEvent::Connect(session.clone()))
            .await;
        self.directory.publish_room_list().await;

        Ok(session)
    }

    /// Leaves the current room, drops the identity and announces the disconnect.
    ///
    /// Idempotent: only the call that actually removes the session publishes
    /// `disconnect`.
    #[instrument(skip(self))]
    pub async fn disconnect(&self, session_id: &SessionId) {
        if let Some(room_id) = self.directory.current_room(session_id).await {
            if let Err(e) = self.directory.leave(&room_id, session_id).await {
                warn!(room_id = %room_id, error = %e, "Failed to leave room on disconnect");
            }
        }

        match self.registry.unregister(session_id).await {
            Some(session) => {
                info!(
                    session_id = %session.id,
                    display_name = %session.display_name,
                    "Session disconnected"
                );
                self.dispatcher
                    .publish(ChatEvent::Disconnect(session.id))
                    .await;
            }
            None => debug!("Session already disconnected"),
        }

        // A join that slipped in between the leave and the unregister is undone here
        self.directory.release(session_id).await;
    }

    #[instrument(skip(self))]
    pub async fn join_room(
        &self,
        session_id: &SessionId,
        room_id: &RoomId,
    ) -> Result<JoinOutcome, AppError> {
        self.require_connected(session_id).await?;
        self.directory
            .join(room_id, session_id)
            .await
            .map_err(|e| lost_session(session_id, e))
    }

    /// Returns false if the session was not in the room
    #[instrument(skip(self))]
    pub async fn leave_room(
        &self,
        session_id: &SessionId,
        room_id: &RoomId,
    ) -> Result<bool, AppError> {
        self.require_connected(session_id).await?;
        self.directory.leave(room_id, session_id).await
    }

    #[instrument(skip(self, text))]
    pub async fn send_message(
        &self,
        session_id: &SessionId,
        room_id: &RoomId,
        text: &str,
    ) -> Result<Message, AppError> {
        self.require_connected(session_id).await?;
        self.sequencer
            .append(room_id, session_id, text)
            .await
            .map_err(|e| lost_session(session_id, e))
    }

    #[instrument(skip(self))]
    pub async fn create_room(
        &self,
        session_id: &SessionId,
        name: &str,
    ) -> Result<RoomSummary, AppError> {
        self.require_connected(session_id).await?;
        self.directory.create_room(name).await
    }

    pub async fn list_rooms(&self) -> Vec<RoomSummary> {
        self.directory.list_rooms().await
    }

    pub async fn members(&self, room_id: &RoomId) -> Result<Vec<Session>, AppError> {
        self.directory.members_of(room_id).await
    }

    /// Transcript of a room as seen by a connected session
    #[instrument(skip(self))]
    pub async fn history(
        &self,
        session_id: &SessionId,
        room_id: &RoomId,
        after: Option<u64>,
        limit: Option<usize>,
    ) -> Result<Vec<Message>, AppError> {
        self.require_connected(session_id).await?;
        self.directory.transcript(room_id, after, limit).await
    }

    /// Read-only transcript access for observers that hold no session
    pub async fn transcript(
        &self,
        room_id: &RoomId,
        after: Option<u64>,
        limit: Option<usize>,
    ) -> Result<Vec<Message>, AppError> {
        self.directory.transcript(room_id, after, limit).await
    }

    /// Creates every named room that does not exist yet
    pub async fn seed_rooms<I, S>(&self, names: I) -> Vec<RoomSummary>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut created = Vec::new();
        for name in names {
            match self.directory.create_room(name.as_ref()).await {
                Ok(room) => created.push(room),
                Err(AppError::DuplicateRoomName(name)) => {
                    debug!(name = %name, "Seed room already exists");
                }
                Err(e) => warn!(error = %e, "Skipping seed room"),
            }
        }
        info!(seeded = created.len(), "Seed rooms created");
        created
    }

    pub async fn session(&self, session_id: &SessionId) -> Option<Session> {
        self.registry.lookup(session_id).await
    }

    pub async fn current_room(&self, session_id: &SessionId) -> Option<RoomSummary> {
        let room_id = self.directory.current_room(session_id).await?;
        self.directory.get(&room_id).await.ok()
    }

    pub async fn state(&self, session_id: &SessionId) -> ConnectionState {
        if self.registry.lookup(session_id).await.is_none() {
            return ConnectionState::Disconnected;
        }
        match self.directory.current_room(session_id).await {
            Some(room_id) => ConnectionState::InRoom(room_id),
            None => ConnectionState::Connected,
        }
    }

    async fn require_connected(&self, session_id: &SessionId) -> Result<Session, AppError> {
        self.registry.lookup(session_id).await.ok_or_else(|| {
            warn!(session_id = %session_id, "Rejected request from unknown session");
            AppError::NotConnected(session_id.to_string())
        })
    }
}

/// The caller's own session disappearing after `require_connected` means a
/// disconnect won the race
fn lost_session(session_id: &SessionId, error: AppError) -> AppError {
    match error {
        AppError::SessionNotFound(id) if id == session_id.as_str() => AppError::NotConnected(id),
        other => other,
    }
}
