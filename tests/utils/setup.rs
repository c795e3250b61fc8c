use std::collections::HashMap;
use std::sync::Arc;
use strum::IntoEnumIterator;

use roomcast::event::Handle;
use roomcast::websockets::{ClientLink, MessageHandler};
use roomcast::{Coordinator, CoordinatorConfig, EventKind, RoomSummary, Session};

use super::mocks::EventRecorder;

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub coordinator: Arc<Coordinator>,
    pub recorder: Arc<EventRecorder>,
    pub sessions: HashMap<String, Session>,
    pub rooms: Vec<RoomSummary>,
    pub _recorder_handle: Handle,
}

pub struct TestSetupBuilder {
    users: Vec<String>,
    rooms: Vec<String>,
    config: CoordinatorConfig,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            users: vec![],
            rooms: vec![],
            config: CoordinatorConfig::default(),
        }
    }

    pub fn with_users(mut self, users: Vec<&str>) -> Self {
        self.users = users.into_iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_alice_and_bob(self) -> Self {
        self.with_users(vec!["alice", "bob"])
    }

    pub fn with_rooms(mut self, rooms: Vec<&str>) -> Self {
        self.rooms = rooms.into_iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_transcript_capacity(mut self, capacity: usize) -> Self {
        self.config.transcript_capacity = capacity;
        self
    }

    pub async fn build(self) -> TestSetup {
        let coordinator = Arc::new(Coordinator::new(self.config));
        let rooms = coordinator.seed_rooms(&self.rooms).await;

        let mut sessions = HashMap::new();
        for user in &self.users {
            let session = coordinator.connect(user).await.unwrap();
            sessions.insert(user.clone(), session);
        }

        // Attached last so tests start from a quiet stream
        let recorder = Arc::new(EventRecorder::new());
        let handle = coordinator.dispatcher().attach(recorder.clone());
        coordinator
            .dispatcher()
            .subscribe_all(EventKind::iter(), &handle)
            .await;

        TestSetup {
            coordinator,
            recorder,
            sessions,
            rooms,
            _recorder_handle: handle,
        }
    }
}

impl TestSetup {
    pub fn session(&self, user: &str) -> &Session {
        &self.sessions[user]
    }

    pub fn room(&self, name: &str) -> &RoomSummary {
        self.rooms
            .iter()
            .find(|room| room.name == name)
            .unwrap_or_else(|| panic!("no seeded room named {}", name))
    }

    pub async fn join(&self, user: &str, room: &str) {
        self.coordinator
            .join_room(&self.session(user).id, &self.room(room).id)
            .await
            .unwrap();
    }

    pub async fn send(&self, user: &str, room: &str, text: &str) -> roomcast::Message {
        self.coordinator
            .send_message(&self.session(user).id, &self.room(room).id, text)
            .await
            .unwrap()
    }

    /// Opens a client the way the WebSocket route does
    pub async fn open_client(&self, name: &str) -> ClientLink {
        ClientLink::open(Arc::clone(&self.coordinator), name)
            .await
            .unwrap()
    }

    /// Feeds a JSON frame to the client as if it came over its socket
    pub async fn client_sends(&self, client: &ClientLink, frame: serde_json::Value) {
        client
            .receive_handler
            .handle_message(&client.session, frame.to_string())
            .await;
    }
}
