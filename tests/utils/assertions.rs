//! Test assertion helpers - fluent API for verifying test expectations
#![allow(dead_code)] // Test utilities may not all be used in every test

use serde_json::Value;

use roomcast::websockets::{ClientLink, ServerMessage};
use roomcast::{ChatEvent, EventKind, Message, RoomId};

use super::setup::TestSetup;

// ============================================================================
// Event Stream Assertions
// ============================================================================

pub struct EventAssertion {
    events: Vec<ChatEvent>,
}

impl EventAssertion {
    /// Snapshot of everything the setup's recorder has seen
    pub async fn recorded(setup: &TestSetup) -> Self {
        Self {
            events: setup.recorder.events().await,
        }
    }

    /// Snapshot taken once `count` events of `kind` have arrived
    pub async fn recorded_through(setup: &TestSetup, kind: EventKind, count: usize) -> Self {
        Self {
            events: setup.recorder.wait_for(kind, count).await,
        }
    }

    /// Assert the recorded kinds, in order, are exactly these
    pub fn kinds(self, expected: Vec<EventKind>) -> Self {
        let actual: Vec<EventKind> = self.events.iter().map(|e| e.kind()).collect();
        assert_eq!(actual, expected, "unexpected event sequence");
        self
    }

    pub fn count(self, kind: EventKind, expected: usize) -> Self {
        let actual = self.events.iter().filter(|e| e.kind() == kind).count();
        assert_eq!(actual, expected, "wrong number of {} events", kind);
        self
    }

    pub fn none_of(self, kind: EventKind) -> Self {
        self.count(kind, 0)
    }

    /// Messages received for the room, in delivery order
    pub fn messages_in(&self, room_id: &RoomId) -> Vec<Message> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ChatEvent::MessageReceived(message) if &message.room_id == room_id => {
                    Some(message.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn events(&self) -> &[ChatEvent] {
        &self.events
    }
}

// ============================================================================
// Client Frame Assertions
// ============================================================================

/// Drains a client's outbound queue and checks what it would have sent
pub struct FrameAssertion {
    frames: Vec<ServerMessage>,
}

impl FrameAssertion {
    /// Frames up to the first one of `message_type`, plus whatever is already
    /// queued behind it
    pub async fn until(client: &mut ClientLink, message_type: &str) -> Self {
        let mut frames: Vec<ServerMessage> = vec![];
        while !frames.iter().any(|f| f.message_type == message_type) {
            let frame = tokio::time::timeout(
                std::time::Duration::from_secs(5),
                client.outbound_receiver.recv(),
            )
            .await
            .unwrap_or_else(|_| panic!("no {} frame arrived", message_type))
            .unwrap();
            frames.push(serde_json::from_str(&frame).unwrap());
        }
        while let Ok(frame) = client.outbound_receiver.try_recv() {
            frames.push(serde_json::from_str(&frame).unwrap());
        }
        Self { frames }
    }

    /// Everything queued after a short pause; for checking a frame never came
    pub async fn drain(client: &mut ClientLink) -> Self {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let mut frames = vec![];
        while let Ok(frame) = client.outbound_receiver.try_recv() {
            frames.push(serde_json::from_str(&frame).unwrap());
        }
        Self { frames }
    }

    pub fn types(&self) -> Vec<&str> {
        self.frames.iter().map(|f| f.message_type.as_str()).collect()
    }

    pub fn contains(self, message_type: &str) -> Self {
        assert!(
            self.types().contains(&message_type),
            "expected a {} frame, got {:?}",
            message_type,
            self.types()
        );
        self
    }

    pub fn lacks(self, message_type: &str) -> Self {
        assert!(
            !self.types().contains(&message_type),
            "unexpected {} frame in {:?}",
            message_type,
            self.types()
        );
        self
    }

    /// Payload of the first frame of the given type
    pub fn payload(&self, message_type: &str) -> Value {
        self.frames
            .iter()
            .find(|f| f.message_type == message_type)
            .map(|f| f.payload.clone())
            .unwrap_or_else(|| panic!("no {} frame in {:?}", message_type, self.types()))
    }
}
