use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use super::messages::ServerMessage;
use crate::event::{ChatEvent, EventError, EventHandler};
use crate::room::RoomId;
use crate::session::SessionId;

/// Forwards the events one connection cares about into its outbound queue.
///
/// The connection's current room is tracked from its own `user-joined` and
/// `user-left` events, so it always matches the point in the event stream
/// being delivered rather than the directory's latest state.
pub struct ConnectionForwarder {
    session_id: SessionId,
    outbound: mpsc::UnboundedSender<String>,
    current_room: Mutex<Option<RoomId>>,
}

impl ConnectionForwarder {
    pub fn new(session_id: SessionId, outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            session_id,
            outbound,
            current_room: Mutex::new(None),
        }
    }

    async fn should_forward(&self, event: &ChatEvent) -> bool {
        let mut current = self.current_room.lock().await;

        match event {
            ChatEvent::Connect(session) => session.id == self.session_id,
            ChatEvent::Disconnect(session_id) => *session_id == self.session_id,
            ChatEvent::RoomListChanged(_) | ChatEvent::RoomCreated(_) => true,
            ChatEvent::UserJoined(joined) if joined.user.id == self.session_id => {
                *current = Some(joined.room_id.clone());
                true
            }
            ChatEvent::UserJoined(joined) => current.as_ref() == Some(&joined.room_id),
            ChatEvent::UserLeft(left) if left.user_id == self.session_id => {
                if current.as_ref() == Some(&left.room_id) {
                    *current = None;
                }
                true
            }
            ChatEvent::UserLeft(left) => current.as_ref() == Some(&left.room_id),
            ChatEvent::MessageReceived(message) => current.as_ref() == Some(&message.room_id),
        }
    }
}

#[async_trait]
impl EventHandler for ConnectionForwarder {
    async fn handle(&self, event: &ChatEvent) -> Result<(), EventError> {
        if !self.should_forward(event).await {
            return Ok(());
        }

        let frame = ServerMessage::event(event)
            .and_then(|message| serde_json::to_string(&message))
            .map_err(|e| EventError::non_retryable(e.to_string()))?;

        debug!(session_id = %self.session_id, kind = %event.kind(), "Forwarding event");
        self.outbound.send(frame).map_err(|_| EventError::Closed)
    }

    fn name(&self) -> &'static str {
        "ConnectionForwarder"
    }
}
