use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::models::{Message, MessageId};
use crate::event::{ChatEvent, EventDispatcher};
use crate::room::{RoomDirectory, RoomId};
use crate::session::{SessionId, SessionRegistry};
use crate::shared::AppError;

/// Appends messages to room transcripts with a gap-free per-room order.
///
/// The order is taken from the room's sequence under the room lock and the
/// `message-received` event is published before that lock is released, so
/// every subscriber sees a room's messages in order.
pub struct MessageSequencer {
    directory: Arc<RoomDirectory>,
    registry: Arc<SessionRegistry>,
    dispatcher: Arc<EventDispatcher>,
}

impl MessageSequencer {
    pub fn new(
        directory: Arc<RoomDirectory>,
        registry: Arc<SessionRegistry>,
        dispatcher: Arc<EventDispatcher>,
    ) -> Self {
        Self {
            directory,
            registry,
            dispatcher,
        }
    }

    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn append(
        &self,
        room_id: &RoomId,
        session_id: &SessionId,
        text: &str,
    ) -> Result<Message, AppError> {
        let room = self.directory.entry(room_id).await?;

        if self.registry.lookup(session_id).await.is_none() {
            return Err(AppError::SessionNotFound(session_id.to_string()));
        }

        if text.trim().is_empty() {
            return Err(AppError::EmptyMessage);
        }

        let mut state = room.state.lock().await;

        if !state.has_member(session_id) {
            warn!(room_id = %room_id, session_id = %session_id, "Rejected message from non-member");
            return Err(AppError::NotAMember {
                room_id: room_id.to_string(),
                session_id: session_id.to_string(),
            });
        }

        // Wall clocks can step backwards; never let created_at contradict order
        let now = Utc::now();
        let created_at = match state.last_created_at {
            Some(last) if last > now => last,
            _ => now,
        };

        let message = Message {
            id: MessageId::generate(),
            room_id: room_id.clone(),
            sender_id: session_id.clone(),
            text: text.to_string(),
            order: state.sequence,
            created_at,
        };
        state.sequence += 1;
        state.record(message.clone(), self.directory.transcript_capacity());

        info!(
            room_id = %room_id,
            session_id = %session_id,
            order = message.order,
            "Message appended"
        );

        let receivers = self
            .dispatcher
            .publish(ChatEvent::MessageReceived(message.clone()))
            .await;
        debug!(message_id = %message.id, receivers, "Message fanned out");

        Ok(message)
    }
}
