use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use strum_macros::AsRefStr;

use crate::event::ChatEvent;
use crate::room::RoomId;
use crate::shared::AppError;

/// Requests a client can send over its socket
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    JoinRoom,
    LeaveRoom,
    SendMessage,
    CreateRoom,
    ListRooms,
    RoomMembers,
    History,
}

/// Envelope of every client frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMessage {
    #[serde(rename = "type")]
    pub intent: IntentType,
    #[serde(default)]
    pub payload: Value,
}

/// Client -> Server message payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPayload {
    pub room_id: RoomId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub room_id: RoomId,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomPayload {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPayload {
    pub room_id: RoomId,
    pub after: Option<u64>,
    pub limit: Option<usize>,
}

/// Acknowledgements sent back for a client intent
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AckType {
    Joined,
    Left,
    Sent,
    Created,
    RoomList,
    Members,
    History,
    Error,
}

/// Base structure for every server frame, events and acks alike.
///
/// Events carry their kebab-case kind as `type` (`message-received`), acks
/// their snake_case name (`room_list`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub payload: Value,
}

impl ServerMessage {
    pub fn event(event: &ChatEvent) -> Result<Self, serde_json::Error> {
        Ok(Self {
            message_type: event.kind().to_string(),
            payload: event.wire_payload()?,
        })
    }

    pub fn ack(ack: AckType, payload: impl Serialize) -> Result<Self, serde_json::Error> {
        Ok(Self {
            message_type: ack.as_ref().to_string(),
            payload: serde_json::to_value(payload)?,
        })
    }

    pub fn error(error: &AppError) -> Self {
        Self::error_with_kind(error.kind(), &error.to_string())
    }

    /// Reply for frames that could not be understood at all
    pub fn invalid(message: &str) -> Self {
        Self::error_with_kind("InvalidMessage", message)
    }

    fn error_with_kind(kind: &str, message: &str) -> Self {
        Self {
            message_type: AckType::Error.as_ref().to_string(),
            payload: json!({ "kind": kind, "message": message }),
        }
    }
}
