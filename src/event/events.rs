use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{AsRefStr, Display, EnumCount, EnumIter};

use crate::message::Message;
use crate::room::{RoomId, RoomSummary};
use crate::session::{Session, SessionId};

/// The closed set of notification categories handles can subscribe to
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumCount,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum EventKind {
    Connect,
    Disconnect,
    RoomListChanged,
    RoomCreated,
    UserJoined,
    UserLeft,
    MessageReceived,
}

impl EventKind {
    /// Dense index, used to address per-kind subscriber tables
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomCreated {
    pub id: RoomId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserJoined {
    pub room_id: RoomId,
    pub user: Session,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLeft {
    pub room_id: RoomId,
    pub user_id: SessionId,
}

/// Facts about state changes that already happened, one typed payload per kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Connect(Session),
    Disconnect(SessionId),
    RoomListChanged(Vec<RoomSummary>),
    RoomCreated(RoomCreated),
    UserJoined(UserJoined),
    UserLeft(UserLeft),
    MessageReceived(Message),
}

impl ChatEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ChatEvent::Connect(_) => EventKind::Connect,
            ChatEvent::Disconnect(_) => EventKind::Disconnect,
            ChatEvent::RoomListChanged(_) => EventKind::RoomListChanged,
            ChatEvent::RoomCreated(_) => EventKind::RoomCreated,
            ChatEvent::UserJoined(_) => EventKind::UserJoined,
            ChatEvent::UserLeft(_) => EventKind::UserLeft,
            ChatEvent::MessageReceived(_) => EventKind::MessageReceived,
        }
    }

    /// Room the event is scoped to, if any
    pub fn room_id(&self) -> Option<&RoomId> {
        match self {
            ChatEvent::RoomCreated(created) => Some(&created.id),
            ChatEvent::UserJoined(joined) => Some(&joined.room_id),
            ChatEvent::UserLeft(left) => Some(&left.room_id),
            ChatEvent::MessageReceived(message) => Some(&message.room_id),
            ChatEvent::Connect(_) | ChatEvent::Disconnect(_) | ChatEvent::RoomListChanged(_) => {
                None
            }
        }
    }

    /// Session the event is about, if any
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            ChatEvent::Connect(session) => Some(&session.id),
            ChatEvent::Disconnect(session_id) => Some(session_id),
            ChatEvent::UserJoined(joined) => Some(&joined.user.id),
            ChatEvent::UserLeft(left) => Some(&left.user_id),
            ChatEvent::MessageReceived(message) => Some(&message.sender_id),
            ChatEvent::RoomListChanged(_) | ChatEvent::RoomCreated(_) => None,
        }
    }

    /// JSON payload as sent to clients
    pub fn wire_payload(&self) -> Result<Value, serde_json::Error> {
        match self {
            ChatEvent::Connect(session) => serde_json::to_value(session),
            ChatEvent::Disconnect(_) => Ok(Value::Null),
            ChatEvent::RoomListChanged(rooms) => serde_json::to_value(rooms),
            ChatEvent::RoomCreated(created) => serde_json::to_value(created),
            ChatEvent::UserJoined(joined) => serde_json::to_value(joined),
            ChatEvent::UserLeft(left) => serde_json::to_value(left),
            ChatEvent::MessageReceived(message) => serde_json::to_value(message),
        }
    }
}
