use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use crate::message::Message;
use crate::session::SessionId;

/// Opaque identifier of a room
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Random pet name, e.g. `quiet-otter`
    pub fn generate() -> Self {
        Self(petname::Petnames::default().generate_one(2, "-"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RoomId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Public view of a room as shown in room lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: RoomId,
    pub name: String,
    pub member_count: usize,
}

/// Mutable part of a room, guarded by the room's own lock
#[derive(Debug, Default)]
pub(crate) struct RoomState {
    /// Insertion ordered, no duplicates
    pub member_ids: Vec<SessionId>,
    /// Order assigned to the next appended message
    pub sequence: u64,
    /// Timestamp of the newest message, kept even when the transcript is trimmed
    pub last_created_at: Option<DateTime<Utc>>,
    pub transcript: VecDeque<Message>,
}

impl RoomState {
    pub fn has_member(&self, session_id: &SessionId) -> bool {
        self.member_ids.contains(session_id)
    }

    /// Returns false if the session was already a member
    pub fn add_member(&mut self, session_id: SessionId) -> bool {
        if self.has_member(&session_id) {
            return false;
        }
        self.member_ids.push(session_id);
        true
    }

    /// Returns false if the session was not a member
    pub fn remove_member(&mut self, session_id: &SessionId) -> bool {
        let before = self.member_ids.len();
        self.member_ids.retain(|id| id != session_id);
        self.member_ids.len() != before
    }

    /// Appends to the transcript, dropping the oldest entries beyond `capacity`
    /// (0 means unbounded)
    pub fn record(&mut self, message: Message, capacity: usize) {
        self.last_created_at = Some(message.created_at);
        self.transcript.push_back(message);
        if capacity > 0 {
            while self.transcript.len() > capacity {
                self.transcript.pop_front();
            }
        }
    }
}

/// A room slot in the directory arena
#[derive(Debug)]
pub(crate) struct RoomEntry {
    pub id: RoomId,
    pub name: String,
    /// Position in the arena, also the lock acquisition rank
    pub index: usize,
    /// Mirror of `state.member_ids.len()`, readable without the room lock
    member_count: AtomicUsize,
    pub state: Mutex<RoomState>,
}

impl RoomEntry {
    pub fn new(id: RoomId, name: String, index: usize) -> Self {
        Self {
            id,
            name,
            index,
            member_count: AtomicUsize::new(0),
            state: Mutex::new(RoomState::default()),
        }
    }

    pub fn member_count(&self) -> usize {
        self.member_count.load(Ordering::Acquire)
    }

    /// Must be called while holding `state`
    pub fn sync_member_count(&self, state: &RoomState) {
        self.member_count
            .store(state.member_ids.len(), Ordering::Release);
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            member_count: self.member_count(),
        }
    }
}
