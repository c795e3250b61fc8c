use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use super::models::{RoomEntry, RoomId, RoomSummary};
use crate::event::{ChatEvent, EventDispatcher, EventKind, RoomCreated, UserJoined, UserLeft};
use crate::message::Message;
use crate::session::{Session, SessionId, SessionRegistry};
use crate::shared::AppError;

/// Rooms in creation order plus their lookup indexes
#[derive(Default)]
struct RoomArena {
    entries: Vec<Arc<RoomEntry>>,
    by_id: HashMap<RoomId, usize>,
    /// Trimmed, lowercased names
    names: HashSet<String>,
}

/// The room a session currently occupies. Locking it serializes that session's joins and leaves.
type MembershipSlot = Arc<Mutex<Option<RoomId>>>;

/// Result of a successful join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub room: RoomSummary,
    /// Room the session was implicitly removed from
    pub left: Option<RoomId>,
}

/// Owns every room, its membership and its transcript.
///
/// Lock order, outermost first: membership slot, room state (ascending arena
/// index), dispatcher kind lock, arena read lock. The arena lock is never held
/// while waiting for a room.
pub struct RoomDirectory {
    arena: RwLock<RoomArena>,
    memberships: RwLock<HashMap<SessionId, MembershipSlot>>,
    registry: Arc<SessionRegistry>,
    dispatcher: Arc<EventDispatcher>,
    transcript_capacity: usize,
}

impl RoomDirectory {
    pub fn new(
        registry: Arc<SessionRegistry>,
        dispatcher: Arc<EventDispatcher>,
        transcript_capacity: usize,
    ) -> Self {
        Self {
            arena: RwLock::new(RoomArena::default()),
            memberships: RwLock::new(HashMap::new()),
            registry,
            dispatcher,
            transcript_capacity,
        }
    }

    pub fn transcript_capacity(&self) -> usize {
        self.transcript_capacity
    }

    /// All rooms in creation order
    pub async fn list_rooms(&self) -> Vec<RoomSummary> {
        let arena = self.arena.read().await;
        arena.entries.iter().map(|entry| entry.summary()).collect()
    }

    pub async fn get(&self, room_id: &RoomId) -> Result<RoomSummary, AppError> {
        Ok(self.entry(room_id).await?.summary())
    }

    pub(crate) async fn entry(&self, room_id: &RoomId) -> Result<Arc<RoomEntry>, AppError> {
        let arena = self.arena.read().await;
        arena
            .by_id
            .get(room_id)
            .map(|&index| Arc::clone(&arena.entries[index]))
            .ok_or_else(|| AppError::RoomNotFound(room_id.to_string()))
    }

    #[instrument(skip(self))]
    pub async fn create_room(&self, name: &str) -> Result<RoomSummary, AppError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(AppError::InvalidName(name.to_string()));
        }

        let summary = {
            let mut arena = self.arena.write().await;

            if !arena.names.insert(trimmed.to_lowercase()) {
                warn!(name = %trimmed, "Room name already taken");
                return Err(AppError::DuplicateRoomName(trimmed.to_string()));
            }

            let mut id = RoomId::generate();
            while arena.by_id.contains_key(&id) {
                debug!(room_id = %id, "Generated room id collided, regenerating");
                id = RoomId::generate();
            }

            let index = arena.entries.len();
            let entry = Arc::new(RoomEntry::new(id.clone(), trimmed.to_string(), index));
            arena.by_id.insert(id, index);
            arena.entries.push(Arc::clone(&entry));
            entry.summary()
        };

        info!(room_id = %summary.id, name = %summary.name, "Room created");

        self.dispatcher
            .publish(ChatEvent::RoomCreated(RoomCreated {
                id: summary.id.clone(),
                name: summary.name.clone(),
            }))
            .await;
        self.publish_room_list().await;

        Ok(summary)
    }

    /// Moves the session into the room, leaving its previous room in the same step
    #[instrument(skip(self))]
    pub async fn join(
        &self,
        room_id: &RoomId,
        session_id: &SessionId,
    ) -> Result<JoinOutcome, AppError> {
        let target = self.entry(room_id).await?;
        let slot = self.slot(session_id).await;
        let mut current = slot.lock().await;

        // Checked under the slot lock: a disconnect that already released this
        // session cannot be undone by a join that was racing with it.
        let session = match self.registry.lookup(session_id).await {
            Some(session) => session,
            None => {
                drop(current);
                self.discard_slot(session_id, &slot).await;
                return Err(AppError::SessionNotFound(session_id.to_string()));
            }
        };

        if current.as_ref() == Some(room_id) {
            debug!(room_id = %room_id, session_id = %session_id, "Session already in room");
            return Ok(JoinOutcome {
                room: target.summary(),
                left: None,
            });
        }

        let previous = match current.as_ref() {
            Some(previous_id) => Some(self.entry(previous_id).await?),
            None => None,
        };

        let mut target_state;
        let mut previous_state;
        match &previous {
            Some(prev) if prev.index < target.index => {
                previous_state = Some(prev.state.lock().await);
                target_state = target.state.lock().await;
            }
            Some(prev) => {
                target_state = target.state.lock().await;
                previous_state = Some(prev.state.lock().await);
            }
            None => {
                target_state = target.state.lock().await;
                previous_state = None;
            }
        }

        if let (Some(prev), Some(state)) = (&previous, previous_state.as_mut()) {
            state.remove_member(session_id);
            prev.sync_member_count(&**state);
        }
        target_state.add_member(session_id.clone());
        target.sync_member_count(&target_state);
        *current = Some(room_id.clone());

        info!(
            room_id = %room_id,
            session_id = %session_id,
            left_room = ?previous.as_ref().map(|p| p.id.as_str()),
            member_count = target_state.member_ids.len(),
            "Session joined room"
        );

        if let Some(prev) = &previous {
            self.dispatcher
                .publish(ChatEvent::UserLeft(UserLeft {
                    room_id: prev.id.clone(),
                    user_id: session_id.clone(),
                }))
                .await;
        }
        self.dispatcher
            .publish(ChatEvent::UserJoined(UserJoined {
                room_id: room_id.clone(),
                user: session,
            }))
            .await;
        self.publish_room_list().await;

        Ok(JoinOutcome {
            room: target.summary(),
            left: previous.as_ref().map(|prev| prev.id.clone()),
        })
    }

    /// Removes the session from the room. Returns false if it was not a member.
    #[instrument(skip(self))]
    pub async fn leave(&self, room_id: &RoomId, session_id: &SessionId) -> Result<bool, AppError> {
        let room = self.entry(room_id).await?;
        let slot = match self.memberships.read().await.get(session_id) {
            Some(slot) => Arc::clone(slot),
            None => return Ok(false),
        };

        let mut current = slot.lock().await;
        if current.as_ref() != Some(room_id) {
            debug!(room_id = %room_id, session_id = %session_id, "Leave ignored, not a member");
            return Ok(false);
        }

        self.remove_and_announce(&room, session_id).await;
        *current = None;
        Ok(true)
    }

    /// Leaves whatever room the session is in and forgets its membership slot.
    ///
    /// Called once the session is unregistered.
    #[instrument(skip(self))]
    pub async fn release(&self, session_id: &SessionId) {
        let slot = match self.memberships.write().await.remove(session_id) {
            Some(slot) => slot,
            None => return,
        };

        let mut current = slot.lock().await;
        if let Some(room_id) = current.take() {
            match self.entry(&room_id).await {
                Ok(room) => self.remove_and_announce(&room, session_id).await,
                Err(e) => warn!(room_id = %room_id, error = %e, "Released session held unknown room"),
            }
        }
    }

    pub async fn current_room(&self, session_id: &SessionId) -> Option<RoomId> {
        let slot = Arc::clone(self.memberships.read().await.get(session_id)?);
        let current = slot.lock().await;
        current.clone()
    }

    /// Live members of the room; members whose session is gone are skipped
    pub async fn members_of(&self, room_id: &RoomId) -> Result<Vec<Session>, AppError> {
        let room = self.entry(room_id).await?;
        let member_ids = room.state.lock().await.member_ids.clone();
        Ok(self.registry.resolve(&member_ids).await)
    }

    /// Messages in order, optionally only those after `after`, at most `limit` of them
    pub async fn transcript(
        &self,
        room_id: &RoomId,
        after: Option<u64>,
        limit: Option<usize>,
    ) -> Result<Vec<Message>, AppError> {
        let room = self.entry(room_id).await?;
        let state = room.state.lock().await;
        let messages = state
            .transcript
            .iter()
            .filter(|message| after.map_or(true, |after| message.order > after))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(messages)
    }

    /// Publishes a fresh room list snapshot
    pub async fn publish_room_list(&self) {
        self.dispatcher
            .publish_with(EventKind::RoomListChanged, || async {
                ChatEvent::RoomListChanged(self.list_rooms().await)
            })
            .await;
    }

    /// Caller must hold the session's membership slot
    async fn remove_and_announce(&self, room: &RoomEntry, session_id: &SessionId) {
        let mut state = room.state.lock().await;
        if !state.remove_member(session_id) {
            return;
        }
        room.sync_member_count(&state);

        info!(
            room_id = %room.id,
            session_id = %session_id,
            member_count = state.member_ids.len(),
            "Session left room"
        );

        self.dispatcher
            .publish(ChatEvent::UserLeft(UserLeft {
                room_id: room.id.clone(),
                user_id: session_id.clone(),
            }))
            .await;
        self.publish_room_list().await;
    }

    async fn slot(&self, session_id: &SessionId) -> MembershipSlot {
        if let Some(slot) = self.memberships.read().await.get(session_id) {
            return Arc::clone(slot);
        }
        let mut memberships = self.memberships.write().await;
        Arc::clone(memberships.entry(session_id.clone()).or_default())
    }

    async fn discard_slot(&self, session_id: &SessionId, slot: &MembershipSlot) {
        let mut memberships = self.memberships.write().await;
        if memberships
            .get(session_id)
            .is_some_and(|existing| Arc::ptr_eq(existing, slot))
        {
            memberships.remove(session_id);
        }
    }
}
