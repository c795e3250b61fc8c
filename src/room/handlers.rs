use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use tracing::{info, instrument};

use super::models::{RoomId, RoomSummary};
use crate::message::Message;
use crate::session::Session;
use crate::shared::{AppError, AppState};

/// Query string for transcript reads
#[derive(Debug, Default, Deserialize)]
pub struct TranscriptQuery {
    /// Only messages with a greater order
    pub after: Option<u64>,
    pub limit: Option<usize>,
}

/// HTTP handler for listing all rooms
///
/// GET /rooms
/// Returns rooms in creation order with their member counts
#[instrument(name = "list_rooms", skip(state))]
pub async fn list_rooms(State(state): State<AppState>) -> Json<Vec<RoomSummary>> {
    let rooms = state.coordinator.list_rooms().await;
    info!(room_count = rooms.len(), "Rooms listed");
    Json(rooms)
}

/// GET /rooms/:room_id/members
#[instrument(name = "room_members", skip(state))]
pub async fn room_members(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<Session>>, AppError> {
    let members = state.coordinator.members(&RoomId::from(room_id)).await?;
    Ok(Json(members))
}

/// GET /rooms/:room_id/messages?after=&limit=
#[instrument(name = "room_messages", skip(state))]
pub async fn room_messages(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(query): Query<TranscriptQuery>,
) -> Result<Json<Vec<Message>>, AppError> {
    let messages = state
        .coordinator
        .transcript(&RoomId::from(room_id), query.after, query.limit)
        .await?;
    Ok(Json(messages))
}
