use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::coordinator::Coordinator;

/// Shared application state handed to every HTTP and WebSocket handler
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
}

impl AppState {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

/// Every way a coordination request can be rejected.
///
/// All variants are local validation failures: the caller fixes its input
/// or its state and tries again. None of them leave shared state modified.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    #[error("A room named {0:?} already exists")]
    DuplicateRoomName(String),

    #[error("Room not found: {0}")]
    RoomNotFound(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session {session_id} is not a member of room {room_id}")]
    NotAMember { room_id: String, session_id: String },

    #[error("Message text cannot be empty")]
    EmptyMessage,

    #[error("Session {0} is not connected")]
    NotConnected(String),
}

impl AppError {
    /// Stable machine-readable name of the error kind, used on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidName(_) => "InvalidName",
            AppError::DuplicateRoomName(_) => "DuplicateRoomName",
            AppError::RoomNotFound(_) => "RoomNotFound",
            AppError::SessionNotFound(_) => "SessionNotFound",
            AppError::NotAMember { .. } => "NotAMember",
            AppError::EmptyMessage => "EmptyMessage",
            AppError::NotConnected(_) => "NotConnected",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidName(_) | AppError::EmptyMessage => StatusCode::BAD_REQUEST,
            AppError::DuplicateRoomName(_) => StatusCode::CONFLICT,
            AppError::RoomNotFound(_) | AppError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            AppError::NotAMember { .. } => StatusCode::FORBIDDEN,
            AppError::NotConnected(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));

        (self.status(), body).into_response()
    }
}
