// Library crate for the roomcast chat coordination server
// This file exposes the public API for the binary and integration tests

pub mod config;
pub mod coordinator;
pub mod event;
pub mod message;
pub mod room;
pub mod session;
pub mod shared;
pub mod websockets;

use axum::{routing::get, Router};

// Re-export commonly used types for easier access in tests
pub use config::ServerConfig;
pub use coordinator::{ConnectionState, Coordinator, CoordinatorConfig};
pub use event::{ChatEvent, EventDispatcher, EventHandler, EventKind};
pub use message::Message;
pub use room::{RoomId, RoomSummary};
pub use session::{Session, SessionId};
pub use shared::{AppError, AppState};

/// HTTP and WebSocket routes over the shared state
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/rooms", get(room::list_rooms))
        .route("/rooms/:room_id/members", get(room::room_members))
        .route("/rooms/:room_id/messages", get(room::room_messages))
        .route("/ws", get(websockets::websocket_handler))
        .with_state(state)
}
