// Public API - what other modules can use
pub use directory::{JoinOutcome, RoomDirectory};
pub use handlers::{list_rooms, room_members, room_messages, TranscriptQuery};
pub use models::{RoomId, RoomSummary};

// Internal modules
mod directory;
mod handlers;
pub mod models;
