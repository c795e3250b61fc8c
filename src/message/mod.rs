// Public API - what other modules can use
pub use models::{Message, MessageId};
pub use sequencer::MessageSequencer;

// Internal modules
pub mod models;
mod sequencer;
