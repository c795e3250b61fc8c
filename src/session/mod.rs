// Public API - what other modules can use
pub use models::{Session, SessionId};
pub use registry::SessionRegistry;

// Internal modules
pub mod models;
mod registry;
