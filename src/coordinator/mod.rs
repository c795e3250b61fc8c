// Public API - what other modules can use
pub use service::Coordinator;
pub use types::{ConnectionState, CoordinatorConfig};

// Internal modules
mod service;
mod types;
