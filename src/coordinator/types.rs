use serde::Serialize;

use crate::event::DispatcherConfig;
use crate::room::RoomId;

/// Knobs for the core, built from the server config or by library users directly
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    /// Messages kept per room; 0 keeps everything
    pub transcript_capacity: usize,
    pub dispatcher: DispatcherConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            transcript_capacity: 1000,
            dispatcher: DispatcherConfig::default(),
        }
    }
}

/// Where a session is in its connection lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "roomId", rename_all = "kebab-case")]
pub enum ConnectionState {
    Disconnected,
    Connected,
    InRoom(RoomId),
}
