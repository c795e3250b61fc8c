use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

use crate::coordinator::CoordinatorConfig;
use crate::event::DispatcherConfig;

/// Server settings; every flag can also come from the environment
#[derive(Debug, Clone, Parser)]
#[command(name = "roomcast")]
#[command(about = "Real-time room chat coordination server")]
pub struct ServerConfig {
    /// Address the HTTP and WebSocket listener binds to
    #[arg(long, env = "ROOMCAST_BIND", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// Rooms created at startup
    #[arg(
        long = "seed-room",
        env = "ROOMCAST_SEED_ROOMS",
        value_delimiter = ',',
        default_value = "General,Design"
    )]
    pub seed_rooms: Vec<String>,

    /// Messages kept per room (0 = unbounded)
    #[arg(long, env = "ROOMCAST_TRANSCRIPT_CAPACITY", default_value_t = 1000)]
    pub transcript_capacity: usize,

    #[arg(long, env = "ROOMCAST_HANDLER_TIMEOUT_MS", default_value_t = 5000)]
    pub handler_timeout_ms: u64,

    #[arg(long, env = "ROOMCAST_HANDLER_MAX_RETRIES", default_value_t = 3)]
    pub handler_max_retries: u32,
}

impl ServerConfig {
    pub fn coordinator(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            transcript_capacity: self.transcript_capacity,
            dispatcher: DispatcherConfig {
                handler_timeout: Duration::from_millis(self.handler_timeout_ms),
                max_retries: self.handler_max_retries,
            },
        }
    }
}
