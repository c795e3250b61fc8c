use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::events::ChatEvent;

/// Errors that can occur when a handle processes an event
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Handler timed out")]
    Timeout,

    #[error("Retryable error: {0}")]
    Retryable(String),

    #[error("Non-retryable error: {0}")]
    NonRetryable(String),

    #[error("Handler panicked: {0}")]
    Panic(String),

    #[error("Delivery target is closed")]
    Closed,
}

impl EventError {
    /// Whether this error indicates the operation should be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, EventError::Retryable(_) | EventError::Timeout)
    }

    pub fn retryable(msg: impl Into<String>) -> Self {
        EventError::Retryable(msg.into())
    }

    pub fn non_retryable(msg: impl Into<String>) -> Self {
        EventError::NonRetryable(msg.into())
    }
}

/// Delivery target behind a dispatcher handle.
///
/// Implementations push the event to whatever they front (a socket, a queue,
/// a log). Each handler runs on its own delivery task, so a slow handler only
/// delays its own backlog.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &ChatEvent) -> Result<(), EventError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Forwards every event into an unbounded channel
pub struct ChannelHandler {
    name: &'static str,
    sender: mpsc::UnboundedSender<ChatEvent>,
}

impl ChannelHandler {
    pub fn new(name: &'static str) -> (Self, mpsc::UnboundedReceiver<ChatEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { name, sender }, receiver)
    }
}

#[async_trait]
impl EventHandler for ChannelHandler {
    async fn handle(&self, event: &ChatEvent) -> Result<(), EventError> {
        self.sender
            .send(event.clone())
            .map_err(|_| EventError::Closed)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
