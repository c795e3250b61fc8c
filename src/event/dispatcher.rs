use futures::FutureExt;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strum::EnumCount;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::{
    events::{ChatEvent, EventKind},
    handler::{EventError, EventHandler},
};

/// Delivery tuning for every handle attached to a dispatcher
#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    pub handler_timeout: Duration,
    pub max_retries: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            handler_timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle-{}", self.0)
    }
}

/// A registered delivery target.
///
/// Publishing to a handle only enqueues the event; a dedicated task drains the
/// queue into the handler in FIFO order.
#[derive(Clone)]
pub struct Handle {
    id: HandleId,
    name: &'static str,
    queue: mpsc::UnboundedSender<Arc<ChatEvent>>,
}

impl Handle {
    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn enqueue(&self, event: Arc<ChatEvent>) -> bool {
        self.queue.send(event).is_ok()
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

type SubscriberSet = BTreeMap<HandleId, Handle>;

/// Publish/subscribe hub keyed by event kind.
///
/// Each kind has its own subscriber set behind its own lock. `publish` holds
/// that lock while enqueueing to every subscriber, so all subscribers of a kind
/// observe its events in one and the same order.
pub struct EventDispatcher {
    channels: [Mutex<SubscriberSet>; EventKind::COUNT],
    next_handle: AtomicU64,
    config: DispatcherConfig,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(DispatcherConfig::default())
    }
}

impl EventDispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            channels: std::array::from_fn(|_| Mutex::new(BTreeMap::new())),
            next_handle: AtomicU64::new(1),
            config,
        }
    }

    fn channel(&self, kind: EventKind) -> &Mutex<SubscriberSet> {
        &self.channels[kind.index()]
    }

    /// Wraps a handler in a handle and spawns its delivery task.
    ///
    /// Must be called from within a tokio runtime. The task ends once every
    /// clone of the handle is dropped (or detached) and the backlog is drained.
    pub fn attach(&self, handler: Arc<dyn EventHandler>) -> Handle {
        let id = HandleId(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let name = handler.name();
        let (queue, backlog) = mpsc::unbounded_channel();

        info!(handle = %id, handler = name, "Attaching event handler");
        tokio::spawn(run_delivery(id, handler, backlog, self.config));

        Handle { id, name, queue }
    }

    /// Adds the handle to the kind's subscriber set. Returns false if it was already there.
    pub async fn subscribe(&self, kind: EventKind, handle: &Handle) -> bool {
        let inserted = self
            .channel(kind)
            .lock()
            .await
            .insert(handle.id, handle.clone())
            .is_none();

        debug!(kind = %kind, handle = %handle.id, inserted, "Subscribe");
        inserted
    }

    pub async fn subscribe_all(
        &self,
        kinds: impl IntoIterator<Item = EventKind>,
        handle: &Handle,
    ) {
        for kind in kinds {
            self.subscribe(kind, handle).await;
        }
    }

    /// Removes the handle from the kind's subscriber set. Returns false if it was not there.
    pub async fn unsubscribe(&self, kind: EventKind, handle: &Handle) -> bool {
        let removed = self
            .channel(kind)
            .lock()
            .await
            .remove(&handle.id)
            .is_some();

        debug!(kind = %kind, handle = %handle.id, removed, "Unsubscribe");
        removed
    }

    /// Removes the handle from every kind. Its delivery task stops after the backlog.
    pub async fn detach(&self, handle: &Handle) {
        for channel in &self.channels {
            channel.lock().await.remove(&handle.id);
        }
        info!(handle = %handle.id, handler = handle.name, "Detached event handler");
    }

    pub async fn subscriber_count(&self, kind: EventKind) -> usize {
        self.channel(kind).lock().await.len()
    }

    /// Delivers the event to every current subscriber of its kind.
    ///
    /// Returns the number of handles the event was queued for.
    pub async fn publish(&self, event: ChatEvent) -> usize {
        let kind = event.kind();
        let mut subscribers = self.channel(kind).lock().await;
        fan_out(kind, &mut subscribers, event)
    }

    /// Like `publish`, but builds the event while holding the kind's lock.
    ///
    /// Snapshot events must be produced this way, otherwise two concurrent
    /// publishers can deliver their snapshots newest-first.
    pub async fn publish_with<F, Fut>(&self, kind: EventKind, produce: F) -> usize
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ChatEvent>,
    {
        let mut subscribers = self.channel(kind).lock().await;
        let event = produce().await;
        debug_assert_eq!(event.kind(), kind);
        fan_out(kind, &mut subscribers, event)
    }
}

fn fan_out(kind: EventKind, subscribers: &mut SubscriberSet, event: ChatEvent) -> usize {
    let event = Arc::new(event);

    subscribers.retain(|id, handle| {
        let queued = handle.enqueue(Arc::clone(&event));
        if !queued {
            warn!(kind = %kind, handle = %id, "Dropping subscriber with closed queue");
        }
        queued
    });

    debug!(kind = %kind, receivers = subscribers.len(), "Event published");
    subscribers.len()
}

async fn run_delivery(
    id: HandleId,
    handler: Arc<dyn EventHandler>,
    mut backlog: mpsc::UnboundedReceiver<Arc<ChatEvent>>,
    config: DispatcherConfig,
) {
    while let Some(event) = backlog.recv().await {
        if let Err(e) = handle_with_retry(handler.as_ref(), &event, config).await {
            error!(
                handle = %id,
                handler = handler.name(),
                kind = %event.kind(),
                error = %e,
                "Event delivery failed permanently"
            );
        }
    }

    debug!(handle = %id, handler = handler.name(), "Delivery task stopped");
}

/// Runs the handler with a timeout, catching panics and retrying retryable failures
async fn handle_with_retry(
    handler: &dyn EventHandler,
    event: &ChatEvent,
    config: DispatcherConfig,
) -> Result<(), EventError> {
    let mut attempt: u32 = 0;

    loop {
        let outcome = match timeout(
            config.handler_timeout,
            AssertUnwindSafe(handler.handle(event)).catch_unwind(),
        )
        .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(EventError::Panic(panic_message(panic))),
            Err(_elapsed) => Err(EventError::Timeout),
        };

        match outcome {
            Ok(()) => {
                if attempt > 0 {
                    info!(
                        handler = handler.name(),
                        kind = %event.kind(),
                        attempt = attempt + 1,
                        "Handler succeeded after retry"
                    );
                }
                return Ok(());
            }
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                warn!(
                    handler = handler.name(),
                    kind = %event.kind(),
                    attempt = attempt + 1,
                    error = %e,
                    "Handler failed, will retry"
                );

                // Exponential backoff
                let delay = Duration::from_millis(100 * 2_u64.pow(attempt));
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
