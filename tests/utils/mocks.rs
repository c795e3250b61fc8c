use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;

use roomcast::event::EventError;
use roomcast::{ChatEvent, EventHandler, EventKind};

// ============================================================================
// Recording Event Handler
// ============================================================================

/// Remembers every event it is handed, in delivery order
#[derive(Default)]
pub struct EventRecorder {
    events: Mutex<Vec<ChatEvent>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivery is asynchronous; give the delivery task time to catch up.
    /// Only for checking that something did *not* happen.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    pub async fn events(&self) -> Vec<ChatEvent> {
        self.settle().await;
        self.events.lock().await.clone()
    }

    /// Waits until `count` events of `kind` have been delivered and returns
    /// everything recorded so far. Delivery is FIFO, so every event published
    /// before the awaited one is included.
    pub async fn wait_for(&self, kind: EventKind, count: usize) -> Vec<ChatEvent> {
        let waited = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                {
                    let events = self.events.lock().await;
                    if events.iter().filter(|e| e.kind() == kind).count() >= count {
                        return events.clone();
                    }
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;

        match waited {
            Ok(events) => events,
            Err(_) => panic!(
                "timed out waiting for {} {} events, got {:?}",
                count,
                kind,
                self.kinds_now().await
            ),
        }
    }

    pub async fn kinds_now(&self) -> Vec<EventKind> {
        self.events.lock().await.iter().map(|e| e.kind()).collect()
    }

    /// Forget everything up to and including the `count`th event of `kind`
    pub async fn clear_after(&self, kind: EventKind, count: usize) {
        self.wait_for(kind, count).await;
        let mut events = self.events.lock().await;
        let mut seen = 0;
        let cut = events
            .iter()
            .position(|e| {
                if e.kind() == kind {
                    seen += 1;
                }
                seen == count
            })
            .map_or(0, |i| i + 1);
        events.drain(..cut);
    }
}

#[async_trait]
impl EventHandler for EventRecorder {
    async fn handle(&self, event: &ChatEvent) -> Result<(), EventError> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "EventRecorder"
    }
}
