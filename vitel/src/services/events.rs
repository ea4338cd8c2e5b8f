//! Service lifecycle events.
//!
//! Registration and init settlement are broadcast so hosts can observe
//! services without polling them, including init failures nobody awaited.

use tokio::sync::broadcast;

/// Events broadcast over a service's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
    /// A service was registered. `replaced` is set when an earlier
    /// registration under the same name was overwritten.
    Registered { name: String, replaced: bool },
    /// A memoized init settled.
    InitSettled { name: String, ok: bool },
}

impl ServiceEvent {
    /// Get a description of the event for logging.
    pub fn description(&self) -> String {
        match self {
            Self::Registered { name, replaced } => {
                format!("Service registered: {} (replaced={})", name, replaced)
            }
            Self::InitSettled { name, ok } => {
                format!("Service init settled: {} (ok={})", name, ok)
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Registered { name, .. } | Self::InitSettled { name, .. } => name,
        }
    }
}

/// Default channel capacity for service events.
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Broadcaster for service lifecycle events.
#[derive(Clone)]
pub struct ServiceEventBroadcaster {
    sender: broadcast::Sender<ServiceEvent>,
}

impl ServiceEventBroadcaster {
    /// Create a new broadcaster with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new broadcaster with specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServiceEvent> {
        self.sender.subscribe()
    }

    /// Publish an event.
    ///
    /// Returns the number of receivers that received the event.
    pub fn publish(&self, event: ServiceEvent) -> usize {
        tracing::debug!("Publishing service event: {}", event.description());
        // send() returns Err if there are no receivers, which is fine
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ServiceEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
