//! Fan-out of [`ViewEvent`]s from one chat view to its renderers.
//!
//! A renderer that falls more than `capacity` events behind sees
//! `RecvError::Lagged` and should re-read the view's current state instead
//! of replaying events.

use tokio::sync::broadcast;
use tracing::trace;

use super::ViewEvent;

/// Capacity used by [`ChatView`](crate::view::ChatView).
pub const DEFAULT_CAPACITY: usize = 256;

/// Clonable publisher for view events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ViewEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.sender.subscribe()
    }

    /// Deliver `event` to current subscribers. Returns how many received it.
    pub fn publish(&self, event: ViewEvent) -> usize {
        let name = event.name();
        let delivered = self.sender.send(event).unwrap_or(0);
        trace!(event = name, delivered, "View event published");
        delivered
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}
