//! Fill event broadcast

use common::model::fill::Fill;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

/// Broadcast channel carrying every fill the engine settles.
///
/// Subscribers that fall behind lose the oldest events; the fill stream is
/// observability, not the system of record.
pub struct FillFeed {
    sender: broadcast::Sender<Fill>,
}

impl FillFeed {
    /// Create a feed with the default buffer capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a feed buffering up to `capacity` undelivered fills
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all future fills
    pub fn subscribe(&self) -> broadcast::Receiver<Fill> {
        self.sender.subscribe()
    }

    /// Publish a fill. A send error only means nobody is listening.
    pub fn publish(&self, fill: Fill) {
        let _ = self.sender.send(fill);
    }
}

impl Default for FillFeed {
    fn default() -> Self {
        Self::new()
    }
}
