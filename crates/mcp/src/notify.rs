// Server-side fan-out of JSON-RPC notifications

use crate::protocol::Notification;
use tokio::sync::broadcast;

pub const REMINDERS_CHANGED: &str = "notifications/reminders/changed";
pub const INFO_CHANGED: &str = "notifications/info/changed";

/// Broadcast hub for notifications pushed to SSE subscribers.
///
/// Cloning is cheap; all clones share one channel. Publishing with no
/// subscribers is not an error.
#[derive(Clone)]
pub struct NotificationHub {
    sender: broadcast::Sender<Notification>,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, method: &str, params: serde_json::Value) {
        let notification = Notification::new(method, Some(params));
        match self.sender.send(notification) {
            Ok(receivers) => tracing::debug!("Published {} to {} subscribers", method, receivers),
            Err(_) => tracing::trace!("Dropped {} (no subscribers)", method),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(64)
    }
}
