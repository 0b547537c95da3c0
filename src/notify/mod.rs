//! Change notifications.
//!
//! Fire-and-forget: a notifier never fails the operation that triggered it.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

/// Observable state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// Blocking was suspended or resumed.
    SuppressionStateChanged,

    /// The block list changed. Also serves as the backup "data changed" signal.
    BlockedNumbersChanged,
}

/// Sink for change events.
pub trait ChangeNotifier: Send + Sync {
    fn notify(&self, event: ChangeEvent);
}

/// Shared notifier handle.
pub type SharedNotifier = Arc<dyn ChangeNotifier>;

/// Fans events out to any number of subscribers.
///
/// Events published with no subscriber are dropped.
pub struct BroadcastNotifier {
    tx: broadcast::Sender<ChangeEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Arc<Self> {
        let (tx, _) = broadcast::channel(capacity);
        Arc::new(Self { tx })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }
}

impl ChangeNotifier for BroadcastNotifier {
    fn notify(&self, event: ChangeEvent) {
        debug!(event = ?event, "publishing change");
        let _ = self.tx.send(event);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl ChangeNotifier for NoopNotifier {
    fn notify(&self, _event: ChangeEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_fanout() {
        let notifier = BroadcastNotifier::new(8);
        let mut rx1 = notifier.subscribe();
        let mut rx2 = notifier.subscribe();
        assert_eq!(notifier.subscriber_count(), 2);

        notifier.notify(ChangeEvent::BlockedNumbersChanged);

        assert_eq!(rx1.recv().await.unwrap(), ChangeEvent::BlockedNumbersChanged);
        assert_eq!(rx2.recv().await.unwrap(), ChangeEvent::BlockedNumbersChanged);
    }

    #[test]
    fn test_notify_without_subscribers() {
        let notifier = BroadcastNotifier::default();
        notifier.notify(ChangeEvent::SuppressionStateChanged);
        NoopNotifier.notify(ChangeEvent::SuppressionStateChanged);
    }
}
