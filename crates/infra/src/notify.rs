//! Order status notifications.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use stockroom_core::OrderId;
use stockroom_orders::OrderStatus;

/// Payload published after a status change commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusNotification {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub changed: bool,
    pub stock_deducted: bool,
    pub stock_restored: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Sink for status notifications.
///
/// Delivery is fire and forget: the status change has already committed by
/// the time `notify` runs, and a missing or failed subscriber must not undo
/// or fail it.
pub trait StatusNotifier: Send + Sync {
    fn notify(&self, notification: StatusNotification);
}

impl<N: StatusNotifier + ?Sized> StatusNotifier for Arc<N> {
    fn notify(&self, notification: StatusNotification) {
        (**self).notify(notification)
    }
}

/// Notifier that writes to the log. Used when no realtime channel is wired.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl StatusNotifier for LogNotifier {
    fn notify(&self, n: StatusNotification) {
        tracing::info!(
            order_id = %n.order_id,
            status = %n.status,
            changed = n.changed,
            stock_deducted = n.stock_deducted,
            stock_restored = n.stock_restored,
            "order status changed"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<StatusNotification>>,
    }

    impl StatusNotifier for Recorder {
        fn notify(&self, notification: StatusNotification) {
            self.seen.lock().unwrap().push(notification);
        }
    }

    #[test]
    fn notifies_through_arc_dyn() {
        let recorder = Arc::new(Recorder::default());
        let notifier: Arc<dyn StatusNotifier> = recorder.clone();
        notifier.notify(StatusNotification {
            order_id: OrderId::new(),
            status: OrderStatus::Paid,
            changed: true,
            stock_deducted: true,
            stock_restored: false,
            occurred_at: Utc::now(),
        });
        assert_eq!(recorder.seen.lock().unwrap().len(), 1);
    }
}
