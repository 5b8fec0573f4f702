//! In-process notification fan-out.
//!
//! A single broadcast channel carries every outbound socket event; each
//! WebSocket connection subscribes and filters by audience. The hub is owned
//! by `AppState` and handed to whoever needs to emit, so nothing reaches for
//! a global. Delivery is best-effort: a full or receiver-less channel drops
//! the event, and the persisted notification row remains the source of truth.

use serde_json::Value;
use tokio::sync::broadcast;

use clementine_core::{NotificationAudience, UserId};

/// An event on its way out to connected sockets.
#[derive(Debug, Clone)]
pub struct OutboundEvent {
    pub audience: NotificationAudience,
    /// Set when the event is for one specific customer.
    pub user_id: Option<UserId>,
    /// Wire-level event name, e.g. `adminNotification`.
    pub event: &'static str,
    pub payload: Value,
}

impl OutboundEvent {
    /// Whether a connection authenticated as `(user_id, is_admin)` should
    /// receive this event.
    #[must_use]
    pub fn is_for(&self, user_id: UserId, is_admin: bool) -> bool {
        match self.audience {
            NotificationAudience::Admin => is_admin,
            NotificationAudience::Customer => self.user_id == Some(user_id),
        }
    }
}

/// Handle to the broadcast hub. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<OutboundEvent>,
}

impl Notifier {
    /// Create a hub with room for `capacity` in-flight events per receiver.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe a new socket connection.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<OutboundEvent> {
        self.tx.subscribe()
    }

    /// Emit to all connected admin sockets.
    pub fn emit_admin(&self, event: &'static str, payload: Value) {
        // A send error only means no one is listening right now.
        let _ = self.tx.send(OutboundEvent {
            audience: NotificationAudience::Admin,
            user_id: None,
            event,
            payload,
        });
    }

    /// Emit to one customer's connected sockets.
    pub fn emit_customer(&self, user_id: UserId, event: &'static str, payload: Value) {
        let _ = self.tx.send(OutboundEvent {
            audience: NotificationAudience::Customer,
            user_id: Some(user_id),
            event,
            payload,
        });
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_admin_event_reaches_admin_subscriber() {
        let hub = Notifier::new(8);
        let mut rx = hub.subscribe();
        hub.emit_admin("adminNotification", json!({"title": "New order"}));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, "adminNotification");
        assert!(event.is_for(UserId::new(1), true));
        assert!(!event.is_for(UserId::new(1), false));
    }

    #[tokio::test]
    async fn test_customer_event_targets_one_user() {
        let hub = Notifier::new(8);
        let mut rx = hub.subscribe();
        hub.emit_customer(UserId::new(7), "customerNotification", json!({}));

        let event = rx.recv().await.unwrap();
        assert!(event.is_for(UserId::new(7), false));
        assert!(!event.is_for(UserId::new(8), false));
        // Admins don't receive customer-addressed events through the
        // audience filter.
        assert!(!event.is_for(UserId::new(9), true));
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let hub = Notifier::new(8);
        hub.emit_admin("adminNotification", json!({}));
    }
}
