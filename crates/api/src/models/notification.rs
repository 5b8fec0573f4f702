//! Notification domain type.

use chrono::{DateTime, Utc};
use serde::Serialize;

use clementine_core::{
    NotificationAudience, NotificationId, NotificationKind, OrderId, ProductId, UserId,
};

/// A persisted event record, dual-audience (admin/customer).
///
/// Not a queue: created first, then broadcast best-effort over the socket
/// hub. A missed live event is reconciled by the notification list endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub audience: NotificationAudience,
    /// Set when `audience` is `customer`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
