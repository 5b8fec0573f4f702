//! Review domain type.

use chrono::{DateTime, Utc};
use serde::Serialize;

use clementine_core::{OrderId, ProductId, ReviewId, UserId};

/// A product review, one per (user, product).
///
/// Submission is gated on a delivered order containing the product.
/// Approval folds the rating into the product's rolling aggregate;
/// un-approving removes it again.
#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub id: ReviewId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub order_id: OrderId,
    /// 1 through 5.
    pub rating: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub comment: String,
    pub is_approved: bool,
    pub is_visible: bool,
    pub is_abusive: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    /// Whether the review shows up on the public product page.
    #[must_use]
    pub const fn is_public(&self) -> bool {
        self.is_approved && self.is_visible && !self.is_abusive
    }
}
