//! Product domain type.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use clementine_core::{CategoryId, ProductId};

/// A catalog item.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    /// Strike-through "was" price, shown when higher than `price`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
    pub stock: i32,
    pub images: Vec<String>,
    /// Rolling average over approved reviews.
    pub rating_avg: Decimal,
    pub rating_count: i32,
    pub is_active: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether `quantity` more units can currently be sold.
    #[must_use]
    pub const fn has_stock(&self, quantity: i32) -> bool {
        self.stock >= quantity
    }
}
