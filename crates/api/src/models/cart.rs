//! Cart domain types.
//!
//! Totals are computed on read from the line items, never stored, so there
//! is no denormalized counter to drift under concurrent writers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use clementine_core::{CartId, CartItemId, ProductId, UserId};

/// A line in the active cart, joined with current product data.
#[derive(Debug, Clone, Serialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    /// Price captured when the item was added.
    pub price_at_add: Decimal,
    /// Current catalog price, which may have moved since.
    pub current_price: Decimal,
    pub quantity: i32,
    pub available_stock: i32,
    /// True when the quantity was clamped down to the available stock while
    /// building this view.
    pub clamped: bool,
}

impl CartItem {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.current_price * Decimal::from(self.quantity)
    }
}

/// A line in the save-for-later bucket.
#[derive(Debug, Clone, Serialize)]
pub struct SavedItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub price_at_add: Decimal,
    pub current_price: Decimal,
    pub quantity: i32,
}

/// A user's cart with both buckets and computed totals.
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub items: Vec<CartItem>,
    pub saved_items: Vec<SavedItem>,
    pub total_price: Decimal,
    pub item_count: i32,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Recompute `total_price` and `item_count` from the active items.
    pub fn recompute_totals(&mut self) {
        self.total_price = self.items.iter().map(CartItem::line_total).sum();
        self.item_count = self.items.iter().map(|i| i.quantity).sum();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(quantity: i32, price: &str) -> CartItem {
        CartItem {
            id: CartItemId::new(1),
            product_id: ProductId::new(1),
            name: "Widget".to_string(),
            image: None,
            price_at_add: price.parse().unwrap(),
            current_price: price.parse().unwrap(),
            quantity,
            available_stock: 10,
            clamped: false,
        }
    }

    #[test]
    fn test_totals_from_items() {
        let mut cart = Cart {
            id: CartId::new(1),
            user_id: UserId::new(1),
            items: vec![item(2, "19.99"), item(1, "5.00")],
            saved_items: Vec::new(),
            total_price: Decimal::ZERO,
            item_count: 0,
            updated_at: Utc::now(),
        };
        cart.recompute_totals();
        assert_eq!(cart.total_price, "44.98".parse().unwrap());
        assert_eq!(cart.item_count, 3);
    }

    #[test]
    fn test_empty_cart_totals() {
        let mut cart = Cart {
            id: CartId::new(1),
            user_id: UserId::new(1),
            items: Vec::new(),
            saved_items: Vec::new(),
            total_price: "9.99".parse().unwrap(),
            item_count: 7,
            updated_at: Utc::now(),
        };
        cart.recompute_totals();
        assert_eq!(cart.total_price, Decimal::ZERO);
        assert_eq!(cart.item_count, 0);
    }
}
