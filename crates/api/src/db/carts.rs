//! Cart repository.
//!
//! One open cart per user, enforced by a unique index on `carts.user_id`.
//! Viewing the cart clamps stale quantities against current stock and drops
//! lines whose product has gone inactive or out of stock, so what the
//! customer sees is always purchasable.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use clementine_core::{CartId, CartItemId, ProductId, UserId};

use super::RepositoryError;
use crate::models::cart::{Cart, CartItem, SavedItem};

#[derive(Debug, sqlx::FromRow)]
struct CartItemJoinRow {
    id: i32,
    product_id: i32,
    name: String,
    image: Option<String>,
    price_at_add: Decimal,
    current_price: Decimal,
    quantity: i32,
    available_stock: i32,
    saved_for_later: bool,
}

const ITEM_JOIN: &str = "SELECT ci.id, ci.product_id, p.name, p.images[1] AS image, \
     ci.price_at_add, p.price AS current_price, ci.quantity, p.stock AS available_stock, \
     ci.saved_for_later \
     FROM cart_items ci JOIN products p ON p.id = ci.product_id \
     WHERE ci.cart_id = $1 ORDER BY ci.id";

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the user's cart ID, creating an empty cart on first touch.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_or_create(&self, user_id: UserId) -> Result<CartId, RepositoryError> {
        let (id,): (i32,) = sqlx::query_as(
            "INSERT INTO carts (user_id) VALUES ($1) \
             ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id \
             RETURNING id",
        )
        .bind(user_id.as_i32())
        .fetch_one(self.pool)
        .await?;

        Ok(CartId::new(id))
    }

    /// Load the full cart view for a user, clamping quantities on the way.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_cart(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let cart_id = self.get_or_create(user_id).await?;

        // Drop active lines that can no longer be bought at all.
        sqlx::query(
            "DELETE FROM cart_items ci USING products p \
             WHERE ci.cart_id = $1 AND NOT ci.saved_for_later \
               AND p.id = ci.product_id AND (p.stock = 0 OR NOT p.is_active)",
        )
        .bind(cart_id.as_i32())
        .execute(self.pool)
        .await?;

        // Clamp quantities that exceed what is left in stock.
        let clamped: Vec<(i32,)> = sqlx::query_as(
            "UPDATE cart_items ci SET quantity = p.stock \
             FROM products p \
             WHERE ci.cart_id = $1 AND NOT ci.saved_for_later \
               AND p.id = ci.product_id AND ci.quantity > p.stock \
             RETURNING ci.id",
        )
        .bind(cart_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        let rows: Vec<CartItemJoinRow> = sqlx::query_as(ITEM_JOIN)
            .bind(cart_id.as_i32())
            .fetch_all(self.pool)
            .await?;

        let (updated_at,): (DateTime<Utc>,) =
            sqlx::query_as("SELECT updated_at FROM carts WHERE id = $1")
                .bind(cart_id.as_i32())
                .fetch_one(self.pool)
                .await?;

        let mut cart = Cart {
            id: cart_id,
            user_id,
            items: Vec::new(),
            saved_items: Vec::new(),
            total_price: Decimal::ZERO,
            item_count: 0,
            updated_at,
        };
        for row in rows {
            if row.saved_for_later {
                cart.saved_items.push(SavedItem {
                    id: CartItemId::new(row.id),
                    product_id: ProductId::new(row.product_id),
                    name: row.name,
                    image: row.image,
                    price_at_add: row.price_at_add,
                    current_price: row.current_price,
                    quantity: row.quantity,
                });
            } else {
                cart.items.push(CartItem {
                    id: CartItemId::new(row.id),
                    product_id: ProductId::new(row.product_id),
                    name: row.name,
                    image: row.image,
                    price_at_add: row.price_at_add,
                    current_price: row.current_price,
                    quantity: row.quantity,
                    available_stock: row.available_stock,
                    clamped: clamped.iter().any(|(id,)| *id == row.id),
                });
            }
        }
        cart.recompute_totals();
        Ok(cart)
    }

    /// Add a product to the active bucket, merging with an existing line.
    /// A saved-for-later line for the same product moves back to active.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
        price: Decimal,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO cart_items (cart_id, product_id, quantity, price_at_add) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (cart_id, product_id) DO UPDATE \
               SET quantity = cart_items.quantity + EXCLUDED.quantity, \
                   saved_for_later = FALSE",
        )
        .bind(cart_id.as_i32())
        .bind(product_id.as_i32())
        .bind(quantity)
        .bind(price)
        .execute(self.pool)
        .await?;

        self.touch(cart_id).await
    }

    /// Current quantity of a product already in the active bucket.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<i32, RepositoryError> {
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT quantity FROM cart_items \
             WHERE cart_id = $1 AND product_id = $2 AND NOT saved_for_later",
        )
        .bind(cart_id.as_i32())
        .bind(product_id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map_or(0, |(q,)| q))
    }

    /// Set a line's quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line isn't in this cart.
    pub async fn update_quantity(
        &self,
        cart_id: CartId,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE cart_items SET quantity = $3 WHERE id = $2 AND cart_id = $1")
            .bind(cart_id.as_i32())
            .bind(item_id.as_i32())
            .bind(quantity)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.touch(cart_id).await
    }

    /// Remove a line from either bucket.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line isn't in this cart.
    pub async fn remove_item(
        &self,
        cart_id: CartId,
        item_id: CartItemId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $2 AND cart_id = $1")
            .bind(cart_id.as_i32())
            .bind(item_id.as_i32())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.touch(cart_id).await
    }

    /// Move a line between the active and save-for-later buckets.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line isn't in this cart.
    pub async fn set_saved(
        &self,
        cart_id: CartId,
        item_id: CartItemId,
        saved: bool,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE cart_items SET saved_for_later = $3 WHERE id = $2 AND cart_id = $1")
                .bind(cart_id.as_i32())
                .bind(item_id.as_i32())
                .bind(saved)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.touch(cart_id).await
    }

    /// Empty the active bucket, leaving saved-for-later lines alone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, cart_id: CartId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND NOT saved_for_later")
            .bind(cart_id.as_i32())
            .execute(self.pool)
            .await?;
        self.touch(cart_id).await
    }

    async fn touch(&self, cart_id: CartId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE carts SET updated_at = now() WHERE id = $1")
            .bind(cart_id.as_i32())
            .execute(self.pool)
            .await?;
        Ok(())
    }
}

/// Empty the active bucket inside the checkout transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn clear_active_items(
    conn: &mut PgConnection,
    cart_id: CartId,
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND NOT saved_for_later")
        .bind(cart_id.as_i32())
        .execute(&mut *conn)
        .await?;
    sqlx::query("UPDATE carts SET updated_at = now() WHERE id = $1")
        .bind(cart_id.as_i32())
        .execute(conn)
        .await?;
    Ok(())
}
