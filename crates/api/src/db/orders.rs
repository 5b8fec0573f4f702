//! Order repository: placement snapshots, status moves, admin reports.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use clementine_core::{OrderId, OrderItemId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, UserId};

use super::{parse_enum, RepositoryError};
use crate::models::order::{Order, OrderItem, ShippingAddress};

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: i32,
    order_number: String,
    status: String,
    ship_recipient: String,
    ship_line1: String,
    ship_line2: Option<String>,
    ship_city: String,
    ship_state: String,
    ship_postal_code: String,
    ship_country: String,
    ship_phone: Option<String>,
    payment_method: String,
    payment_status: String,
    payment_reference: Option<String>,
    subtotal: Decimal,
    discount: Decimal,
    tax: Decimal,
    shipping_fee: Decimal,
    total: Decimal,
    coupon_code: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: OrderId::new(row.id),
            user_id: UserId::new(row.user_id),
            order_number: row.order_number,
            status: parse_enum::<OrderStatus>(&row.status)?,
            shipping_address: ShippingAddress {
                recipient: row.ship_recipient,
                line1: row.ship_line1,
                line2: row.ship_line2,
                city: row.ship_city,
                state: row.ship_state,
                postal_code: row.ship_postal_code,
                country: row.ship_country,
                phone: row.ship_phone,
            },
            payment_method: parse_enum::<PaymentMethod>(&row.payment_method)?,
            payment_status: parse_enum::<PaymentStatus>(&row.payment_status)?,
            payment_reference: row.payment_reference,
            items: Vec::new(),
            subtotal: row.subtotal,
            discount: row.discount,
            tax: row.tax,
            shipping_fee: row.shipping_fee,
            total: row.total,
            coupon_code: row.coupon_code,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    order_id: i32,
    product_id: Option<i32>,
    name: String,
    price: Decimal,
    image: Option<String>,
    quantity: i32,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(row.id),
            product_id: row.product_id.map(ProductId::new),
            name: row.name,
            price: row.price,
            image: row.image,
            quantity: row.quantity,
        }
    }
}

/// One day in the sales report.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SalesDay {
    pub day: NaiveDate,
    pub orders: i64,
    pub revenue: Decimal,
}

/// One row in the top-products report.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TopProduct {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<i32>,
    pub name: String,
    pub units_sold: i64,
    pub revenue: Decimal,
}

/// Dashboard headline numbers.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Overview {
    pub total_orders: i64,
    pub pending_orders: i64,
    pub total_revenue: Decimal,
    pub total_customers: i64,
    pub total_products: i64,
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
            .bind(id.as_i32())
            .fetch_optional(self.pool)
            .await?;

        let Some(row) = row else { return Ok(None) };
        let mut order = Order::try_from(row)?;
        order.items = self.items_for(&[order.id]).await?;
        Ok(Some(order))
    }

    /// Look an order up by its human-readable number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_by_number(&self, order_number: &str) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as("SELECT * FROM orders WHERE order_number = $1")
            .bind(order_number)
            .fetch_optional(self.pool)
            .await?;

        let Some(row) = row else { return Ok(None) };
        let mut order = Order::try_from(row)?;
        order.items = self.items_for(&[order.id]).await?;
        Ok(Some(order))
    }

    /// A customer's own orders, newest first, items included.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> =
            sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
                .bind(user_id.as_i32())
                .fetch_all(self.pool)
                .await?;

        self.attach_items(rows).await
    }

    /// All orders for the back office, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_all(
        &self,
        status: Option<OrderStatus>,
        page: i64,
        per_page: i64,
    ) -> Result<Vec<Order>, RepositoryError> {
        let per_page = per_page.clamp(1, 100);
        let offset = (page.max(1) - 1) * per_page;

        let rows: Vec<OrderRow> = sqlx::query_as(
            "SELECT * FROM orders WHERE ($1::text IS NULL OR status = $1) \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(status.map(|s| s.to_string()))
        .bind(per_page)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        self.attach_items(rows).await
    }

    /// Move an order to a new status.
    ///
    /// The caller has already validated the transition; this only writes it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE orders SET status = $2, updated_at = now() WHERE id = $1")
                .bind(id.as_i32())
                .bind(status.to_string())
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Record the gateway's verdict on an order's payment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn update_payment(
        &self,
        id: OrderId,
        status: PaymentStatus,
        reference: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET payment_status = $2, \
             payment_reference = COALESCE($3, payment_reference), updated_at = now() \
             WHERE id = $1",
        )
        .bind(id.as_i32())
        .bind(status.to_string())
        .bind(reference)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Whether the user has a delivered order containing this product.
    /// Gates review submission.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delivered_order_with_product(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<OrderId>, RepositoryError> {
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT o.id FROM orders o \
             JOIN order_items oi ON oi.order_id = o.id \
             WHERE o.user_id = $1 AND oi.product_id = $2 AND o.status = 'delivered' \
             ORDER BY o.created_at DESC LIMIT 1",
        )
        .bind(user_id.as_i32())
        .bind(product_id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(id,)| OrderId::new(id)))
    }

    // -------------------------------------------------------------------------
    // Reports
    // -------------------------------------------------------------------------

    /// Revenue per day over a date window. Only orders that have entered
    /// fulfilment count (`processing`, `shipped`, `delivered`); pending and
    /// cancelled orders are excluded. Days without orders are absent, not
    /// zero-filled.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sales_by_day(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SalesDay>, RepositoryError> {
        let rows: Vec<SalesDay> = sqlx::query_as(
            "SELECT created_at::date AS day, COUNT(*) AS orders, \
             COALESCE(SUM(total), 0) AS revenue \
             FROM orders \
             WHERE status IN ('processing', 'shipped', 'delivered') \
               AND created_at >= $1 AND created_at < $2 \
             GROUP BY day ORDER BY day",
        )
        .bind(from)
        .bind(to)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Best sellers by units over a date window.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_products(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<TopProduct>, RepositoryError> {
        let rows: Vec<TopProduct> = sqlx::query_as(
            "SELECT oi.product_id, oi.name, \
             SUM(oi.quantity) AS units_sold, SUM(oi.price * oi.quantity) AS revenue \
             FROM order_items oi JOIN orders o ON o.id = oi.order_id \
             WHERE o.status <> 'cancelled' AND o.created_at >= $1 AND o.created_at < $2 \
             GROUP BY oi.product_id, oi.name \
             ORDER BY units_sold DESC LIMIT $3",
        )
        .bind(from)
        .bind(to)
        .bind(limit.clamp(1, 100))
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Headline dashboard numbers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn overview(&self) -> Result<Overview, RepositoryError> {
        let overview: Overview = sqlx::query_as(
            "SELECT \
             (SELECT COUNT(*) FROM orders) AS total_orders, \
             (SELECT COUNT(*) FROM orders WHERE status = 'pending') AS pending_orders, \
             (SELECT COALESCE(SUM(total), 0) FROM orders WHERE status <> 'cancelled') AS total_revenue, \
             (SELECT COUNT(*) FROM users WHERE role = 'customer') AS total_customers, \
             (SELECT COUNT(*) FROM products) AS total_products",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(overview)
    }

    async fn items_for(&self, order_ids: &[OrderId]) -> Result<Vec<OrderItem>, RepositoryError> {
        let ids: Vec<i32> = order_ids.iter().map(|id| id.as_i32()).collect();
        let rows: Vec<OrderItemRow> =
            sqlx::query_as("SELECT * FROM order_items WHERE order_id = ANY($1) ORDER BY id")
                .bind(&ids)
                .fetch_all(self.pool)
                .await?;

        Ok(rows.into_iter().map(OrderItem::from).collect())
    }

    async fn attach_items(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        let item_rows: Vec<OrderItemRow> =
            sqlx::query_as("SELECT * FROM order_items WHERE order_id = ANY($1) ORDER BY id")
                .bind(&ids)
                .fetch_all(self.pool)
                .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let order_id = row.id;
            let mut order = Order::try_from(row)?;
            order.items = item_rows
                .iter()
                .filter(|i| i.order_id == order_id)
                .map(|i| OrderItem {
                    id: OrderItemId::new(i.id),
                    product_id: i.product_id.map(ProductId::new),
                    name: i.name.clone(),
                    price: i.price,
                    image: i.image.clone(),
                    quantity: i.quantity,
                })
                .collect();
            orders.push(order);
        }
        Ok(orders)
    }
}

// =============================================================================
// Transaction-scoped helpers (checkout, cancellation)
// =============================================================================

/// Parameters for the order row written inside the checkout transaction.
pub struct NewOrder<'a> {
    pub user_id: UserId,
    pub order_number: &'a str,
    pub shipping_address: &'a ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub shipping_fee: Decimal,
    pub total: Decimal,
    pub coupon_code: Option<&'a str>,
}

/// Insert the order row.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn insert_order(
    conn: &mut PgConnection,
    new: &NewOrder<'_>,
) -> Result<OrderId, RepositoryError> {
    let (id,): (i32,) = sqlx::query_as(
        "INSERT INTO orders (user_id, order_number, status, \
         ship_recipient, ship_line1, ship_line2, ship_city, ship_state, \
         ship_postal_code, ship_country, ship_phone, \
         payment_method, payment_status, subtotal, discount, tax, shipping_fee, total, \
         coupon_code) \
         VALUES ($1, $2, 'pending', $3, $4, $5, $6, $7, $8, $9, $10, \
         $11, $12, $13, $14, $15, $16, $17, $18) \
         RETURNING id",
    )
    .bind(new.user_id.as_i32())
    .bind(new.order_number)
    .bind(&new.shipping_address.recipient)
    .bind(&new.shipping_address.line1)
    .bind(&new.shipping_address.line2)
    .bind(&new.shipping_address.city)
    .bind(&new.shipping_address.state)
    .bind(&new.shipping_address.postal_code)
    .bind(&new.shipping_address.country)
    .bind(&new.shipping_address.phone)
    .bind(new.payment_method.to_string())
    .bind(new.payment_status.to_string())
    .bind(new.subtotal)
    .bind(new.discount)
    .bind(new.tax)
    .bind(new.shipping_fee)
    .bind(new.total)
    .bind(new.coupon_code)
    .fetch_one(conn)
    .await?;

    Ok(OrderId::new(id))
}

/// Insert one snapshot line.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn insert_item(
    conn: &mut PgConnection,
    order_id: OrderId,
    product_id: ProductId,
    name: &str,
    price: Decimal,
    image: Option<&str>,
    quantity: i32,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO order_items (order_id, product_id, name, price, image, quantity) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(order_id.as_i32())
    .bind(product_id.as_i32())
    .bind(name)
    .bind(price)
    .bind(image)
    .bind(quantity)
    .execute(conn)
    .await?;
    Ok(())
}

/// Write a status change inside a transaction that also touches stock.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order doesn't exist.
pub async fn set_status(
    conn: &mut PgConnection,
    order_id: OrderId,
    status: OrderStatus,
) -> Result<(), RepositoryError> {
    let result = sqlx::query("UPDATE orders SET status = $2, updated_at = now() WHERE id = $1")
        .bind(order_id.as_i32())
        .bind(status.to_string())
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Snapshot lines still pointing at live products, for restock.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn restockable_items(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Vec<(ProductId, i32)>, RepositoryError> {
    let rows: Vec<(i32, i32)> = sqlx::query_as(
        "SELECT product_id, quantity FROM order_items \
         WHERE order_id = $1 AND product_id IS NOT NULL",
    )
    .bind(order_id.as_i32())
    .fetch_all(conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(pid, qty)| (ProductId::new(pid), qty))
        .collect())
}
