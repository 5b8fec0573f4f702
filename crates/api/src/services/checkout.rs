//! Order placement and lifecycle orchestration.
//!
//! Placement runs as one database transaction: every stock decrement is
//! guarded, the order and its snapshot lines are inserted, the coupon use is
//! reserved, and the cart is emptied. If any guard fails the transaction
//! rolls back and nothing moved. Notifications and socket events happen only
//! after commit and are never allowed to fail the request.

use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;

use clementine_core::{
    NotificationAudience, NotificationKind, OrderStatus, OrderTotals, PaymentMethod, UserId,
};

use crate::db::notifications::NewNotification;
use crate::db::orders::NewOrder;
use crate::db::{
    carts, coupons, orders, products, CartRepository, CouponRepository, NotificationRepository,
    OrderRepository,
};
use crate::error::AppError;
use crate::models::coupon::Coupon;
use crate::models::order::{Order, ShippingAddress};
use crate::services::notifier::Notifier;
use crate::services::payment::PaymentProcessor;

/// What the customer submits at checkout.
#[derive(Debug, serde::Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<String>,
}

/// Generate a human-readable order number, e.g. `ORD-20260830-X7K2QF`.
#[must_use]
pub fn generate_order_number() -> String {
    let mut rng = rand::thread_rng();
    const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let suffix: String = (0..6)
        .map(|_| char::from(CHARSET[rng.gen_range(0..CHARSET.len())]))
        .collect();
    format!("ORD-{}-{}", Utc::now().format("%Y%m%d"), suffix)
}

/// Validate a coupon against the cart and compute its discount.
///
/// # Errors
///
/// Returns `AppError::Validation` with the client-facing rejection reason.
async fn resolve_coupon(
    pool: &PgPool,
    user_id: UserId,
    code: &str,
    subtotal: Decimal,
) -> Result<(Coupon, Decimal), AppError> {
    let repo = CouponRepository::new(pool);
    let coupon = repo
        .get_by_code(code)
        .await?
        .ok_or_else(|| AppError::Validation("Invalid coupon code".to_string()))?;

    let redemptions = repo.user_redemption_count(coupon.id, user_id).await?;
    coupon
        .check(Utc::now(), subtotal, redemptions)
        .map_err(|rejection| AppError::Validation(rejection.message()))?;

    let discount = coupon.discount_for(subtotal);
    Ok((coupon, discount))
}

/// Place an order from the user's active cart.
///
/// # Errors
///
/// Returns `AppError::Validation` for an empty cart, incomplete address or
/// rejected coupon, `AppError::Conflict` when stock ran out underneath the
/// cart, `AppError::Payment` when the charge is declined.
pub async fn place_order(
    pool: &PgPool,
    notifier: &Notifier,
    payments: &PaymentProcessor,
    user_id: UserId,
    request: CheckoutRequest,
) -> Result<Order, AppError> {
    if !request.shipping_address.is_complete() {
        return Err(AppError::Validation(
            "Shipping address is incomplete".to_string(),
        ));
    }

    let cart = CartRepository::new(pool).get_cart(user_id).await?;
    if cart.items.is_empty() {
        return Err(AppError::Validation("Your cart is empty".to_string()));
    }

    let subtotal: Decimal = cart.items.iter().map(|i| i.line_total()).sum();
    let coupon = match &request.coupon_code {
        Some(code) => Some(resolve_coupon(pool, user_id, code, subtotal).await?),
        None => None,
    };
    let discount = coupon.as_ref().map_or(Decimal::ZERO, |(_, d)| *d);
    let totals = OrderTotals::compute(subtotal, discount);

    let order_number = generate_order_number();

    // Charge before touching inventory; a declined card leaves no trace.
    let intent = payments
        .create_intent(&order_number, totals.total, request.payment_method)
        .await?;
    let payment_status = payments
        .confirm(&intent.reference, request.payment_method)
        .await?;

    let mut tx = pool.begin().await.map_err(db_err)?;

    for item in &cart.items {
        let ok = products::decrement_stock(&mut tx, item.product_id, item.quantity).await?;
        if !ok {
            tx.rollback().await.map_err(db_err)?;
            return Err(AppError::Conflict(format!(
                "Insufficient stock for {}",
                item.name
            )));
        }
    }

    let order_id = orders::insert_order(
        &mut tx,
        &NewOrder {
            user_id,
            order_number: &order_number,
            shipping_address: &request.shipping_address,
            payment_method: request.payment_method,
            payment_status,
            subtotal: totals.subtotal,
            discount: totals.discount,
            tax: totals.tax,
            shipping_fee: totals.shipping_fee,
            total: totals.total,
            coupon_code: coupon.as_ref().map(|(c, _)| c.code.as_str()),
        },
    )
    .await?;

    sqlx::query("UPDATE orders SET payment_reference = $2 WHERE id = $1")
        .bind(order_id.as_i32())
        .bind(&intent.reference)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.into()))?;

    for item in &cart.items {
        orders::insert_item(
            &mut tx,
            order_id,
            item.product_id,
            &item.name,
            item.current_price,
            item.image.as_deref(),
            item.quantity,
        )
        .await?;
    }

    if let Some((coupon, _)) = &coupon {
        let ok = coupons::try_redeem(&mut tx, coupon.id).await?;
        if !ok {
            tx.rollback().await.map_err(db_err)?;
            return Err(AppError::Validation(
                "This coupon has reached its usage limit".to_string(),
            ));
        }
        coupons::record_redemption(&mut tx, coupon.id, user_id, order_id).await?;
    }

    carts::clear_active_items(&mut tx, cart.id).await?;

    tx.commit().await.map_err(db_err)?;

    let order = OrderRepository::new(pool)
        .get(order_id)
        .await?
        .ok_or_else(|| AppError::Internal("order vanished after commit".to_string()))?;

    announce_placement(pool, notifier, &order).await;
    Ok(order)
}

/// Cancel an order, returning stock and any coupon use.
///
/// # Errors
///
/// Returns `AppError::Conflict` if the order can no longer be cancelled.
pub async fn cancel_order(
    pool: &PgPool,
    notifier: &Notifier,
    order: &Order,
    by_admin: bool,
) -> Result<Order, AppError> {
    if !by_admin && !order.status.customer_can_cancel() {
        return Err(AppError::Conflict(
            "This order can no longer be cancelled".to_string(),
        ));
    }
    if !order.status.can_transition_to(OrderStatus::Cancelled) {
        return Err(AppError::Conflict(format!(
            "Cannot cancel a {} order",
            order.status
        )));
    }

    let mut tx = pool.begin().await.map_err(db_err)?;
    orders::set_status(&mut tx, order.id, OrderStatus::Cancelled).await?;
    for (product_id, quantity) in orders::restockable_items(&mut tx, order.id).await? {
        products::restore_stock(&mut tx, product_id, quantity).await?;
    }
    coupons::release_redemption(&mut tx, order.id).await?;
    tx.commit().await.map_err(db_err)?;

    let updated = reload(pool, order).await?;
    announce_status(pool, notifier, &updated, NotificationKind::OrderCancelled).await;
    Ok(updated)
}

/// Bring a cancelled order back to `pending`, taking stock again.
///
/// The original discount stays on the order; the coupon use is not
/// re-reserved.
///
/// # Errors
///
/// Returns `AppError::Conflict` if the order isn't cancelled or stock is no
/// longer available.
pub async fn reactivate_order(
    pool: &PgPool,
    notifier: &Notifier,
    order: &Order,
) -> Result<Order, AppError> {
    if order.status != OrderStatus::Cancelled {
        return Err(AppError::Conflict(
            "Only cancelled orders can be reactivated".to_string(),
        ));
    }

    let mut tx = pool.begin().await.map_err(db_err)?;
    for (product_id, quantity) in orders::restockable_items(&mut tx, order.id).await? {
        let ok = products::decrement_stock(&mut tx, product_id, quantity).await?;
        if !ok {
            tx.rollback().await.map_err(db_err)?;
            return Err(AppError::Conflict(
                "Not enough stock remains to reactivate this order".to_string(),
            ));
        }
    }
    orders::set_status(&mut tx, order.id, OrderStatus::Pending).await?;
    tx.commit().await.map_err(db_err)?;

    let updated = reload(pool, order).await?;
    announce_status(pool, notifier, &updated, NotificationKind::OrderStatus).await;
    Ok(updated)
}

/// Move an order along its fulfilment path and notify the customer.
///
/// # Errors
///
/// Returns `AppError::Conflict` for an invalid transition.
pub async fn transition_order(
    pool: &PgPool,
    notifier: &Notifier,
    order: &Order,
    next: OrderStatus,
) -> Result<Order, AppError> {
    if next == OrderStatus::Cancelled {
        return cancel_order(pool, notifier, order, true).await;
    }
    if !order.status.can_transition_to(next) {
        return Err(AppError::Conflict(format!(
            "Cannot move a {} order to {}",
            order.status, next
        )));
    }

    OrderRepository::new(pool).update_status(order.id, next).await?;
    let updated = reload(pool, order).await?;
    announce_status(pool, notifier, &updated, NotificationKind::OrderStatus).await;
    Ok(updated)
}

async fn reload(pool: &PgPool, order: &Order) -> Result<Order, AppError> {
    OrderRepository::new(pool)
        .get(order.id)
        .await?
        .ok_or_else(|| AppError::Internal("order vanished during update".to_string()))
}

async fn announce_placement(pool: &PgPool, notifier: &Notifier, order: &Order) {
    let repo = NotificationRepository::new(pool);
    let title = format!("New order {}", order.order_number);
    let body = format!("Order total {} from customer #{}", order.total, order.user_id);

    if let Err(e) = repo
        .create(NewNotification {
            audience: NotificationAudience::Admin,
            user_id: None,
            kind: NotificationKind::OrderPlaced,
            title: &title,
            body: &body,
            order_id: Some(order.id),
            product_id: None,
        })
        .await
    {
        tracing::warn!(error = %e, "failed to persist admin notification");
    }

    let customer_title = format!("Order {} placed", order.order_number);
    if let Err(e) = repo
        .create(NewNotification {
            audience: NotificationAudience::Customer,
            user_id: Some(order.user_id),
            kind: NotificationKind::OrderPlaced,
            title: &customer_title,
            body: "We've received your order and will keep you posted.",
            order_id: Some(order.id),
            product_id: None,
        })
        .await
    {
        tracing::warn!(error = %e, "failed to persist customer notification");
    }

    notifier.emit_admin(
        "adminNotification",
        json!({
            "title": title,
            "orderNumber": order.order_number,
            "total": order.total,
        }),
    );
    notifier.emit_customer(
        order.user_id,
        "customerNotification",
        json!({
            "title": customer_title,
            "orderNumber": order.order_number,
            "status": order.status,
        }),
    );
    notifier.emit_customer(order.user_id, "cart_cleared", json!({}));
}

async fn announce_status(
    pool: &PgPool,
    notifier: &Notifier,
    order: &Order,
    kind: NotificationKind,
) {
    let repo = NotificationRepository::new(pool);
    let title = format!("Order {} is now {}", order.order_number, order.status);

    if let Err(e) = repo
        .create(NewNotification {
            audience: NotificationAudience::Customer,
            user_id: Some(order.user_id),
            kind,
            title: &title,
            body: "",
            order_id: Some(order.id),
            product_id: None,
        })
        .await
    {
        tracing::warn!(error = %e, "failed to persist status notification");
    }

    let admin_body = format!("Customer #{}'s order moved to {}", order.user_id, order.status);
    if let Err(e) = repo
        .create(NewNotification {
            audience: NotificationAudience::Admin,
            user_id: None,
            kind,
            title: &title,
            body: &admin_body,
            order_id: Some(order.id),
            product_id: None,
        })
        .await
    {
        tracing::warn!(error = %e, "failed to persist admin status notification");
    }

    notifier.emit_customer(
        order.user_id,
        "customerNotification",
        json!({
            "title": title,
            "orderNumber": order.order_number,
            "status": order.status,
        }),
    );
    notifier.emit_admin(
        "adminNotification",
        json!({
            "title": title,
            "orderNumber": order.order_number,
            "status": order.status,
        }),
    );
}

fn db_err(e: sqlx::Error) -> AppError {
    AppError::Database(e.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_number_shape() {
        let number = generate_order_number();
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_order_numbers_are_distinct() {
        let a = generate_order_number();
        let b = generate_order_number();
        assert_ne!(a, b);
    }
}
