//! Order routes.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use clementine_core::{OrderId, OrderStatus};

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::order::Order;
use crate::routes::{ok, Envelope};
use crate::services::checkout::{self, CheckoutRequest};
use crate::state::AppState;

/// `POST /api/orders`
pub async fn place(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Json(body): Json<CheckoutRequest>,
) -> Result<Json<Envelope<Order>>> {
    let order = checkout::place_order(
        state.pool(),
        state.notifier(),
        state.payments(),
        identity.user_id,
        body,
    )
    .await?;
    Ok(ok("Order placed", order))
}

/// `GET /api/orders`
pub async fn list_mine(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<Envelope<Vec<Order>>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(identity.user_id)
        .await?;
    Ok(ok("OK", orders))
}

#[derive(Debug, Deserialize)]
pub struct ListAllQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// `GET /api/orders/all` (admin)
pub async fn list_all(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<ListAllQuery>,
) -> Result<Json<Envelope<Vec<Order>>>> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<OrderStatus>)
        .transpose()
        .map_err(AppError::Validation)?;

    let orders = OrderRepository::new(state.pool())
        .list_all(status, query.page.unwrap_or(1), query.per_page.unwrap_or(20))
        .await?;
    Ok(ok("OK", orders))
}

async fn load_order(state: &AppState, id: i32) -> Result<Order> {
    OrderRepository::new(state.pool())
        .get(OrderId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}

/// `GET /api/orders/{id}`
///
/// Customers can only see their own orders; admins can see any.
pub async fn get_one(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Json<Envelope<Order>>> {
    let order = load_order(&state, id).await?;
    if order.user_id != identity.user_id && !identity.is_admin() {
        return Err(AppError::NotFound("Order not found".to_string()));
    }
    Ok(ok("OK", order))
}

/// `GET /api/orders/number/{order_number}`
///
/// Lookup by the human-readable identifier, same visibility rules as by id.
pub async fn get_by_number(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(order_number): Path<String>,
) -> Result<Json<Envelope<Order>>> {
    let order = OrderRepository::new(state.pool())
        .get_by_number(&order_number)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    if order.user_id != identity.user_id && !identity.is_admin() {
        return Err(AppError::NotFound("Order not found".to_string()));
    }
    Ok(ok("OK", order))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

/// `PUT /api/orders/{id}/status` (admin)
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<i32>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<Envelope<Order>>> {
    let next = body
        .status
        .parse::<OrderStatus>()
        .map_err(AppError::Validation)?;

    let order = load_order(&state, id).await?;
    let updated = checkout::transition_order(state.pool(), state.notifier(), &order, next).await?;
    Ok(ok("Order status updated", updated))
}

/// `POST /api/orders/{id}/cancel`
///
/// Customers can cancel while the order is pending or processing; admins at
/// any point short of delivery.
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Json<Envelope<Order>>> {
    let order = load_order(&state, id).await?;
    if order.user_id != identity.user_id && !identity.is_admin() {
        return Err(AppError::NotFound("Order not found".to_string()));
    }

    let updated =
        checkout::cancel_order(state.pool(), state.notifier(), &order, identity.is_admin())
            .await?;
    Ok(ok("Order cancelled", updated))
}

/// `POST /api/orders/{id}/reactivate` (admin)
pub async fn reactivate(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<i32>,
) -> Result<Json<Envelope<Order>>> {
    let order = load_order(&state, id).await?;
    let updated = checkout::reactivate_order(state.pool(), state.notifier(), &order).await?;
    Ok(ok("Order reactivated", updated))
}
