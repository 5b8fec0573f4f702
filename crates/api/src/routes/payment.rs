//! Payment routes.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use serde::Deserialize;
use serde_json::json;

use clementine_core::{OrderId, PaymentStatus};

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::order::Order;
use crate::routes::{ok, ok_message, Envelope};
use crate::services::payment::{PaymentError, PaymentIntent, WebhookEvent};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IntentRequest {
    pub order_id: i32,
}

async fn load_own_order(state: &AppState, user: &RequireAuth, order_id: i32) -> Result<Order> {
    let order = OrderRepository::new(state.pool())
        .get(OrderId::new(order_id))
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    if order.user_id != user.0.user_id && !user.0.is_admin() {
        return Err(AppError::NotFound("Order not found".to_string()));
    }
    Ok(order)
}

/// `POST /api/payment/intent`
pub async fn create_intent(
    State(state): State<AppState>,
    auth: RequireAuth,
    Json(body): Json<IntentRequest>,
) -> Result<Json<Envelope<PaymentIntent>>> {
    let order = load_own_order(&state, &auth, body.order_id).await?;
    if order.payment_status == PaymentStatus::Paid {
        return Err(AppError::Conflict("Order is already paid".to_string()));
    }

    let intent = state
        .payments()
        .create_intent(&order.order_number, order.total, order.payment_method)
        .await?;

    OrderRepository::new(state.pool())
        .update_payment(order.id, order.payment_status, Some(&intent.reference))
        .await?;

    Ok(ok("Payment intent created", intent))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub order_id: i32,
    pub reference: String,
}

/// `POST /api/payment/confirm`
pub async fn confirm(
    State(state): State<AppState>,
    auth: RequireAuth,
    Json(body): Json<ConfirmRequest>,
) -> Result<Json<Envelope<()>>> {
    let order = load_own_order(&state, &auth, body.order_id).await?;
    if order.payment_status == PaymentStatus::Paid {
        return Err(AppError::Conflict("Order is already paid".to_string()));
    }
    if order.payment_reference.as_deref() != Some(body.reference.as_str()) {
        return Err(AppError::Validation("Unknown payment reference".to_string()));
    }

    let repo = OrderRepository::new(state.pool());
    match state
        .payments()
        .confirm(&body.reference, order.payment_method)
        .await
    {
        Ok(status) => {
            repo.update_payment(order.id, status, None).await?;
            Ok(ok_message("Payment confirmed"))
        }
        Err(e @ PaymentError::Declined(_)) => {
            repo.update_payment(order.id, PaymentStatus::Failed, None)
                .await?;
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// `POST /api/payment/webhook`
///
/// The gateway's asynchronous settlement callback. The signature covers the
/// raw body; an invalid signature is rejected before the payload is parsed.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Envelope<()>>> {
    let signature = headers
        .get("X-Webhook-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(PaymentError::InvalidSignature)?;
    state.payments().verify_webhook_signature(&body, signature)?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Malformed webhook payload: {e}")))?;

    let status = match event.status.as_str() {
        "paid" => PaymentStatus::Paid,
        "failed" => PaymentStatus::Failed,
        "refunded" => PaymentStatus::Refunded,
        other => {
            return Err(AppError::Validation(format!(
                "Unknown payment status: {other}"
            )));
        }
    };

    let repo = OrderRepository::new(state.pool());
    let order = repo
        .get_by_number(&event.order_number)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    repo.update_payment(order.id, status, Some(&event.reference))
        .await?;

    state.notifier().emit_customer(
        order.user_id,
        "customerNotification",
        json!({
            "title": format!("Payment {} for order {}", event.status, order.order_number),
            "orderNumber": order.order_number,
            "paymentStatus": status,
        }),
    );

    Ok(ok_message("Webhook processed"))
}
