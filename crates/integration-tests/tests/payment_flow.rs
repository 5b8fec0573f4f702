//! End-to-end payment flow: intents, confirmation, and the signed webhook.
//!
//! The webhook tests sign payloads with `CLEMENTINE_WEBHOOK_SECRET`, which
//! must match the secret the server was started with.

use clementine_api::services::payment::PaymentProcessor;
use clementine_integration_tests::{TestContext, data, unique_email};
use reqwest::StatusCode;
use secrecy::SecretString;
use serde_json::{Value, json};

// ============================================================================
// Helpers
// ============================================================================

fn webhook_secret() -> SecretString {
    SecretString::from(
        std::env::var("CLEMENTINE_WEBHOOK_SECRET")
            .expect("CLEMENTINE_WEBHOOK_SECRET must be set for the webhook tests"),
    )
}

fn shipping_address() -> Value {
    json!({
        "recipient": "Integration Tester",
        "line1": "1 Test Lane",
        "city": "Testville",
        "state": "TS",
        "postal_code": "12345",
        "country": "Testland",
    })
}

/// Place a cash order and return `(order_id, order_number)`.
async fn place_order(ctx: &TestContext, customer: &str) -> (i64, String) {
    let admin = ctx.admin_token().await;
    let (status, body) = ctx
        .post(
            "/api/products",
            Some(&admin),
            &json!({
                "name": format!("Payment Widget {}", uuid::Uuid::new_v4().simple()),
                "description": "Created by the payment flow tests",
                "price": "30.00",
                "stock": 5,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "product create failed: {body}");
    let product_id = data(&body)["id"].as_i64().unwrap();

    let (status, body) = ctx
        .post(
            "/api/cart/items",
            Some(customer),
            &json!({"product_id": product_id, "quantity": 1}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "cart add failed: {body}");

    let (status, body) = ctx
        .post(
            "/api/orders",
            Some(customer),
            &json!({
                "shipping_address": shipping_address(),
                "payment_method": "cash",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "checkout failed: {body}");
    let order = data(&body);
    (
        order["id"].as_i64().unwrap(),
        order["order_number"].as_str().unwrap().to_string(),
    )
}

/// POST a raw webhook body with the given signature header.
async fn post_webhook(ctx: &TestContext, body: &[u8], signature: &str) -> (StatusCode, Value) {
    let resp = ctx
        .client
        .post(ctx.url("/api/payment/webhook"))
        .header("X-Webhook-Signature", signature)
        .header("Content-Type", "application/json")
        .body(body.to_vec())
        .send()
        .await
        .unwrap();
    let status = resp.status();
    let body = resp.json::<Value>().await.unwrap_or(Value::Null);
    (status, body)
}

// ============================================================================
// Intents and confirmation
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server and admin credentials"]
async fn test_intent_and_confirm_for_local_method() {
    let ctx = TestContext::new();
    let customer = ctx.register_customer(&unique_email("intent")).await;
    let (order_id, _) = place_order(&ctx, &customer).await;

    let (status, body) = ctx
        .post(
            "/api/payment/intent",
            Some(&customer),
            &json!({"order_id": order_id}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "intent failed: {body}");
    let intent = data(&body);
    let reference = intent["reference"].as_str().unwrap().to_string();
    assert!(reference.starts_with("local_"), "unexpected reference {reference}");
    assert_eq!(intent["currency"], "USD");

    let (status, body) = ctx
        .post(
            "/api/payment/confirm",
            Some(&customer),
            &json!({"order_id": order_id, "reference": reference}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "confirm failed: {body}");
}

#[tokio::test]
#[ignore = "Requires running API server and admin credentials"]
async fn test_confirm_rejects_unknown_reference() {
    let ctx = TestContext::new();
    let customer = ctx.register_customer(&unique_email("badref")).await;
    let (order_id, _) = place_order(&ctx, &customer).await;

    ctx.post(
        "/api/payment/intent",
        Some(&customer),
        &json!({"order_id": order_id}),
    )
    .await;

    let (status, _) = ctx
        .post(
            "/api/payment/confirm",
            Some(&customer),
            &json!({"order_id": order_id, "reference": "local_forged"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API server and admin credentials"]
async fn test_intent_hidden_for_foreign_order() {
    let ctx = TestContext::new();
    let owner = ctx.register_customer(&unique_email("payowner")).await;
    let stranger = ctx.register_customer(&unique_email("paystranger")).await;
    let (order_id, _) = place_order(&ctx, &owner).await;

    let (status, _) = ctx
        .post(
            "/api/payment/intent",
            Some(&stranger),
            &json!({"order_id": order_id}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Webhook
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server, admin credentials, and matching webhook secret"]
async fn test_webhook_marks_order_paid() {
    let ctx = TestContext::new();
    let customer = ctx.register_customer(&unique_email("webhook")).await;
    let (order_id, order_number) = place_order(&ctx, &customer).await;

    let payload = serde_json::to_vec(&json!({
        "reference": "gw_settlement_1",
        "order_number": order_number,
        "status": "paid",
    }))
    .unwrap();
    let signature = PaymentProcessor::sign_webhook_payload(&webhook_secret(), &payload);

    let (status, body) = post_webhook(&ctx, &payload, &signature).await;
    assert_eq!(status, StatusCode::OK, "webhook rejected: {body}");

    let (_, body) = ctx.get(&format!("/api/orders/{order_id}"), Some(&customer)).await;
    assert_eq!(data(&body)["payment_status"], "paid");
}

#[tokio::test]
#[ignore = "Requires running API server, admin credentials, and matching webhook secret"]
async fn test_webhook_rejects_bad_signature() {
    let ctx = TestContext::new();
    let customer = ctx.register_customer(&unique_email("tampered")).await;
    let (_, order_number) = place_order(&ctx, &customer).await;

    let payload = serde_json::to_vec(&json!({
        "reference": "gw_settlement_2",
        "order_number": order_number,
        "status": "paid",
    }))
    .unwrap();
    let signature = PaymentProcessor::sign_webhook_payload(&webhook_secret(), b"other body");

    let (status, _) = post_webhook(&ctx, &payload, &signature).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Garbage that is not even hex is rejected the same way.
    let (status, _) = post_webhook(&ctx, &payload, "not-hex").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running API server, admin credentials, and matching webhook secret"]
async fn test_webhook_rejects_unknown_status() {
    let ctx = TestContext::new();
    let customer = ctx.register_customer(&unique_email("oddstatus")).await;
    let (_, order_number) = place_order(&ctx, &customer).await;

    let payload = serde_json::to_vec(&json!({
        "reference": "gw_settlement_3",
        "order_number": order_number,
        "status": "teleported",
    }))
    .unwrap();
    let signature = PaymentProcessor::sign_webhook_payload(&webhook_secret(), &payload);

    let (status, _) = post_webhook(&ctx, &payload, &signature).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
