//! End-to-end review flow: the delivered-order gate, moderation, and the
//! product rating aggregate.
//!
//! Requires a running API server with a migrated database and a seeded
//! admin account.

use clementine_integration_tests::{TestContext, data, error_message, unique_email};
use reqwest::StatusCode;
use serde_json::{Value, json};

// ============================================================================
// Helpers
// ============================================================================

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

/// Place an order for one unit and return `(product_id, order_id)`.
async fn place_order(ctx: &TestContext, admin: &str, customer: &str) -> (i64, i64) {
    let (status, body) = ctx
        .post(
            "/api/products",
            Some(admin),
            &json!({
                "name": format!("Review Widget {}", uuid::Uuid::new_v4().simple()),
                "description": "Created by the review flow tests",
                "price": "15.00",
                "stock": 5,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "product create failed: {body}");
    let product_id = data(&body)["id"].as_i64().unwrap();

    ctx.post(
        "/api/cart/items",
        Some(customer),
        &json!({"product_id": product_id, "quantity": 1}),
    )
    .await;
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
    (product_id, data(&body)["id"].as_i64().unwrap())
}

async fn deliver(ctx: &TestContext, admin: &str, order_id: i64) {
    for next in ["processing", "shipped", "delivered"] {
        let (status, body) = ctx
            .put(
                &format!("/api/orders/{order_id}/status"),
                Some(admin),
                &json!({"status": next}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "transition to {next} failed: {body}");
    }
}

// ============================================================================
// The delivered-order gate
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server and admin credentials"]
async fn test_review_requires_delivered_order() {
    let ctx = TestContext::new();
    let admin = ctx.admin_token().await;
    let customer = ctx.register_customer(&unique_email("gate")).await;
    let (product_id, order_id) = place_order(&ctx, &admin, &customer).await;

    // The order is still pending, so the review is refused.
    let (status, body) = ctx
        .post(
            "/api/reviews",
            Some(&customer),
            &json!({"product_id": product_id, "rating": 5, "comment": "Great"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(&body),
        "Order must be delivered before you can review."
    );

    deliver(&ctx, &admin, order_id).await;

    let (status, body) = ctx
        .post(
            "/api/reviews",
            Some(&customer),
            &json!({"product_id": product_id, "rating": 5, "comment": "Great"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "review refused: {body}");
    let review = data(&body);
    assert_eq!(review["is_approved"], false);

    // One review per product per customer.
    let (status, _) = ctx
        .post(
            "/api/reviews",
            Some(&customer),
            &json!({"product_id": product_id, "rating": 4, "comment": "Again"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_review_rating_bounds() {
    let ctx = TestContext::new();
    let customer = ctx.register_customer(&unique_email("bounds")).await;

    for rating in [0, 6, -1] {
        let (status, _) = ctx
            .post(
                "/api/reviews",
                Some(&customer),
                &json!({"product_id": 1, "rating": rating, "comment": ""}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "rating {rating} accepted");
    }
}

// ============================================================================
// Moderation
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server and admin credentials"]
async fn test_moderation_publishes_review_and_updates_rating() {
    let ctx = TestContext::new();
    let admin = ctx.admin_token().await;
    let customer = ctx.register_customer(&unique_email("moderate")).await;
    let (product_id, order_id) = place_order(&ctx, &admin, &customer).await;
    deliver(&ctx, &admin, order_id).await;

    let (_, body) = ctx
        .post(
            "/api/reviews",
            Some(&customer),
            &json!({"product_id": product_id, "rating": 4, "title": "Solid", "comment": "Works"}),
        )
        .await;
    let review_id = data(&body)["id"].as_i64().unwrap();

    // Unapproved reviews stay off the public listing.
    let (_, body) = ctx
        .get(&format!("/api/products/{product_id}/reviews"), None)
        .await;
    assert!(data(&body).as_array().unwrap().is_empty());

    // It shows up in the admin moderation queue.
    let (status, body) = ctx.get("/api/reviews/pending", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        data(&body)
            .as_array()
            .unwrap()
            .iter()
            .any(|r| r["id"].as_i64() == Some(review_id)),
        "review missing from moderation queue"
    );

    let (status, body) = ctx
        .put(
            &format!("/api/reviews/{review_id}/moderate"),
            Some(&admin),
            &json!({"is_approved": true}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "moderation failed: {body}");
    assert_eq!(data(&body)["is_approved"], true);

    // Now it is public, with the author's name attached.
    let (_, body) = ctx
        .get(&format!("/api/products/{product_id}/reviews"), None)
        .await;
    let listing = data(&body).as_array().unwrap().clone();
    assert_eq!(listing.len(), 1);
    assert!(listing[0]["author"].is_string());

    // The product aggregate reflects the single approved review.
    let (_, body) = ctx.get(&format!("/api/products/{product_id}"), None).await;
    let product = data(&body);
    assert_eq!(product["rating_count"], 1);
    let avg: f64 = product["rating_avg"].as_str().unwrap().parse().unwrap();
    assert!((avg - 4.0).abs() < 0.001, "unexpected average {avg}");
}

#[tokio::test]
#[ignore = "Requires running API server and admin credentials"]
async fn test_unapproving_unwinds_rating() {
    let ctx = TestContext::new();
    let admin = ctx.admin_token().await;
    let customer = ctx.register_customer(&unique_email("unwind")).await;
    let (product_id, order_id) = place_order(&ctx, &admin, &customer).await;
    deliver(&ctx, &admin, order_id).await;

    let (_, body) = ctx
        .post(
            "/api/reviews",
            Some(&customer),
            &json!({"product_id": product_id, "rating": 2, "comment": "Meh"}),
        )
        .await;
    let review_id = data(&body)["id"].as_i64().unwrap();

    let (status, _) = ctx
        .put(
            &format!("/api/reviews/{review_id}/moderate"),
            Some(&admin),
            &json!({"is_approved": true}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Flagging it abusive pulls it back out of the aggregate.
    let (status, _) = ctx
        .put(
            &format!("/api/reviews/{review_id}/moderate"),
            Some(&admin),
            &json!({"is_approved": false, "is_abusive": true}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = ctx.get(&format!("/api/products/{product_id}"), None).await;
    assert_eq!(data(&body)["rating_count"], 0);
}

#[tokio::test]
#[ignore = "Requires running API server and admin credentials"]
async fn test_deleting_approved_review_unwinds_rating() {
    let ctx = TestContext::new();
    let admin = ctx.admin_token().await;
    let customer = ctx.register_customer(&unique_email("delrev")).await;
    let (product_id, order_id) = place_order(&ctx, &admin, &customer).await;
    deliver(&ctx, &admin, order_id).await;

    let (_, body) = ctx
        .post(
            "/api/reviews",
            Some(&customer),
            &json!({"product_id": product_id, "rating": 5, "comment": "Great"}),
        )
        .await;
    let review_id = data(&body)["id"].as_i64().unwrap();
    let (status, _) = ctx
        .put(
            &format!("/api/reviews/{review_id}/moderate"),
            Some(&admin),
            &json!({"is_approved": true}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx
        .delete(&format!("/api/reviews/{review_id}"), Some(&customer))
        .await;
    assert_eq!(status, StatusCode::OK);

    // The review and its contribution to the aggregate disappear together.
    let (_, body) = ctx.get(&format!("/api/products/{product_id}"), None).await;
    let product = data(&body);
    assert_eq!(product["rating_count"], 0);
    let avg: f64 = product["rating_avg"].as_str().unwrap().parse().unwrap();
    assert!(avg.abs() < 0.001, "average not reset: {avg}");

    let (_, body) = ctx
        .get(&format!("/api/products/{product_id}/reviews"), None)
        .await;
    assert!(data(&body).as_array().unwrap().is_empty());
}
