//! End-to-end storefront flow: accounts, browsing, cart, checkout.
//!
//! Requires a running API server with a migrated database and a seeded
//! admin account. See the crate docs for environment variables.

use clementine_core::OrderTotals;
use clementine_integration_tests::{TestContext, data, error_message, unique_email, TEST_PASSWORD};
use reqwest::StatusCode;
use rust_decimal::Decimal;
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

/// Create a fresh product via the admin API and return its id and stock.
async fn create_product(ctx: &TestContext, admin: &str, stock: i32) -> (i64, i32) {
    let (status, body) = ctx
        .post(
            "/api/products",
            Some(admin),
            &json!({
                "name": format!("Flow Widget {}", uuid::Uuid::new_v4().simple()),
                "description": "Created by the storefront flow tests",
                "price": "19.99",
                "stock": stock,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "product create failed: {body}");
    let id = data(&body)["id"].as_i64().unwrap();
    (id, stock)
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_health_endpoints() {
    let ctx = TestContext::new();
    let resp = ctx.client.get(ctx.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = ctx
        .client
        .get(ctx.url("/health/ready"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

// ============================================================================
// Accounts
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_register_login_me() {
    let ctx = TestContext::new();
    let email = unique_email("register");
    let token = ctx.register_customer(&email).await;

    let (status, body) = ctx.get("/api/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let me = data(&body);
    assert_eq!(me["email"], email);
    assert_eq!(me["role"], "customer");

    // A second registration with the same email must be rejected.
    let (status, body) = ctx
        .post(
            "/api/auth/register",
            None,
            &json!({"name": "Dup", "email": email, "password": TEST_PASSWORD}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "duplicate accepted: {body}");

    // Login round-trips.
    let token = ctx.login(&email, TEST_PASSWORD).await;
    let (status, _) = ctx.get("/api/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_weak_password_rejected() {
    let ctx = TestContext::new();
    let (status, body) = ctx
        .post(
            "/api/auth/register",
            None,
            &json!({"name": "Weak", "email": unique_email("weak"), "password": "short"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!error_message(&body).is_empty());
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_wrong_password_rejected() {
    let ctx = TestContext::new();
    let email = unique_email("badpw");
    ctx.register_customer(&email).await;
    let (status, _) = ctx
        .post(
            "/api/auth/login",
            None,
            &json!({"email": email, "password": "not-the-password-1"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_profile_and_settings_update() {
    let ctx = TestContext::new();
    let email = unique_email("profile");
    let token = ctx.register_customer(&email).await;

    let (status, body) = ctx
        .put(
            "/api/auth/profile",
            Some(&token),
            &json!({"name": "Renamed Customer", "email": email}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["name"], "Renamed Customer");

    let (status, _) = ctx
        .put("/api/auth/settings", Some(&token), &json!({"theme": "dark"}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx
        .put(
            "/api/auth/settings",
            Some(&token),
            &json!({"theme": "neon"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_products_listing_is_public() {
    let ctx = TestContext::new();
    let (status, body) = ctx.get("/api/products", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(data(&body).is_array());
}

#[tokio::test]
#[ignore = "Requires running API server and admin credentials"]
async fn test_inactive_product_hidden_from_customers() {
    let ctx = TestContext::new();
    let admin = ctx.admin_token().await;
    let (status, body) = ctx
        .post(
            "/api/products",
            Some(&admin),
            &json!({
                "name": format!("Hidden {}", uuid::Uuid::new_v4().simple()),
                "description": "Not for sale yet",
                "price": "9.50",
                "stock": 3,
                "is_active": false,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let id = data(&body)["id"].as_i64().unwrap();

    let (status, _) = ctx.get(&format!("/api/products/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The admin still sees it.
    let (status, _) = ctx.get(&format!("/api/products/{id}"), Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// Cart
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server and admin credentials"]
async fn test_cart_add_update_and_stock_cap() {
    let ctx = TestContext::new();
    let admin = ctx.admin_token().await;
    let customer = ctx.register_customer(&unique_email("cart")).await;
    let (product_id, stock) = create_product(&ctx, &admin, 4).await;

    // Adding within stock succeeds.
    let (status, body) = ctx
        .post(
            "/api/cart/items",
            Some(&customer),
            &json!({"product_id": product_id, "quantity": 2}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "add failed: {body}");
    let cart = data(&body);
    let item = &cart["items"][0];
    assert_eq!(item["quantity"], 2);
    let item_id = item["id"].as_i64().unwrap();

    // Pushing the total past stock is rejected with the available count.
    let (status, body) = ctx
        .post(
            "/api/cart/items",
            Some(&customer),
            &json!({"product_id": product_id, "quantity": stock}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(error_message(&body).contains(&stock.to_string()));

    // Quantity updates round-trip.
    let (status, body) = ctx
        .put(
            &format!("/api/cart/items/{item_id}"),
            Some(&customer),
            &json!({"quantity": 3}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["items"][0]["quantity"], 3);

    // Zero quantity is a validation error, not a removal.
    let (status, _) = ctx
        .put(
            &format!("/api/cart/items/{item_id}"),
            Some(&customer),
            &json!({"quantity": 0}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API server and admin credentials"]
async fn test_save_for_later_excluded_from_totals() {
    let ctx = TestContext::new();
    let admin = ctx.admin_token().await;
    let customer = ctx.register_customer(&unique_email("saved")).await;
    let (product_id, _) = create_product(&ctx, &admin, 10).await;

    let (_, body) = ctx
        .post(
            "/api/cart/items",
            Some(&customer),
            &json!({"product_id": product_id, "quantity": 1}),
        )
        .await;
    let item_id = data(&body)["items"][0]["id"].as_i64().unwrap();

    let (status, body) = ctx
        .put(
            &format!("/api/cart/items/{item_id}/save"),
            Some(&customer),
            &json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let cart = data(&body);
    assert!(cart["items"].as_array().unwrap().is_empty());
    assert_eq!(cart["saved_items"].as_array().unwrap().len(), 1);
    assert_eq!(cart["item_count"], 0);

    // Moving it back reactivates the line.
    let (status, body) = ctx
        .put(
            &format!("/api/cart/items/{item_id}/activate"),
            Some(&customer),
            &json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let cart = data(&body);
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert!(cart["saved_items"].as_array().unwrap().is_empty());
}

// ============================================================================
// Checkout
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server and admin credentials"]
async fn test_checkout_happy_path() {
    let ctx = TestContext::new();
    let admin = ctx.admin_token().await;
    let customer = ctx.register_customer(&unique_email("checkout")).await;
    let (product_id, stock) = create_product(&ctx, &admin, 5).await;

    let (status, _) = ctx
        .post(
            "/api/cart/items",
            Some(&customer),
            &json!({"product_id": product_id, "quantity": 2}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = ctx
        .post(
            "/api/orders",
            Some(&customer),
            &json!({
                "shipping_address": shipping_address(),
                "payment_method": "cash",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "checkout failed: {body}");
    let order = data(&body);
    assert!(order["order_number"].as_str().unwrap().starts_with("ORD-"));
    assert_eq!(order["status"], "pending");
    assert_eq!(order["items"].as_array().unwrap().len(), 1);

    // Totals follow the shared money math: 2 x 19.99, no discount.
    let expected = OrderTotals::compute("39.98".parse::<Decimal>().unwrap(), Decimal::ZERO);
    let total: Decimal = order["total"].as_str().unwrap().parse().unwrap();
    let tax: Decimal = order["tax"].as_str().unwrap().parse().unwrap();
    assert_eq!(total, expected.total);
    assert_eq!(tax, expected.tax);

    // Stock was decremented.
    let (_, body) = ctx.get(&format!("/api/products/{product_id}"), Some(&admin)).await;
    assert_eq!(data(&body)["stock"], stock - 2);

    // The cart's active lines were cleared.
    let (_, body) = ctx.get("/api/cart", Some(&customer)).await;
    assert!(
        data(&body)["items"].as_array().unwrap().is_empty(),
        "active items survived checkout"
    );
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_checkout_empty_cart_rejected() {
    let ctx = TestContext::new();
    let customer = ctx.register_customer(&unique_email("empty")).await;
    let (status, _) = ctx
        .post(
            "/api/orders",
            Some(&customer),
            &json!({
                "shipping_address": shipping_address(),
                "payment_method": "cash",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API server and admin credentials"]
async fn test_checkout_insufficient_stock_rejected() {
    let ctx = TestContext::new();
    let admin = ctx.admin_token().await;
    let customer = ctx.register_customer(&unique_email("nostock")).await;
    let (product_id, _) = create_product(&ctx, &admin, 3).await;

    let (status, _) = ctx
        .post(
            "/api/cart/items",
            Some(&customer),
            &json!({"product_id": product_id, "quantity": 3}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Drain the stock out from under the cart.
    let (status, _) = ctx
        .patch(
            &format!("/api/products/{product_id}/stock"),
            Some(&admin),
            &json!({"delta": -3}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = ctx
        .post(
            "/api/orders",
            Some(&customer),
            &json!({
                "shipping_address": shipping_address(),
                "payment_method": "cash",
            }),
        )
        .await;
    // The clamp-on-view pass empties the cart, so checkout sees either the
    // conflict or an empty cart depending on timing.
    assert!(
        status == StatusCode::CONFLICT || status == StatusCode::BAD_REQUEST,
        "unexpected status {status}: {body}"
    );
}

// ============================================================================
// Orders
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server and admin credentials"]
async fn test_customer_cancel_restores_stock() {
    let ctx = TestContext::new();
    let admin = ctx.admin_token().await;
    let customer = ctx.register_customer(&unique_email("cancel")).await;
    let (product_id, stock) = create_product(&ctx, &admin, 6).await;

    ctx.post(
        "/api/cart/items",
        Some(&customer),
        &json!({"product_id": product_id, "quantity": 2}),
    )
    .await;
    let (_, body) = ctx
        .post(
            "/api/orders",
            Some(&customer),
            &json!({
                "shipping_address": shipping_address(),
                "payment_method": "cash",
            }),
        )
        .await;
    let order_id = data(&body)["id"].as_i64().unwrap();

    let (status, body) = ctx
        .post(
            &format!("/api/orders/{order_id}/cancel"),
            Some(&customer),
            &json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "cancel failed: {body}");
    assert_eq!(data(&body)["status"], "cancelled");

    let (_, body) = ctx.get(&format!("/api/products/{product_id}"), Some(&admin)).await;
    assert_eq!(data(&body)["stock"], stock);
}

#[tokio::test]
#[ignore = "Requires running API server and admin credentials"]
async fn test_orders_are_private_to_their_owner() {
    let ctx = TestContext::new();
    let admin = ctx.admin_token().await;
    let owner = ctx.register_customer(&unique_email("owner")).await;
    let stranger = ctx.register_customer(&unique_email("stranger")).await;
    let (product_id, _) = create_product(&ctx, &admin, 5).await;

    ctx.post(
        "/api/cart/items",
        Some(&owner),
        &json!({"product_id": product_id, "quantity": 1}),
    )
    .await;
    let (_, body) = ctx
        .post(
            "/api/orders",
            Some(&owner),
            &json!({
                "shipping_address": shipping_address(),
                "payment_method": "cash",
            }),
        )
        .await;
    let order_id = data(&body)["id"].as_i64().unwrap();

    let (status, _) = ctx.get(&format!("/api/orders/{order_id}"), Some(&stranger)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = ctx.get(&format!("/api/orders/{order_id}"), Some(&owner)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx.get(&format!("/api/orders/{order_id}"), Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
}
