//! HTTP route handlers.
//!
//! Every response uses the same envelope: `{success, message, data}` with
//! `data` omitted when there is nothing to return. Errors render through
//! `AppError` into the same shape with `success: false`.

pub mod auth;
pub mod cart;
pub mod categories;
pub mod coupons;
pub mod notifications;
pub mod orders;
pub mod payment;
pub mod products;
pub mod reports;
pub mod reviews;
pub mod ws;

use axum::{
    Json, Router,
    routing::{delete, get, patch, post, put},
};
use serde::Serialize;

use crate::state::AppState;

/// The standard response envelope.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// A success envelope with a payload.
pub fn ok<T: Serialize>(message: impl Into<String>, data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: message.into(),
        data: Some(data),
    })
}

/// A success envelope with no payload.
pub fn ok_message(message: impl Into<String>) -> Json<Envelope<()>> {
    Json(Envelope {
        success: true,
        message: message.into(),
        data: None,
    })
}

/// Assemble the full API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/api/auth", auth_routes())
        .nest("/api/products", product_routes())
        .nest("/api/categories", category_routes())
        .nest("/api/cart", cart_routes())
        .nest("/api/orders", order_routes())
        .nest("/api/coupons", coupon_routes())
        .nest("/api/reviews", review_routes())
        .nest("/api/notifications", notification_routes())
        .nest("/api/reports", report_routes())
        .nest("/api/payment", payment_routes())
        .route("/api/ws", get(ws::upgrade))
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/google", get(auth::google_redirect))
        .route("/google/callback", get(auth::google_callback))
        .route("/me", get(auth::me))
        .route("/profile", put(auth::update_profile))
        .route("/password", put(auth::change_password))
        .route("/account", delete(auth::delete_account))
        .route("/settings", put(auth::update_settings))
        .route("/addresses", get(auth::list_addresses).post(auth::create_address))
        .route(
            "/addresses/{id}",
            put(auth::update_address).delete(auth::delete_address),
        )
        .route("/addresses/{id}/default", put(auth::set_default_address))
}

fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::list).post(products::create))
        .route(
            "/{id}",
            get(products::get_one)
                .put(products::update)
                .delete(products::remove),
        )
        .route("/{id}/stock", patch(products::adjust_stock))
        .route("/{id}/images", post(products::upload_image))
        .route("/{id}/reviews", get(reviews::list_for_product))
}

fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(categories::list).post(categories::create))
        .route(
            "/{id}",
            get(categories::get_one)
                .put(categories::update)
                .delete(categories::remove),
        )
}

fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::get_cart).delete(cart::clear))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{id}",
            put(cart::update_item).delete(cart::remove_item),
        )
        .route("/items/{id}/save", put(cart::save_for_later))
        .route("/items/{id}/activate", put(cart::move_to_cart))
        .route("/coupon", post(cart::preview_coupon))
}

fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::list_mine).post(orders::place))
        .route("/all", get(orders::list_all))
        .route("/number/{order_number}", get(orders::get_by_number))
        .route("/{id}", get(orders::get_one))
        .route("/{id}/status", put(orders::update_status))
        .route("/{id}/cancel", post(orders::cancel))
        .route("/{id}/reactivate", post(orders::reactivate))
}

fn coupon_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(coupons::list).post(coupons::create))
        .route("/validate", post(coupons::validate))
        .route(
            "/{id}",
            put(coupons::update).delete(coupons::remove),
        )
}

fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(reviews::create))
        .route("/mine", get(reviews::list_mine))
        .route("/pending", get(reviews::list_pending))
        .route("/{id}/moderate", put(reviews::moderate))
        .route("/{id}", delete(reviews::remove))
}

fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(notifications::list))
        .route("/unread-count", get(notifications::unread_count))
        .route("/read-all", put(notifications::mark_all_read))
        .route(
            "/{id}/read",
            put(notifications::mark_read),
        )
        .route("/{id}", delete(notifications::remove))
}

fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/sales", get(reports::sales))
        .route("/top-products", get(reports::top_products))
        .route("/low-stock", get(reports::low_stock))
        .route("/overview", get(reports::overview))
}

fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/intent", post(payment::create_intent))
        .route("/confirm", post(payment::confirm))
        .route("/webhook", post(payment::webhook))
}
