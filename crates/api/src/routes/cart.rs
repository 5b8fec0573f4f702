//! Cart routes.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use clementine_core::{CartItemId, ProductId};

use crate::db::{CartRepository, CouponRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::cart::Cart;
use crate::routes::{ok, Envelope};
use crate::state::AppState;

/// `GET /api/cart`
pub async fn get_cart(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<Envelope<Cart>>> {
    let cart = CartRepository::new(state.pool())
        .get_cart(identity.user_id)
        .await?;
    Ok(ok("OK", cart))
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: i32,
    pub quantity: i32,
}

/// `POST /api/cart/items`
///
/// Rejects the add outright when the requested quantity (plus what is
/// already in the cart) exceeds stock, naming how many are available.
pub async fn add_item(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Json(body): Json<AddItemRequest>,
) -> Result<Json<Envelope<Cart>>> {
    if body.quantity < 1 {
        return Err(AppError::Validation(
            "Quantity must be at least 1".to_string(),
        ));
    }

    let product = ProductRepository::new(state.pool())
        .get(ProductId::new(body.product_id))
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let repo = CartRepository::new(state.pool());
    let cart_id = repo.get_or_create(identity.user_id).await?;
    let already = repo.active_quantity(cart_id, product.id).await?;

    if already + body.quantity > product.stock {
        return Err(AppError::Conflict(format!(
            "Only {} of {} available",
            product.stock, product.name
        )));
    }

    repo.add_item(cart_id, product.id, body.quantity, product.price)
        .await?;
    let cart = repo.get_cart(identity.user_id).await?;
    Ok(ok("Added to cart", cart))
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i32,
}

/// `PUT /api/cart/items/{id}`
pub async fn update_item(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(id): Path<i32>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<Json<Envelope<Cart>>> {
    if body.quantity < 1 {
        return Err(AppError::Validation(
            "Quantity must be at least 1; remove the item instead".to_string(),
        ));
    }
    let repo = CartRepository::new(state.pool());
    let cart_id = repo.get_or_create(identity.user_id).await?;
    repo.update_quantity(cart_id, CartItemId::new(id), body.quantity)
        .await?;
    let cart = repo.get_cart(identity.user_id).await?;
    Ok(ok("Cart updated", cart))
}

/// `DELETE /api/cart/items/{id}`
pub async fn remove_item(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Json<Envelope<Cart>>> {
    let repo = CartRepository::new(state.pool());
    let cart_id = repo.get_or_create(identity.user_id).await?;
    repo.remove_item(cart_id, CartItemId::new(id)).await?;
    let cart = repo.get_cart(identity.user_id).await?;
    Ok(ok("Item removed", cart))
}

/// `DELETE /api/cart`
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<Envelope<Cart>>> {
    let repo = CartRepository::new(state.pool());
    let cart_id = repo.get_or_create(identity.user_id).await?;
    repo.clear(cart_id).await?;
    let cart = repo.get_cart(identity.user_id).await?;
    Ok(ok("Cart cleared", cart))
}

/// `PUT /api/cart/items/{id}/save`
pub async fn save_for_later(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Json<Envelope<Cart>>> {
    let repo = CartRepository::new(state.pool());
    let cart_id = repo.get_or_create(identity.user_id).await?;
    repo.set_saved(cart_id, CartItemId::new(id), true).await?;
    let cart = repo.get_cart(identity.user_id).await?;
    Ok(ok("Saved for later", cart))
}

/// `PUT /api/cart/items/{id}/activate`
pub async fn move_to_cart(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Json<Envelope<Cart>>> {
    let repo = CartRepository::new(state.pool());
    let cart_id = repo.get_or_create(identity.user_id).await?;
    repo.set_saved(cart_id, CartItemId::new(id), false).await?;
    let cart = repo.get_cart(identity.user_id).await?;
    Ok(ok("Moved to cart", cart))
}

#[derive(Debug, Deserialize)]
pub struct CouponPreviewRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct CouponPreview {
    pub code: String,
    pub discount: Decimal,
    pub subtotal: Decimal,
    pub total_after_discount: Decimal,
}

/// `POST /api/cart/coupon`
///
/// Previews a coupon against the current cart. Nothing is reserved; the
/// real redemption happens inside checkout.
pub async fn preview_coupon(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Json(body): Json<CouponPreviewRequest>,
) -> Result<Json<Envelope<CouponPreview>>> {
    let cart = CartRepository::new(state.pool())
        .get_cart(identity.user_id)
        .await?;
    if cart.items.is_empty() {
        return Err(AppError::Validation("Your cart is empty".to_string()));
    }

    let repo = CouponRepository::new(state.pool());
    let coupon = repo
        .get_by_code(&body.code)
        .await?
        .ok_or_else(|| AppError::Validation("Invalid coupon code".to_string()))?;
    let redemptions = repo
        .user_redemption_count(coupon.id, identity.user_id)
        .await?;
    coupon
        .check(Utc::now(), cart.total_price, redemptions)
        .map_err(|rejection| AppError::Validation(rejection.message()))?;

    let discount = coupon.discount_for(cart.total_price);
    Ok(ok(
        "Coupon applied",
        CouponPreview {
            code: coupon.code,
            discount,
            subtotal: cart.total_price,
            total_after_discount: cart.total_price - discount,
        },
    ))
}
