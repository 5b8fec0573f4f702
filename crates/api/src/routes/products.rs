//! Catalog routes.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use clementine_core::{CategoryId, NotificationAudience, NotificationKind, ProductId};

use crate::db::notifications::NewNotification;
use crate::db::products::{NewProduct, ProductFilter, ProductSort};
use crate::db::{NotificationRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::middleware::{OptionalAuth, RequireAdmin};
use crate::models::product::Product;
use crate::routes::{ok, ok_message, Envelope};
use crate::state::AppState;

/// Stock level at or below which the admin feed gets a low-stock alert.
const LOW_STOCK_THRESHOLD: i32 = 5;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub category_id: Option<i32>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub featured: Option<bool>,
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    /// Admin-only; ignored for everyone else.
    pub include_inactive: Option<bool>,
}

fn parse_sort(raw: Option<&str>) -> Result<ProductSort> {
    match raw {
        None | Some("newest") => Ok(ProductSort::Newest),
        Some("price_asc") => Ok(ProductSort::PriceAsc),
        Some("price_desc") => Ok(ProductSort::PriceDesc),
        Some("rating") => Ok(ProductSort::Rating),
        Some(other) => Err(AppError::Validation(format!("Unknown sort: {other}"))),
    }
}

/// `GET /api/products`
pub async fn list(
    State(state): State<AppState>,
    OptionalAuth(identity): OptionalAuth,
    Query(query): Query<ListQuery>,
) -> Result<Json<Envelope<Vec<Product>>>> {
    let is_admin = identity.is_some_and(|u| u.is_admin());
    let filter = ProductFilter {
        category_id: query.category_id.map(CategoryId::new),
        search: query.search.filter(|s| !s.trim().is_empty()),
        min_price: query.min_price,
        max_price: query.max_price,
        featured: query.featured,
        include_inactive: is_admin && query.include_inactive.unwrap_or(false),
        sort: parse_sort(query.sort.as_deref())?,
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(20),
    };

    let products = ProductRepository::new(state.pool()).list(&filter).await?;
    Ok(ok("OK", products))
}

/// `GET /api/products/{id}`
pub async fn get_one(
    State(state): State<AppState>,
    OptionalAuth(identity): OptionalAuth,
    Path(id): Path<i32>,
) -> Result<Json<Envelope<Product>>> {
    let product = ProductRepository::new(state.pool())
        .get(ProductId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    if !product.is_active && !identity.is_some_and(|u| u.is_admin()) {
        return Err(AppError::NotFound("Product not found".to_string()));
    }
    Ok(ok("OK", product))
}

#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub compare_price: Option<Decimal>,
    pub category_id: Option<i32>,
    pub stock: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
}

const fn default_true() -> bool {
    true
}

impl ProductRequest {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("Name is required".to_string()));
        }
        if self.price <= Decimal::ZERO {
            return Err(AppError::Validation("Price must be positive".to_string()));
        }
        if self.stock < 0 {
            return Err(AppError::Validation("Stock cannot be negative".to_string()));
        }
        Ok(())
    }

    fn as_new(&self) -> NewProduct<'_> {
        NewProduct {
            name: self.name.trim(),
            description: &self.description,
            price: self.price,
            compare_price: self.compare_price,
            category_id: self.category_id.map(CategoryId::new),
            stock: self.stock,
            is_active: self.is_active,
            is_featured: self.is_featured,
        }
    }
}

/// `POST /api/products` (admin)
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(body): Json<ProductRequest>,
) -> Result<Json<Envelope<Product>>> {
    body.validate()?;
    let product = ProductRepository::new(state.pool())
        .create(body.as_new())
        .await?;
    Ok(ok("Product created", product))
}

/// `PUT /api/products/{id}` (admin)
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<i32>,
    Json(body): Json<ProductRequest>,
) -> Result<Json<Envelope<Product>>> {
    body.validate()?;
    let product = ProductRepository::new(state.pool())
        .update(ProductId::new(id), body.as_new())
        .await?;
    Ok(ok("Product updated", product))
}

/// `DELETE /api/products/{id}` (admin)
pub async fn remove(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<i32>,
) -> Result<Json<Envelope<()>>> {
    let deleted = ProductRepository::new(state.pool())
        .delete(ProductId::new(id))
        .await?;
    if !deleted {
        return Err(AppError::NotFound("Product not found".to_string()));
    }
    Ok(ok_message("Product deleted"))
}

#[derive(Debug, Deserialize)]
pub struct StockAdjustment {
    /// Signed delta; positive restocks, negative removes.
    pub delta: i32,
}

/// `PATCH /api/products/{id}/stock` (admin)
///
/// Applies a signed stock delta and raises a low-stock alert when the result
/// falls to the threshold.
pub async fn adjust_stock(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<i32>,
    Json(body): Json<StockAdjustment>,
) -> Result<Json<Envelope<Product>>> {
    if body.delta == 0 {
        return Err(AppError::Validation("Delta cannot be zero".to_string()));
    }
    let product = ProductRepository::new(state.pool())
        .adjust_stock(ProductId::new(id), body.delta)
        .await?;

    if product.stock <= LOW_STOCK_THRESHOLD {
        let title = format!("Low stock: {}", product.name);
        let body_text = format!("{} units remaining", product.stock);
        if let Err(e) = NotificationRepository::new(state.pool())
            .create(NewNotification {
                audience: NotificationAudience::Admin,
                user_id: None,
                kind: NotificationKind::LowStock,
                title: &title,
                body: &body_text,
                order_id: None,
                product_id: Some(product.id),
            })
            .await
        {
            tracing::warn!(error = %e, "failed to persist low-stock notification");
        }
        state.notifier().emit_admin(
            "adminNotification",
            json!({
                "title": title,
                "productId": product.id,
                "stock": product.stock,
            }),
        );
    }

    Ok(ok("Stock adjusted", product))
}

/// `POST /api/products/{id}/images` (admin, multipart)
///
/// Accepts one `image` part, stores it under the upload directory with a
/// generated name, and appends the public path to the product.
pub async fn upload_image(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> Result<Json<Envelope<Product>>> {
    let repo = ProductRepository::new(state.pool());
    if repo.get(ProductId::new(id)).await?.is_none() {
        return Err(AppError::NotFound("Product not found".to_string()));
    }

    let field = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
        .ok_or_else(|| AppError::Validation("Expected an image field".to_string()))?;

    let extension = match field.content_type() {
        Some("image/png") => "png",
        Some("image/jpeg") => "jpg",
        Some("image/webp") => "webp",
        other => {
            return Err(AppError::Validation(format!(
                "Unsupported image type: {}",
                other.unwrap_or("unknown")
            )));
        }
    };

    let bytes = field
        .bytes()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?;
    if bytes.is_empty() {
        return Err(AppError::Validation("Empty upload".to_string()));
    }

    let filename = format!("{}.{extension}", Uuid::new_v4().simple());
    let dir = state.config().upload_dir.clone();
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    tokio::fs::write(dir.join(&filename), &bytes)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let product = repo
        .add_image(ProductId::new(id), &format!("/uploads/{filename}"))
        .await?;
    Ok(ok("Image uploaded", product))
}
