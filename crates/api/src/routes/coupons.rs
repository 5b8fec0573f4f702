//! Coupon routes.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use clementine_core::{CouponId, DiscountType};

use crate::db::coupons::NewCoupon;
use crate::db::CouponRepository;
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::coupon::Coupon;
use crate::routes::{ok, ok_message, Envelope};
use crate::state::AppState;

/// `GET /api/coupons` (admin)
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Envelope<Vec<Coupon>>>> {
    let coupons = CouponRepository::new(state.pool()).list().await?;
    Ok(ok("OK", coupons))
}

#[derive(Debug, Deserialize)]
pub struct CouponRequest {
    pub code: String,
    pub discount_type: String,
    pub value: Decimal,
    pub max_discount: Option<Decimal>,
    #[serde(default)]
    pub min_order_amount: Decimal,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub usage_limit: Option<i32>,
    pub per_user_limit: Option<i32>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

impl CouponRequest {
    fn validate(&self) -> Result<DiscountType> {
        let discount_type = self
            .discount_type
            .parse::<DiscountType>()
            .map_err(AppError::Validation)?;

        if self.code.trim().is_empty() {
            return Err(AppError::Validation("Code is required".to_string()));
        }
        if self.value <= Decimal::ZERO {
            return Err(AppError::Validation(
                "Discount value must be positive".to_string(),
            ));
        }
        if discount_type == DiscountType::Percentage && self.value > Decimal::ONE_HUNDRED {
            return Err(AppError::Validation(
                "Percentage discount cannot exceed 100".to_string(),
            ));
        }
        if self.valid_until <= self.valid_from {
            return Err(AppError::Validation(
                "Validity window must end after it starts".to_string(),
            ));
        }
        if self.usage_limit.is_some_and(|l| l < 1) || self.per_user_limit.is_some_and(|l| l < 1) {
            return Err(AppError::Validation(
                "Usage limits must be at least 1".to_string(),
            ));
        }
        Ok(discount_type)
    }

    fn as_new(&self, discount_type: DiscountType) -> NewCoupon<'_> {
        NewCoupon {
            code: self.code.trim(),
            discount_type,
            value: self.value,
            max_discount: self.max_discount,
            min_order_amount: self.min_order_amount,
            valid_from: self.valid_from,
            valid_until: self.valid_until,
            usage_limit: self.usage_limit,
            per_user_limit: self.per_user_limit,
            is_active: self.is_active,
        }
    }
}

/// `POST /api/coupons` (admin)
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(body): Json<CouponRequest>,
) -> Result<Json<Envelope<Coupon>>> {
    let discount_type = body.validate()?;
    let coupon = CouponRepository::new(state.pool())
        .create(body.as_new(discount_type))
        .await?;
    Ok(ok("Coupon created", coupon))
}

/// `PUT /api/coupons/{id}` (admin)
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<i32>,
    Json(body): Json<CouponRequest>,
) -> Result<Json<Envelope<Coupon>>> {
    let discount_type = body.validate()?;
    let coupon = CouponRepository::new(state.pool())
        .update(CouponId::new(id), body.as_new(discount_type))
        .await?;
    Ok(ok("Coupon updated", coupon))
}

/// `DELETE /api/coupons/{id}` (admin)
pub async fn remove(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<i32>,
) -> Result<Json<Envelope<()>>> {
    let deleted = CouponRepository::new(state.pool())
        .delete(CouponId::new(id))
        .await?;
    if !deleted {
        return Err(AppError::NotFound("Coupon not found".to_string()));
    }
    Ok(ok_message("Coupon deleted"))
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub code: String,
    pub subtotal: Decimal,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub code: String,
    pub discount: Decimal,
}

/// `POST /api/coupons/validate`
///
/// Checks a code against a hypothetical subtotal for the signed-in user.
pub async fn validate(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Json(body): Json<ValidateRequest>,
) -> Result<Json<Envelope<ValidateResponse>>> {
    let repo = CouponRepository::new(state.pool());
    let coupon = repo
        .get_by_code(&body.code)
        .await?
        .ok_or_else(|| AppError::Validation("Invalid coupon code".to_string()))?;
    let redemptions = repo
        .user_redemption_count(coupon.id, identity.user_id)
        .await?;
    coupon
        .check(Utc::now(), body.subtotal, redemptions)
        .map_err(|rejection| AppError::Validation(rejection.message()))?;

    let discount = coupon.discount_for(body.subtotal);
    Ok(ok(
        "Coupon is valid",
        ValidateResponse {
            code: coupon.code,
            discount,
        },
    ))
}
