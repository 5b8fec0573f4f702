//! Coupon repository.
//!
//! Redemption is reserved inside the checkout transaction with a guarded
//! `used_count` increment, so two carts cannot both take the last use of a
//! capped code.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use clementine_core::{CouponId, DiscountType, OrderId, UserId};

use super::{parse_enum, RepositoryError};
use crate::models::coupon::Coupon;

#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    id: i32,
    code: String,
    discount_type: String,
    value: Decimal,
    max_discount: Option<Decimal>,
    min_order_amount: Decimal,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
    usage_limit: Option<i32>,
    per_user_limit: Option<i32>,
    used_count: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = RepositoryError;

    fn try_from(row: CouponRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: CouponId::new(row.id),
            code: row.code,
            discount_type: parse_enum::<DiscountType>(&row.discount_type)?,
            value: row.value,
            max_discount: row.max_discount,
            min_order_amount: row.min_order_amount,
            valid_from: row.valid_from,
            valid_until: row.valid_until,
            usage_limit: row.usage_limit,
            per_user_limit: row.per_user_limit,
            used_count: row.used_count,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// New-coupon parameters.
pub struct NewCoupon<'a> {
    pub code: &'a str,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub max_discount: Option<Decimal>,
    pub min_order_amount: Decimal,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub usage_limit: Option<i32>,
    pub per_user_limit: Option<i32>,
    pub is_active: bool,
}

/// Repository for coupon database operations.
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    /// Create a new coupon repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all coupons, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Coupon>, RepositoryError> {
        let rows: Vec<CouponRow> =
            sqlx::query_as("SELECT * FROM coupons ORDER BY created_at DESC")
                .fetch_all(self.pool)
                .await?;

        rows.into_iter().map(Coupon::try_from).collect()
    }

    /// Get a coupon by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CouponId) -> Result<Option<Coupon>, RepositoryError> {
        let row: Option<CouponRow> = sqlx::query_as("SELECT * FROM coupons WHERE id = $1")
            .bind(id.as_i32())
            .fetch_optional(self.pool)
            .await?;

        row.map(Coupon::try_from).transpose()
    }

    /// Look a coupon up by code, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        let row: Option<CouponRow> =
            sqlx::query_as("SELECT * FROM coupons WHERE UPPER(code) = UPPER($1)")
                .bind(code)
                .fetch_optional(self.pool)
                .await?;

        row.map(Coupon::try_from).transpose()
    }

    /// Create a coupon. Codes are stored uppercase.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code is already taken.
    pub async fn create(&self, new: NewCoupon<'_>) -> Result<Coupon, RepositoryError> {
        let row: CouponRow = sqlx::query_as(
            "INSERT INTO coupons (code, discount_type, value, max_discount, min_order_amount, \
             valid_from, valid_until, usage_limit, per_user_limit, is_active) \
             VALUES (UPPER($1), $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *",
        )
        .bind(new.code)
        .bind(new.discount_type.to_string())
        .bind(new.value)
        .bind(new.max_discount)
        .bind(new.min_order_amount)
        .bind(new.valid_from)
        .bind(new.valid_until)
        .bind(new.usage_limit)
        .bind(new.per_user_limit)
        .bind(new.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "A coupon with this code already exists"))?;

        Coupon::try_from(row)
    }

    /// Update a coupon's terms. `used_count` is never writable from here.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon doesn't exist,
    /// `RepositoryError::Conflict` if the code is already taken.
    pub async fn update(
        &self,
        id: CouponId,
        new: NewCoupon<'_>,
    ) -> Result<Coupon, RepositoryError> {
        let row: Option<CouponRow> = sqlx::query_as(
            "UPDATE coupons SET code = UPPER($2), discount_type = $3, value = $4, \
             max_discount = $5, min_order_amount = $6, valid_from = $7, valid_until = $8, \
             usage_limit = $9, per_user_limit = $10, is_active = $11, updated_at = now() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id.as_i32())
        .bind(new.code)
        .bind(new.discount_type.to_string())
        .bind(new.value)
        .bind(new.max_discount)
        .bind(new.min_order_amount)
        .bind(new.valid_from)
        .bind(new.valid_until)
        .bind(new.usage_limit)
        .bind(new.per_user_limit)
        .bind(new.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "A coupon with this code already exists"))?;

        row.map(Coupon::try_from)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    /// Delete a coupon.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: CouponId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM coupons WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// How many times a user has already redeemed this coupon.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn user_redemption_count(
        &self,
        coupon_id: CouponId,
        user_id: UserId,
    ) -> Result<i64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM coupon_redemptions WHERE coupon_id = $1 AND user_id = $2",
        )
        .bind(coupon_id.as_i32())
        .bind(user_id.as_i32())
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }
}

// =============================================================================
// Transaction-scoped helpers (checkout, cancellation)
// =============================================================================

/// Take one use of the coupon, guarded against the global cap.
///
/// Returns `false` when the cap is already reached; the caller aborts the
/// transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn try_redeem(
    conn: &mut PgConnection,
    coupon_id: CouponId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "UPDATE coupons SET used_count = used_count + 1, updated_at = now() \
         WHERE id = $1 AND (usage_limit IS NULL OR used_count < usage_limit)",
    )
    .bind(coupon_id.as_i32())
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Tie the redemption to the order, for per-user limit accounting.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn record_redemption(
    conn: &mut PgConnection,
    coupon_id: CouponId,
    user_id: UserId,
    order_id: OrderId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO coupon_redemptions (coupon_id, user_id, order_id) VALUES ($1, $2, $3)",
    )
    .bind(coupon_id.as_i32())
    .bind(user_id.as_i32())
    .bind(order_id.as_i32())
    .execute(conn)
    .await?;
    Ok(())
}

/// Give a cancelled order's redemption back.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn release_redemption(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<(), RepositoryError> {
    let rows: Vec<(i32,)> = sqlx::query_as(
        "DELETE FROM coupon_redemptions WHERE order_id = $1 RETURNING coupon_id",
    )
    .bind(order_id.as_i32())
    .fetch_all(&mut *conn)
    .await?;

    for (coupon_id,) in rows {
        sqlx::query(
            "UPDATE coupons SET used_count = GREATEST(used_count - 1, 0), updated_at = now() \
             WHERE id = $1",
        )
        .bind(coupon_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}
