//! Coupon domain type and discount math.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use clementine_core::{CouponId, DiscountType};

/// A discount code with a validity window and usage caps.
///
/// Validity is computed on read; there is no background expiry sweep.
/// The `used_count` increment happens inside the checkout transaction with a
/// `used_count < usage_limit` guard, so validation and redemption cannot race.
#[derive(Debug, Clone, Serialize)]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub discount_type: DiscountType,
    pub value: Decimal,
    /// Cap on a percentage discount.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_discount: Option<Decimal>,
    pub min_order_amount: Decimal,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_limit: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_user_limit: Option<i32>,
    pub used_count: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Why a coupon cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouponRejection {
    Inactive,
    NotYetValid,
    Expired,
    UsageLimitReached,
    PerUserLimitReached,
    MinimumNotMet { minimum: Decimal },
}

impl CouponRejection {
    /// Client-facing message.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Inactive => "This coupon is no longer active".to_string(),
            Self::NotYetValid => "This coupon is not valid yet".to_string(),
            Self::Expired => "This coupon has expired".to_string(),
            Self::UsageLimitReached => "This coupon has reached its usage limit".to_string(),
            Self::PerUserLimitReached => {
                "You have already used this coupon the maximum number of times".to_string()
            }
            Self::MinimumNotMet { minimum } => {
                format!("A minimum order of {minimum} is required for this coupon")
            }
        }
    }
}

impl Coupon {
    /// Check every redemption precondition except the atomic counter guard.
    ///
    /// `user_redemptions` is the caller's prior redemption count for this
    /// coupon; `subtotal` is the cart subtotal before discount.
    ///
    /// # Errors
    ///
    /// Returns the first failing precondition.
    pub fn check(
        &self,
        now: DateTime<Utc>,
        subtotal: Decimal,
        user_redemptions: i64,
    ) -> Result<(), CouponRejection> {
        if !self.is_active {
            return Err(CouponRejection::Inactive);
        }
        if now < self.valid_from {
            return Err(CouponRejection::NotYetValid);
        }
        if now > self.valid_until {
            return Err(CouponRejection::Expired);
        }
        if let Some(limit) = self.usage_limit
            && self.used_count >= limit
        {
            return Err(CouponRejection::UsageLimitReached);
        }
        if let Some(limit) = self.per_user_limit
            && user_redemptions >= i64::from(limit)
        {
            return Err(CouponRejection::PerUserLimitReached);
        }
        if subtotal < self.min_order_amount {
            return Err(CouponRejection::MinimumNotMet {
                minimum: self.min_order_amount,
            });
        }
        Ok(())
    }

    /// Whether the coupon is inside its validity window and active.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && now >= self.valid_from && now <= self.valid_until
    }

    /// Compute the discount for a given subtotal.
    ///
    /// Percentage discounts are capped by `max_discount`; fixed discounts are
    /// capped at the subtotal. Rounded to cents.
    #[must_use]
    pub fn discount_for(&self, subtotal: Decimal) -> Decimal {
        let raw = match self.discount_type {
            DiscountType::Percentage => {
                let pct = subtotal * self.value / Decimal::ONE_HUNDRED;
                match self.max_discount {
                    Some(cap) => pct.min(cap),
                    None => pct,
                }
            }
            DiscountType::Fixed => self.value,
        };
        raw.min(subtotal).max(Decimal::ZERO).round_dp(2)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn coupon(discount_type: DiscountType, value: &str) -> Coupon {
        let now = Utc::now();
        Coupon {
            id: CouponId::new(1),
            code: "SAVE10".to_string(),
            discount_type,
            value: value.parse().unwrap(),
            max_discount: None,
            min_order_amount: Decimal::ZERO,
            valid_from: now - Duration::days(1),
            valid_until: now + Duration::days(1),
            usage_limit: None,
            per_user_limit: None,
            used_count: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_percentage_discount() {
        let c = coupon(DiscountType::Percentage, "10");
        assert_eq!(c.discount_for("200.00".parse().unwrap()), "20.00".parse().unwrap());
    }

    #[test]
    fn test_percentage_capped_by_max_discount() {
        let mut c = coupon(DiscountType::Percentage, "50");
        c.max_discount = Some("15.00".parse().unwrap());
        assert_eq!(c.discount_for("100.00".parse().unwrap()), "15.00".parse().unwrap());
    }

    #[test]
    fn test_fixed_discount_capped_at_subtotal() {
        let c = coupon(DiscountType::Fixed, "25.00");
        assert_eq!(c.discount_for("10.00".parse().unwrap()), "10.00".parse().unwrap());
        assert_eq!(c.discount_for("40.00".parse().unwrap()), "25.00".parse().unwrap());
    }

    #[test]
    fn test_invalid_outside_window_even_if_active() {
        let mut c = coupon(DiscountType::Fixed, "5.00");
        c.is_active = true;
        let before = c.valid_from - Duration::hours(1);
        let after = c.valid_until + Duration::hours(1);
        assert!(!c.is_valid_at(before));
        assert!(!c.is_valid_at(after));
        assert!(c.is_valid_at(Utc::now()));

        assert_eq!(
            c.check(after, "50.00".parse().unwrap(), 0),
            Err(CouponRejection::Expired)
        );
        assert_eq!(
            c.check(before, "50.00".parse().unwrap(), 0),
            Err(CouponRejection::NotYetValid)
        );
    }

    #[test]
    fn test_usage_limits() {
        let mut c = coupon(DiscountType::Fixed, "5.00");
        c.usage_limit = Some(3);
        c.used_count = 3;
        assert_eq!(
            c.check(Utc::now(), "50.00".parse().unwrap(), 0),
            Err(CouponRejection::UsageLimitReached)
        );

        c.used_count = 2;
        c.per_user_limit = Some(1);
        assert_eq!(
            c.check(Utc::now(), "50.00".parse().unwrap(), 1),
            Err(CouponRejection::PerUserLimitReached)
        );
        assert!(c.check(Utc::now(), "50.00".parse().unwrap(), 0).is_ok());
    }

    #[test]
    fn test_minimum_order_amount() {
        let mut c = coupon(DiscountType::Fixed, "5.00");
        c.min_order_amount = "30.00".parse().unwrap();
        assert!(matches!(
            c.check(Utc::now(), "20.00".parse().unwrap(), 0),
            Err(CouponRejection::MinimumNotMet { .. })
        ));
        assert!(c.check(Utc::now(), "30.00".parse().unwrap(), 0).is_ok());
    }

    #[test]
    fn test_inactive_rejected() {
        let mut c = coupon(DiscountType::Fixed, "5.00");
        c.is_active = false;
        assert_eq!(
            c.check(Utc::now(), "50.00".parse().unwrap(), 0),
            Err(CouponRejection::Inactive)
        );
    }
}
