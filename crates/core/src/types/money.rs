//! Order money math on `rust_decimal::Decimal`.
//!
//! Tax is a flat 8% applied to the discounted subtotal. Shipping is a flat
//! fee, waived once the discounted subtotal reaches the free-shipping
//! threshold. All amounts are rounded to two decimal places.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Flat tax rate (8%).
pub const TAX_RATE: Decimal = Decimal::from_parts(8, 0, 0, false, 2);

/// Flat shipping fee ($10.00).
pub const SHIPPING_FEE: Decimal = Decimal::from_parts(1000, 0, 0, false, 2);

/// Discounted subtotal at which shipping is free ($100.00).
pub const FREE_SHIPPING_THRESHOLD: Decimal = Decimal::from_parts(10000, 0, 0, false, 2);

/// Computed totals for an order at checkout time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub shipping_fee: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// Compute totals from an item subtotal and a (pre-capped) discount.
    ///
    /// The discount is clamped to the subtotal so the taxable base can never
    /// go negative.
    #[must_use]
    pub fn compute(subtotal: Decimal, discount: Decimal) -> Self {
        let discount = discount.min(subtotal).max(Decimal::ZERO);
        let taxable = subtotal - discount;
        let tax = (taxable * TAX_RATE).round_dp(2);
        let shipping_fee = if taxable >= FREE_SHIPPING_THRESHOLD {
            Decimal::ZERO
        } else {
            SHIPPING_FEE
        };
        let total = taxable + tax + shipping_fee;

        Self {
            subtotal,
            discount,
            tax,
            shipping_fee,
            total,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_constants() {
        assert_eq!(TAX_RATE, dec("0.08"));
        assert_eq!(SHIPPING_FEE, dec("10.00"));
        assert_eq!(FREE_SHIPPING_THRESHOLD, dec("100.00"));
    }

    #[test]
    fn test_small_order_pays_shipping() {
        let totals = OrderTotals::compute(dec("50.00"), Decimal::ZERO);
        assert_eq!(totals.tax, dec("4.00"));
        assert_eq!(totals.shipping_fee, dec("10.00"));
        assert_eq!(totals.total, dec("64.00"));
    }

    #[test]
    fn test_free_shipping_at_threshold() {
        let totals = OrderTotals::compute(dec("100.00"), Decimal::ZERO);
        assert_eq!(totals.shipping_fee, Decimal::ZERO);
        assert_eq!(totals.total, dec("108.00"));
    }

    #[test]
    fn test_discount_reduces_taxable_base() {
        let totals = OrderTotals::compute(dec("100.00"), dec("20.00"));
        // Discounted subtotal 80.00 drops below the free-shipping threshold
        assert_eq!(totals.tax, dec("6.40"));
        assert_eq!(totals.shipping_fee, dec("10.00"));
        assert_eq!(totals.total, dec("96.40"));
    }

    #[test]
    fn test_discount_clamped_to_subtotal() {
        let totals = OrderTotals::compute(dec("30.00"), dec("50.00"));
        assert_eq!(totals.discount, dec("30.00"));
        assert_eq!(totals.tax, Decimal::ZERO);
        assert_eq!(totals.total, dec("10.00"));
    }

    #[test]
    fn test_tax_rounded_to_cents() {
        let totals = OrderTotals::compute(dec("19.99"), Decimal::ZERO);
        assert_eq!(totals.tax, dec("1.60"));
    }
}
