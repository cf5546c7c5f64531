//! Checkout pricing rules.
//!
//! Pure functions shared by both store backends so that every checkout,
//! regardless of backend, prices a cart identically.

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

/// Flat tax rate applied to every order, in percent.
pub const TAX_RATE_PERCENT: u32 = 8;

/// Orders with a subtotal at or above this amount ship free.
pub const FREE_SHIPPING_THRESHOLD: Money = Money::from_dollars(100);

/// Flat shipping charge below the free-shipping threshold.
pub const FLAT_SHIPPING: Money = Money::from_dollars(10);

/// A cart line with its unit price frozen for checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub size: String,
    pub color: String,
    pub unit_price: Money,
}

impl PricedLine {
    /// Returns unit price × quantity.
    pub fn total_price(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// The monetary breakdown of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub discount: Money,
    pub total: Money,
}

/// Prices an order from its frozen lines.
///
/// `subtotal` is the sum of line totals; tax is a flat
/// [`TAX_RATE_PERCENT`]; shipping is waived at or above
/// [`FREE_SHIPPING_THRESHOLD`] (boundary inclusive). There is no promotion
/// engine, so the discount is always zero and
/// `total = subtotal + tax + shipping`.
pub fn order_totals(lines: &[PricedLine]) -> Totals {
    let subtotal: Money = lines.iter().map(PricedLine::total_price).sum();
    let tax = subtotal.percent(TAX_RATE_PERCENT);
    let shipping = if subtotal >= FREE_SHIPPING_THRESHOLD {
        Money::zero()
    } else {
        FLAT_SHIPPING
    };
    let discount = Money::zero();
    let total = subtotal + tax + shipping - discount;

    Totals {
        subtotal,
        tax,
        shipping,
        discount,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(unit_cents: i64, quantity: u32) -> PricedLine {
        PricedLine {
            product_id: ProductId::new(),
            quantity,
            size: "10".to_string(),
            color: "black".to_string(),
            unit_price: Money::from_cents(unit_cents),
        }
    }

    #[test]
    fn free_shipping_over_threshold() {
        // $120.00 x 1: free shipping, 8% tax
        let totals = order_totals(&[line(12000, 1)]);
        assert_eq!(totals.subtotal.cents(), 12000);
        assert_eq!(totals.tax.cents(), 960);
        assert_eq!(totals.shipping.cents(), 0);
        assert_eq!(totals.discount.cents(), 0);
        assert_eq!(totals.total.cents(), 12960);
    }

    #[test]
    fn free_shipping_boundary_is_inclusive() {
        // $50.00 x 2 lands exactly on the $100 threshold
        let totals = order_totals(&[line(5000, 2)]);
        assert_eq!(totals.subtotal.cents(), 10000);
        assert_eq!(totals.shipping.cents(), 0);
        assert_eq!(totals.tax.cents(), 800);
        assert_eq!(totals.total.cents(), 10800);
    }

    #[test]
    fn flat_shipping_below_threshold() {
        // $40.00 x 1
        let totals = order_totals(&[line(4000, 1)]);
        assert_eq!(totals.subtotal.cents(), 4000);
        assert_eq!(totals.tax.cents(), 320);
        assert_eq!(totals.shipping.cents(), 1000);
        assert_eq!(totals.total.cents(), 5320);
    }

    #[test]
    fn subtotal_sums_line_totals() {
        let lines = [line(2599, 2), line(999, 3)];
        let totals = order_totals(&lines);
        let expected: Money = lines.iter().map(PricedLine::total_price).sum();
        assert_eq!(totals.subtotal, expected);
    }

    #[test]
    fn total_identity_holds() {
        for lines in [
            vec![],
            vec![line(1, 1)],
            vec![line(3333, 3), line(107, 1)],
            vec![line(9999, 10)],
        ] {
            let t = order_totals(&lines);
            assert_eq!(t.total, t.subtotal + t.tax + t.shipping - t.discount);
        }
    }

    #[test]
    fn empty_cart_prices_to_shipping_only() {
        // The checkout engine rejects empty carts before pricing; this
        // pins the function's own behavior regardless.
        let totals = order_totals(&[]);
        assert_eq!(totals.subtotal.cents(), 0);
        assert_eq!(totals.total, FLAT_SHIPPING);
    }
}
