//! Cart Aggregate

use serde::{Deserialize, Serialize};
use crate::domain::aggregates::coupon::AppliedCoupon;
use crate::domain::services::pricing::calculate_totals;
use crate::domain::value_objects::{CartKey, Money};

/// Currency used for totals when the cart holds no priced lines.
pub const DEFAULT_CURRENCY: &str = "USD";

/// One line of a cart, guest or authenticated.
///
/// `price` is the unit price of the selected size. It is `None` when the
/// catalog no longer carries the size, in which case the line is kept but
/// contributes nothing to totals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: String,
    pub variation_id: String,
    pub color: String,
    pub size: String,
    pub quantity: u32,
    #[serde(default)]
    pub price: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl CartLine {
    pub fn key(&self) -> CartKey {
        CartKey::new(&self.product_id, &self.variation_id, &self.color, &self.size)
    }

    pub fn matches(&self, key: &CartKey) -> bool {
        self.product_id == key.product_id && self.variation_id == key.variation_id && self.color == key.color && self.size == key.size
    }
}

/// Derived totals; never stored apart from the lines they were computed from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub sub_total: Money,
    pub total: Money,
    pub savings: Money,
}

impl CartTotals {
    pub fn zero(currency: &str) -> Self {
        Self { sub_total: Money::zero(currency), total: Money::zero(currency), savings: Money::zero(currency) }
    }
}

impl Default for CartTotals { fn default() -> Self { Self::zero(DEFAULT_CURRENCY) } }

/// In-memory cart state: lines, at most one coupon, and the totals derived from both.
#[derive(Clone, Debug, Default)]
pub struct Cart {
    lines: Vec<CartLine>,
    coupon: Option<AppliedCoupon>,
    totals: CartTotals,
}

impl Cart {
    pub fn new() -> Self { Self::default() }

    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn coupon(&self) -> Option<&AppliedCoupon> { self.coupon.as_ref() }
    pub fn totals(&self) -> &CartTotals { &self.totals }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn item_count(&self) -> u32 { self.lines.iter().map(|l| l.quantity).sum() }

    pub fn line(&self, key: &CartKey) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.matches(key))
    }

    /// Replaces the lines with authoritative post-mutation state.
    pub fn replace_lines(&mut self, lines: Vec<CartLine>) {
        self.lines = lines;
        self.recalculate();
    }

    /// Stores the coupon; fails if one is already applied.
    pub fn apply_coupon(&mut self, coupon: AppliedCoupon) -> Result<(), CartCouponError> {
        if self.coupon.is_some() { return Err(CartCouponError::AlreadyApplied); }
        self.coupon = Some(coupon);
        self.recalculate();
        Ok(())
    }

    pub fn remove_coupon(&mut self) -> Result<AppliedCoupon, CartCouponError> {
        let coupon = self.coupon.take().ok_or(CartCouponError::NoneApplied)?;
        self.recalculate();
        Ok(coupon)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.recalculate();
    }

    pub fn recalculate(&mut self) -> &CartTotals {
        self.totals = calculate_totals(&self.lines, self.coupon.as_ref());
        &self.totals
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CartCouponError {
    #[error("A coupon is already applied")]
    AlreadyApplied,
    #[error("No coupon applied")]
    NoneApplied,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{CouponCode, DiscountPercentage};
    use rust_decimal::Decimal;

    fn line(product_id: &str, amount: i64, quantity: u32) -> CartLine {
        CartLine {
            product_id: product_id.into(), variation_id: "v1".into(), color: "Red".into(), size: "M".into(),
            quantity, price: Some(Money::usd(Decimal::new(amount, 0))), name: None,
        }
    }

    fn ten_percent() -> AppliedCoupon {
        AppliedCoupon { code: CouponCode::new("SAVE10").unwrap(), discount_percentage: DiscountPercentage::new(10).unwrap() }
    }

    #[test]
    fn test_cart_operations() {
        let mut cart = Cart::new();
        cart.replace_lines(vec![line("p1", 25, 2), line("p2", 10, 1)]);
        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.totals().sub_total.amount(), Decimal::new(60, 0));
        assert_eq!(cart.totals().total.amount(), Decimal::new(60, 0));

        cart.apply_coupon(ten_percent()).unwrap();
        assert_eq!(cart.totals().total.amount(), Decimal::new(54, 0));
        assert_eq!(cart.totals().savings.amount(), Decimal::new(6, 0));
    }

    #[test]
    fn test_second_coupon_rejected_and_total_unchanged() {
        let mut cart = Cart::new();
        cart.replace_lines(vec![line("p1", 25, 2), line("p2", 10, 1)]);
        cart.apply_coupon(ten_percent()).unwrap();
        let before = cart.totals().clone();
        assert_eq!(cart.apply_coupon(ten_percent()), Err(CartCouponError::AlreadyApplied));
        assert_eq!(cart.totals(), &before);
    }

    #[test]
    fn test_remove_coupon_restores_total() {
        let mut cart = Cart::new();
        cart.replace_lines(vec![line("p1", 25, 2)]);
        assert_eq!(cart.remove_coupon(), Err(CartCouponError::NoneApplied));
        cart.apply_coupon(ten_percent()).unwrap();
        cart.remove_coupon().unwrap();
        assert_eq!(cart.totals().total, cart.totals().sub_total);
        assert!(cart.totals().savings.is_zero());
    }

    #[test]
    fn test_line_key_matches() {
        let l = line("p1", 25, 1);
        assert!(l.matches(&l.key()));
        assert_eq!(l.key().to_string(), "p1-v1-Red-M");
    }
}
