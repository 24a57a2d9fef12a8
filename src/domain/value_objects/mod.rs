//! Value Objects for the cart and coupon domain

use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Money value object
///
/// Serialized as `{ "amount": 25.0, "currency": "USD" }` so guest cart entries
/// and API payloads carry plain JSON numbers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_string() } }
    pub fn usd(amount: Decimal) -> Self { Self::new(amount, "USD") }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn is_zero(&self) -> bool { self.amount.is_zero() }
    pub fn is_negative(&self) -> bool { self.amount.is_sign_negative() && !self.amount.is_zero() }

    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.same_currency(other)?;
        let amount = self.amount.checked_add(other.amount).ok_or(MoneyError::Overflow)?;
        Ok(Money::new(amount, &self.currency))
    }

    /// Subtracts `other`, flooring the result at zero.
    pub fn saturating_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.same_currency(other)?;
        let amount = self.amount.checked_sub(other.amount).ok_or(MoneyError::Overflow)?;
        Ok(Money::new(amount.max(Decimal::ZERO), &self.currency))
    }

    pub fn multiply(&self, qty: u32) -> Result<Money, MoneyError> {
        let amount = self.amount.checked_mul(Decimal::from(qty)).ok_or(MoneyError::Overflow)?;
        Ok(Money::new(amount, &self.currency))
    }

    /// `self * percentage / 100`, unrounded.
    pub fn percentage(&self, percentage: DiscountPercentage) -> Money {
        Money::new(self.amount * percentage.as_fraction(), &self.currency)
    }

    /// Amount in minor units (cents), rounding half away from zero.
    pub fn to_minor_units(&self) -> Result<i64, MoneyError> {
        let cents = self
            .amount
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or(MoneyError::Overflow)?;
        cents.to_i64().ok_or(MoneyError::Overflow)
    }

    pub fn from_minor_units(minor: i64, currency: &str) -> Money {
        Money::new(Decimal::new(minor, 2), currency)
    }

    fn same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch { expected: self.currency.clone(), got: other.currency.clone() });
        }
        Ok(())
    }
}

impl Default for Money { fn default() -> Self { Self::zero("USD") } }

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} {}", self.amount.round_dp(2), self.currency) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch { expected: String, got: String },
    #[error("Arithmetic overflow in money calculation")]
    Overflow,
}

/// Identity of a cart line: product, variation, color and size.
///
/// The display form `productId-variationId-color-size` is the guest cart `key`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartKey {
    pub product_id: String,
    pub variation_id: String,
    pub color: String,
    pub size: String,
}

impl CartKey {
    pub fn new(product_id: impl Into<String>, variation_id: impl Into<String>, color: impl Into<String>, size: impl Into<String>) -> Self {
        Self { product_id: product_id.into(), variation_id: variation_id.into(), color: color.into(), size: size.into() }
    }
}

impl fmt::Display for CartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}-{}", self.product_id, self.variation_id, self.color, self.size)
    }
}

/// Coupon code value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CouponCode(String);

impl CouponCode {
    pub const MAX_LEN: usize = 32;

    pub fn new(value: impl Into<String>) -> Result<Self, CouponCodeError> {
        let value = value.into().trim().to_string();
        if value.is_empty() { return Err(CouponCodeError::Empty); }
        if value.len() > Self::MAX_LEN { return Err(CouponCodeError::TooLong); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }

    /// Codes minted by the coupon issuer are well-formed by construction.
    pub(crate) fn generated(value: String) -> Self { Self(value) }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for CouponCode {
    type Error = CouponCodeError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<CouponCode> for String {
    fn from(code: CouponCode) -> Self { code.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponCodeError {
    #[error("Coupon code is empty")]
    Empty,
    #[error("Coupon code is too long")]
    TooLong,
}

/// Whole-number discount percentage in `0..=100`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DiscountPercentage(u8);

impl DiscountPercentage {
    pub fn new(value: u8) -> Result<Self, PercentageError> {
        if value > 100 { return Err(PercentageError::OutOfRange(value)); }
        Ok(Self(value))
    }
    /// Clamps to 100; usable in constants.
    pub const fn saturating(value: u8) -> Self {
        if value > 100 { Self(100) } else { Self(value) }
    }
    pub fn value(self) -> u8 { self.0 }
    pub fn as_fraction(self) -> Decimal { Decimal::from(self.0) / Decimal::ONE_HUNDRED }
}

impl TryFrom<u8> for DiscountPercentage {
    type Error = PercentageError;
    fn try_from(value: u8) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<DiscountPercentage> for u8 {
    fn from(p: DiscountPercentage) -> Self { p.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PercentageError {
    #[error("Discount percentage {0} is outside 0-100")]
    OutOfRange(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coupon_code_trims() {
        let code = CouponCode::new("  GIFT42 ").unwrap();
        assert_eq!(code.as_str(), "GIFT42");
        assert_eq!(CouponCode::new("   "), Err(CouponCodeError::Empty));
    }

    #[test]
    fn test_money_add_rejects_mixed_currency() {
        let a = Money::usd(Decimal::new(100, 0));
        let b = Money::new(Decimal::new(50, 0), "EUR");
        assert!(matches!(a.add(&b), Err(MoneyError::CurrencyMismatch { .. })));
        assert_eq!(a.add(&Money::usd(Decimal::new(50, 0))).unwrap().amount(), Decimal::new(150, 0));
    }

    #[test]
    fn test_saturating_sub_floors_at_zero() {
        let a = Money::usd(Decimal::new(10, 0));
        let b = Money::usd(Decimal::new(25, 0));
        assert!(a.saturating_sub(&b).unwrap().is_zero());
    }

    #[test]
    fn test_minor_units_round_half_away() {
        assert_eq!(Money::usd(Decimal::new(10005, 3)).to_minor_units().unwrap(), 1001);
        assert_eq!(Money::usd(Decimal::new(54, 0)).to_minor_units().unwrap(), 5400);
        assert_eq!(Money::from_minor_units(5400, "USD").amount(), Decimal::new(54, 0));
    }

    #[test]
    fn test_discount_percentage_bounds() {
        assert!(DiscountPercentage::new(100).is_ok());
        assert_eq!(DiscountPercentage::new(101), Err(PercentageError::OutOfRange(101)));
        let ten = DiscountPercentage::new(10).unwrap();
        assert_eq!(Money::usd(Decimal::new(60, 0)).percentage(ten).amount(), Decimal::new(6, 0));
    }

    #[test]
    fn test_money_json_uses_numbers() {
        let money: Money = serde_json::from_str(r#"{"amount":25,"currency":"USD"}"#).unwrap();
        assert_eq!(money.amount(), Decimal::new(25, 0));
        let json = serde_json::to_value(&money).unwrap();
        assert!(json["amount"].is_number());
    }

    #[test]
    fn test_cart_key_display() {
        assert_eq!(CartKey::new("p1", "v1", "Red", "M").to_string(), "p1-v1-Red-M");
    }
}
