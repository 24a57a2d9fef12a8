//! Coupon Aggregate
//!
//! Lifecycle: `Active` until `usage_count` reaches `max_usage`, after which the
//! coupon is deactivated for good. Expiry is evaluated against a clock and never
//! stored.

use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::value_objects::{CouponCode, DiscountPercentage, Money};

/// Orders whose paid total reaches this amount (major units) earn a reward coupon.
pub const REWARD_THRESHOLD: Decimal = Decimal::from_parts(200, 0, 0, false, 0);
pub const REWARD_DISCOUNT: DiscountPercentage = DiscountPercentage::saturating(10);
pub const REWARD_VALIDITY_DAYS: i64 = 7;
pub const REWARD_CODE_PREFIX: &str = "GIFT";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub code: CouponCode,
    pub discount_percentage: DiscountPercentage,
    pub expiration_date: DateTime<Utc>,
    pub is_active: bool,
    pub user_id: String,
    pub max_usage: u32,
    pub usage_count: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CouponState { Active, Expired, Deactivated }

/// The part of a coupon a cart keeps once the server accepted it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedCoupon {
    pub code: CouponCode,
    pub discount_percentage: DiscountPercentage,
}

impl Coupon {
    pub fn new(code: CouponCode, user_id: impl Into<String>, discount_percentage: DiscountPercentage, expiration_date: DateTime<Utc>, max_usage: u32) -> Self {
        Self { code, discount_percentage, expiration_date, is_active: max_usage > 0, user_id: user_id.into(), max_usage, usage_count: 0 }
    }

    /// Single-use reward coupon with a random `GIFT` code.
    pub fn reward(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::new(generate_code(), user_id, REWARD_DISCOUNT, now + Duration::days(REWARD_VALIDITY_DAYS), 1)
    }

    pub fn state(&self, now: DateTime<Utc>) -> CouponState {
        if !self.is_active || self.usage_count >= self.max_usage {
            CouponState::Deactivated
        } else if self.expiration_date <= now {
            CouponState::Expired
        } else {
            CouponState::Active
        }
    }

    pub fn is_redeemable_by(&self, user_id: &str, now: DateTime<Utc>) -> bool {
        self.user_id == user_id && self.state(now) == CouponState::Active
    }

    /// Consumes one use. The last allowed use deactivates the coupon in the same step.
    pub fn redeem(&mut self, now: DateTime<Utc>) -> Result<(), CouponState> {
        match self.state(now) {
            CouponState::Active => {
                self.usage_count += 1;
                if self.usage_count >= self.max_usage {
                    self.is_active = false;
                }
                Ok(())
            }
            other => Err(other),
        }
    }

    pub fn applied(&self) -> AppliedCoupon {
        AppliedCoupon { code: self.code.clone(), discount_percentage: self.discount_percentage }
    }
}

/// Reward coupon earned by a completed order, if its paid total reaches the threshold.
pub fn reward_for_order(user_id: &str, order_total: &Money, now: DateTime<Utc>) -> Option<Coupon> {
    (order_total.amount() >= REWARD_THRESHOLD).then(|| Coupon::reward(user_id, now))
}

pub fn generate_code() -> CouponCode {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    CouponCode::generated(format!("{REWARD_CODE_PREFIX}{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coupon(max_usage: u32, usage_count: u32) -> Coupon {
        let mut c = Coupon::new(CouponCode::new("SAVE10").unwrap(), "u1", DiscountPercentage::new(10).unwrap(), Utc::now() + Duration::days(1), max_usage);
        c.usage_count = usage_count;
        c
    }

    #[test]
    fn test_last_use_deactivates() {
        let now = Utc::now();
        let mut c = coupon(3, 2);
        assert!(c.redeem(now).is_ok());
        assert!(!c.is_active);
        assert_eq!(c.usage_count, c.max_usage);
        assert_eq!(c.redeem(now), Err(CouponState::Deactivated));
    }

    #[test]
    fn test_expired_is_checked_not_stored() {
        let c = coupon(3, 0);
        let later = c.expiration_date + Duration::seconds(1);
        assert_eq!(c.state(later), CouponState::Expired);
        assert!(c.is_active);
        assert!(!c.is_redeemable_by("u1", later));
    }

    #[test]
    fn test_wrong_owner_not_redeemable() {
        assert!(!coupon(1, 0).is_redeemable_by("someone-else", Utc::now()));
    }

    #[test]
    fn test_reward_threshold() {
        let now = Utc::now();
        assert!(reward_for_order("u1", &Money::usd(Decimal::new(19999, 2)), now).is_none());
        let reward = reward_for_order("u1", &Money::usd(Decimal::new(200, 0)), now).unwrap();
        assert_eq!(reward.max_usage, 1);
        assert_eq!(reward.discount_percentage, REWARD_DISCOUNT);
        assert_eq!(reward.expiration_date, now + Duration::days(REWARD_VALIDITY_DAYS));
        assert!(reward.code.as_str().starts_with("GIFT"));
        assert_eq!(reward.code.as_str().len(), 10);
    }
}
