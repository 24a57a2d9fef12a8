//! Domain events
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::CouponCode;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DomainEvent {
    Cart(CartEvent),
    Coupon(CouponEvent),
    Order(OrderEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CartEvent {
    Cleared { user_id: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CouponEvent {
    Redeemed { code: CouponCode, user_id: String, deactivated: bool },
    Issued { code: CouponCode, user_id: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum OrderEvent {
    Completed { order_id: Uuid, user_id: String, total: Decimal },
}

impl DomainEvent {
    /// Bus subject, e.g. `storefront.coupon`.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Cart(_) => "storefront.cart",
            Self::Coupon(_) => "storefront.coupon",
            Self::Order(_) => "storefront.order",
        }
    }
}
