//! Order Aggregate
//!
//! Orders are recorded once a payment session is confirmed paid; one order per session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::{CartKey, CouponCode, Money, MoneyError};
use crate::domain::events::{DomainEvent, OrderEvent};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: Uuid,
    user_id: String,
    payment_session_id: String,
    lines: Vec<OrderLine>,
    total: Money,
    coupon_code: Option<CouponCode>,
    created_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine { pub key: CartKey, pub quantity: u32, pub unit_price: Money }

impl OrderLine {
    pub fn line_total(&self) -> Result<Money, MoneyError> { self.unit_price.multiply(self.quantity) }
}

impl Order {
    /// `total` is the amount the payment provider collected, after discounts.
    pub fn place(user_id: impl Into<String>, payment_session_id: impl Into<String>, lines: Vec<OrderLine>, total: Money, coupon_code: Option<CouponCode>) -> Result<Self, OrderError> {
        if lines.is_empty() { return Err(OrderError::NoItems); }
        let mut order = Self {
            id: Uuid::now_v7(), user_id: user_id.into(), payment_session_id: payment_session_id.into(),
            lines, total, coupon_code, created_at: Utc::now(), events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Completed {
            order_id: order.id, user_id: order.user_id.clone(), total: order.total.amount(),
        }));
        Ok(order)
    }

    /// Rebuilds a persisted order without raising events.
    pub fn restore(id: Uuid, user_id: String, payment_session_id: String, lines: Vec<OrderLine>, total: Money, coupon_code: Option<CouponCode>, created_at: DateTime<Utc>) -> Self {
        Self { id, user_id, payment_session_id, lines, total, coupon_code, created_at, events: vec![] }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn user_id(&self) -> &str { &self.user_id }
    pub fn payment_session_id(&self) -> &str { &self.payment_session_id }
    pub fn lines(&self) -> &[OrderLine] { &self.lines }
    pub fn total(&self) -> &Money { &self.total }
    pub fn coupon_code(&self) -> Option<&CouponCode> { self.coupon_code.as_ref() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("Order has no items")]
    NoItems,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_place_raises_completed_once() {
        let line = OrderLine { key: CartKey::new("p1", "v1", "Red", "M"), quantity: 2, unit_price: Money::usd(Decimal::new(10, 0)) };
        assert_eq!(line.line_total().unwrap().amount(), Decimal::new(20, 0));
        let mut order = Order::place("u1", "cs_1", vec![line], Money::usd(Decimal::new(20, 0)), None).unwrap();
        assert_eq!(order.take_events().len(), 1);
        assert!(order.take_events().is_empty());
    }

    #[test]
    fn test_empty_order_rejected() {
        assert_eq!(Order::place("u1", "cs_1", vec![], Money::default(), None).unwrap_err(), OrderError::NoItems);
    }
}
