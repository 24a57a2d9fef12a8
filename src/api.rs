//! JSON request and response bodies shared by the HTTP handlers and the client.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::CartLine;
use crate::domain::value_objects::{CartKey, CouponCode, DiscountPercentage};
use crate::storage::CartEntry;

/// Upper bound on a single line's quantity.
pub const MAX_LINE_QUANTITY: u32 = 9999;

fn one() -> u32 { 1 }

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    #[validate(length(min = 1))]
    pub product_id: String,
    #[validate(length(min = 1))]
    pub variation_id: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default = "one")]
    #[validate(range(min = 1, max = 9999))]
    pub quantity: u32,
}

impl From<&CartLine> for AddToCartRequest {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id.clone(),
            variation_id: line.variation_id.clone(),
            color: Some(line.color.clone()),
            size: Some(line.size.clone()),
            quantity: line.quantity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartResponse {
    pub success: bool,
    pub cart_item: CartEntry,
}

/// Body of `PUT /api/cart/:productId`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuantityRequest {
    #[validate(length(min = 1))]
    pub variation_id: String,
    #[validate(length(min = 1))]
    pub color: String,
    #[validate(length(min = 1))]
    pub size: String,
    #[validate(range(max = 9999))]
    pub quantity: u32,
}

impl UpdateQuantityRequest {
    pub fn new(key: &CartKey, quantity: u32) -> Self {
        Self { variation_id: key.variation_id.clone(), color: key.color.clone(), size: key.size.clone(), quantity }
    }

    pub fn key(&self, product_id: &str) -> CartKey {
        CartKey::new(product_id, &self.variation_id, &self.color, &self.size)
    }
}

/// Body of `DELETE /api/cart`; no `productId` clears the whole cart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFromCartRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

impl RemoveFromCartRequest {
    pub fn line(key: &CartKey) -> Self {
        Self {
            product_id: Some(key.product_id.clone()),
            variation_id: Some(key.variation_id.clone()),
            color: Some(key.color.clone()),
            size: Some(key.size.clone()),
        }
    }

    /// `Ok(None)` means "remove everything".
    pub fn key(&self) -> Result<Option<CartKey>, &'static str> {
        let Some(product_id) = &self.product_id else { return Ok(None) };
        match (&self.variation_id, &self.color, &self.size) {
            (Some(v), Some(c), Some(s)) => Ok(Some(CartKey::new(product_id, v, c, s))),
            _ => Err("variationId, color and size are required with productId"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemsResponse {
    pub cart_items: Vec<CartLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ValidateCouponRequest {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponResponse {
    pub message: String,
    pub code: CouponCode,
    pub discount_percentage: DiscountPercentage,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionResponse {
    pub id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSuccessRequest {
    #[validate(length(min = 1))]
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSuccessResponse {
    pub success: bool,
    pub message: String,
    pub order_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_coupon: Option<CouponCode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_request_defaults_quantity() {
        let req: AddToCartRequest = serde_json::from_str(r#"{"productId":"p1","variationId":"v1"}"#).unwrap();
        assert_eq!(req.quantity, 1);
        assert!(req.color.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_add_request_rejects_zero_quantity() {
        let req: AddToCartRequest = serde_json::from_str(r#"{"productId":"p1","variationId":"v1","quantity":0}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_remove_request_key() {
        assert_eq!(RemoveFromCartRequest::default().key(), Ok(None));
        let partial = RemoveFromCartRequest { product_id: Some("p1".into()), ..Default::default() };
        assert!(partial.key().is_err());
        let key = CartKey::new("p1", "v1", "Red", "M");
        assert_eq!(RemoveFromCartRequest::line(&key).key(), Ok(Some(key)));
    }
}
