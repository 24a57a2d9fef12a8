//! HTTP client for the storefront API and the server-backed cart repository.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::repository::CartRepository;
use super::service::AuthSession;
use crate::api::{
    AddToCartRequest, AddToCartResponse, CartItemsResponse, CheckoutSessionResponse, CheckoutSuccessRequest, CheckoutSuccessResponse,
    CreateCheckoutRequest, MessageResponse, RemoveFromCartRequest, UpdateQuantityRequest, ValidateCouponRequest, ValidateCouponResponse,
};
use crate::domain::aggregates::{AppliedCoupon, CartLine, Coupon, Product};
use crate::domain::value_objects::{CartKey, CouponCode};
use crate::error::CartError;
use crate::server::USER_HEADER;

/// Validates a coupon code for the current user, consuming one use.
#[async_trait]
pub trait CouponGateway: Send + Sync {
    async fn validate(&self, code: &CouponCode) -> Result<AppliedCoupon, CartError>;
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<dyn AuthSession>,
}

/// Maps an error response back onto the cart taxonomy using its `message`.
fn error_from(status: StatusCode, message: &str) -> CartError {
    match message {
        "Please select a color and size" => CartError::InvalidSelection,
        "Selected variation not found" => CartError::VariationNotFound,
        "Invalid coupon code" => CartError::CouponNotFound,
        m => match m.strip_prefix("Only ").and_then(|r| r.strip_suffix(" left in stock")).and_then(|n| n.parse().ok()) {
            Some(available) => CartError::InsufficientStock { available },
            None => CartError::Network(format!("{status}: {message}")),
        },
    }
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, session: Arc<dyn AuthSession>) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.into().trim_end_matches('/').to_string(), session }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{path}", self.base_url));
        match self.session.user_id() {
            Some(user_id) => builder.header(USER_HEADER, user_id),
            None => builder,
        }
    }

    async fn read<T: DeserializeOwned>(response: Response) -> Result<T, CartError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let message = response.json::<MessageResponse>().await.map(|m| m.message).unwrap_or_default();
        Err(error_from(status, &message))
    }

    pub async fn product(&self, product_id: &str) -> Result<Product, CartError> {
        Self::read(self.request(Method::GET, &format!("/api/products/{product_id}")).send().await?).await
    }

    pub async fn cart_items(&self) -> Result<Vec<CartLine>, CartError> {
        let body: CartItemsResponse = Self::read(self.request(Method::GET, "/api/cart").send().await?).await?;
        Ok(body.cart_items)
    }

    pub async fn add_cart_item(&self, request: &AddToCartRequest) -> Result<AddToCartResponse, CartError> {
        Self::read(self.request(Method::POST, "/api/cart").json(request).send().await?).await
    }

    pub async fn update_cart_item(&self, key: &CartKey, quantity: u32) -> Result<Vec<CartLine>, CartError> {
        let body = UpdateQuantityRequest::new(key, quantity);
        let body: CartItemsResponse = Self::read(self.request(Method::PUT, &format!("/api/cart/{}", key.product_id)).json(&body).send().await?).await?;
        Ok(body.cart_items)
    }

    /// `None` empties the cart.
    pub async fn remove_cart_item(&self, key: Option<&CartKey>) -> Result<Vec<CartLine>, CartError> {
        let body = key.map(RemoveFromCartRequest::line).unwrap_or_default();
        let body: CartItemsResponse = Self::read(self.request(Method::DELETE, "/api/cart").json(&body).send().await?).await?;
        Ok(body.cart_items)
    }

    pub async fn validate_coupon(&self, code: &CouponCode) -> Result<ValidateCouponResponse, CartError> {
        let body = ValidateCouponRequest { code: code.to_string() };
        Self::read(self.request(Method::POST, "/api/coupons/validate").json(&body).send().await?).await
    }

    pub async fn active_coupon(&self) -> Result<Option<Coupon>, CartError> {
        let response = self.request(Method::GET, "/api/coupons").send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::read(response).await.map(Some)
    }

    pub async fn create_checkout_session(&self, coupon: Option<&CouponCode>) -> Result<CheckoutSessionResponse, CartError> {
        let body = CreateCheckoutRequest { coupon_code: coupon.map(CouponCode::to_string) };
        Self::read(self.request(Method::POST, "/api/payments/create-checkout-session").json(&body).send().await?).await
    }

    pub async fn checkout_success(&self, session_id: &str) -> Result<CheckoutSuccessResponse, CartError> {
        let body = CheckoutSuccessRequest { session_id: session_id.to_string() };
        Self::read(self.request(Method::POST, "/api/payments/checkout-success").json(&body).send().await?).await
    }
}

#[async_trait]
impl CouponGateway for ApiClient {
    async fn validate(&self, code: &CouponCode) -> Result<AppliedCoupon, CartError> {
        let body = self.validate_coupon(code).await?;
        Ok(AppliedCoupon { code: body.code, discount_percentage: body.discount_percentage })
    }
}

/// Authenticated cart stored by the server. Mutations read the cart back so the
/// caller always holds the server's view.
pub struct RemoteCartRepository {
    api: Arc<ApiClient>,
}

impl RemoteCartRepository {
    pub fn new(api: Arc<ApiClient>) -> Self { Self { api } }
}

#[async_trait]
impl CartRepository for RemoteCartRepository {
    async fn load(&self) -> Result<Vec<CartLine>, CartError> {
        self.api.cart_items().await
    }

    async fn add(&self, line: CartLine) -> Result<Vec<CartLine>, CartError> {
        self.api.add_cart_item(&AddToCartRequest::from(&line)).await?;
        self.api.cart_items().await
    }

    async fn update_quantity(&self, key: &CartKey, quantity: u32) -> Result<Vec<CartLine>, CartError> {
        self.api.update_cart_item(key, quantity).await
    }

    async fn remove(&self, key: &CartKey) -> Result<Vec<CartLine>, CartError> {
        self.api.remove_cart_item(Some(key)).await
    }

    async fn clear(&self) -> Result<(), CartError> {
        self.api.remove_cart_item(None).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_from_message() {
        assert_eq!(error_from(StatusCode::BAD_REQUEST, "Only 2 left in stock"), CartError::InsufficientStock { available: 2 });
        assert_eq!(error_from(StatusCode::NOT_FOUND, "Invalid coupon code"), CartError::CouponNotFound);
        assert_eq!(error_from(StatusCode::BAD_REQUEST, "Please select a color and size"), CartError::InvalidSelection);
        assert!(matches!(error_from(StatusCode::INTERNAL_SERVER_ERROR, "Server error"), CartError::Network(_)));
    }
}
