//! Error types for the cart client and the HTTP API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::domain::aggregates::CartCouponError;
use crate::server::gateway::GatewayError;
use crate::storage::StoreError;

/// Errors surfaced by the cart store to the shopper.
///
/// `CouponNotFound` deliberately covers unknown, expired, inactive and
/// foreign coupons alike.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    #[error("Please select a color and size")]
    InvalidSelection,

    #[error("Selected variation not found")]
    VariationNotFound,

    #[error("Only {available} left in stock")]
    InsufficientStock { available: u32 },

    #[error("Invalid coupon code")]
    CouponNotFound,

    #[error("A coupon is already applied")]
    CouponAlreadyApplied,

    #[error("No coupon applied")]
    NoCouponApplied,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<reqwest::Error> for CartError {
    fn from(e: reqwest::Error) -> Self { CartError::Network(e.to_string()) }
}

impl From<CartCouponError> for CartError {
    fn from(e: CartCouponError) -> Self {
        match e {
            CartCouponError::AlreadyApplied => CartError::CouponAlreadyApplied,
            CartCouponError::NoneApplied => CartError::NoCouponApplied,
        }
    }
}

/// Errors returned by HTTP handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Payment provider error: {0}")]
    Payment(#[from] GatewayError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Cart(err) => match err {
                CartError::VariationNotFound | CartError::CouponNotFound | CartError::NoCouponApplied => StatusCode::NOT_FOUND,
                CartError::Network(_) | CartError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
            Self::Payment(_) => StatusCode::BAD_GATEWAY,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() || status == StatusCode::BAD_GATEWAY {
            tracing::error!(error = %self, "Request failed");
            "Server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(serde_json::json!({ "message": message }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Cart(CartError::CouponNotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Cart(CartError::InsufficientStock { available: 1 }).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Internal("boom".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_cart_error_messages() {
        assert_eq!(CartError::InsufficientStock { available: 2 }.to_string(), "Only 2 left in stock");
        assert_eq!(ApiError::Cart(CartError::CouponNotFound).to_string(), "Invalid coupon code");
    }
}
