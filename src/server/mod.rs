//! HTTP surface: cart, coupon, checkout and catalog read endpoints.

pub mod auth;
pub mod cart;
pub mod coupons;
pub mod gateway;
pub mod payments;

use std::sync::Arc;

use axum::{extract::{Path, State}, routing::{get, post, put}, Json, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use validator::Validate;

pub use auth::{AuthUser, USER_HEADER};
pub use gateway::{OfflineGateway, PaymentGateway, StripeGateway};

use crate::config::Config;
use crate::Product;
use crate::error::{ApiError, Result};
use crate::events::EventPublisher;
use crate::storage::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub payments: Arc<dyn PaymentGateway>,
    pub events: EventPublisher,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, payments: Arc<dyn PaymentGateway>, events: EventPublisher, config: Config) -> Self {
        Self { store, payments, events, config: Arc::new(config) }
    }
}

pub(crate) fn validated<T: Validate>(value: &T) -> Result<()> {
    value.validate().map_err(|e| ApiError::BadRequest(e.to_string()))
}

async fn get_product(State(s): State<AppState>, Path(id): Path<String>) -> Result<Json<Product>> {
    s.store.product(&id).await?.map(Json).ok_or_else(|| ApiError::NotFound("Product not found".into()))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront-cart"})) }))
        .route("/api/products/:id", get(get_product))
        .route("/api/cart", get(cart::get_cart).post(cart::add_to_cart).delete(cart::remove_from_cart))
        .route("/api/cart/:id", put(cart::update_quantity))
        .route("/api/coupons", get(coupons::get_coupon))
        .route("/api/coupons/validate", post(coupons::validate_coupon))
        .route("/api/payments/create-checkout-session", post(payments::create_checkout_session))
        .route("/api/payments/checkout-success", post(payments::checkout_success))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}
