//! Server-side persistence.
//!
//! Handlers talk to the traits below; `MemoryStore` backs tests and
//! database-less runs, `PgStore` backs production.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{Coupon, Order, Product, ProductError};
use crate::domain::value_objects::{CartKey, CouponCode};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error(transparent)]
    Product(#[from] ProductError),
}

/// A cart line as persisted for an authenticated user, before hydration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartEntry {
    #[serde(flatten)]
    pub key: CartKey,
    pub quantity: u32,
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn product(&self, product_id: &str) -> Result<Option<Product>, StoreError>;

    /// Products for the given ids; unknown ids are omitted.
    async fn products(&self, product_ids: &[String]) -> Result<Vec<Product>, StoreError>;

    async fn upsert_product(&self, product: Product) -> Result<(), StoreError>;

    async fn remove_stock(&self, key: &CartKey, quantity: u32) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn cart(&self, user_id: &str) -> Result<Vec<CartEntry>, StoreError>;

    /// Adds `entry.quantity` to an existing line with the same key, or appends it.
    async fn add_item(&self, user_id: &str, entry: CartEntry) -> Result<CartEntry, StoreError>;

    /// Sets a line's quantity; zero removes the line, unknown keys are ignored.
    async fn set_quantity(&self, user_id: &str, key: &CartKey, quantity: u32) -> Result<Vec<CartEntry>, StoreError>;

    async fn remove_item(&self, user_id: &str, key: &CartKey) -> Result<Vec<CartEntry>, StoreError>;

    async fn clear(&self, user_id: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CouponStore: Send + Sync {
    /// The user's active, unexpired coupon with the latest expiry.
    async fn active_coupon(&self, user_id: &str, now: DateTime<Utc>) -> Result<Option<Coupon>, StoreError>;

    /// Finds `{code, user_id, active, unexpired}` and consumes one use in a single step,
    /// recording the use as an unclaimed redemption.
    /// Returns the updated coupon, or `None` when nothing matched.
    async fn redeem(&self, code: &CouponCode, user_id: &str, now: DateTime<Utc>) -> Result<Option<Coupon>, StoreError>;

    /// Whether the user holds a redemption of `code` that no order has claimed.
    async fn has_unclaimed_redemption(&self, code: &CouponCode, user_id: &str) -> Result<bool, StoreError>;

    /// Attaches the oldest unclaimed redemption to `order_id`. `false` when none was left.
    async fn claim_redemption(&self, code: &CouponCode, user_id: &str, order_id: Uuid) -> Result<bool, StoreError>;

    async fn coupon(&self, code: &CouponCode) -> Result<Option<Coupon>, StoreError>;

    async fn insert_coupon(&self, coupon: Coupon) -> Result<(), StoreError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn order_for_session(&self, payment_session_id: &str) -> Result<Option<Order>, StoreError>;

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError>;
}

/// Everything the HTTP layer needs from persistence.
pub trait Store: CatalogStore + CartStore + CouponStore + OrderStore {}

impl<T: CatalogStore + CartStore + CouponStore + OrderStore> Store for T {}
