use async_trait::async_trait;

use crate::domain::aggregates::CartLine;
use crate::domain::value_objects::CartKey;
use crate::error::CartError;

/// Where a cart's lines live. Every mutation returns the lines as they stand
/// after the change, read back from the source of truth.
#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn load(&self) -> Result<Vec<CartLine>, CartError>;

    /// Adds the line, incrementing the quantity of an existing line with the same key.
    async fn add(&self, line: CartLine) -> Result<Vec<CartLine>, CartError>;

    /// Zero removes the line. Unknown keys leave the cart unchanged.
    async fn update_quantity(&self, key: &CartKey, quantity: u32) -> Result<Vec<CartLine>, CartError>;

    /// Removing an unknown key is a no-op.
    async fn remove(&self, key: &CartKey) -> Result<Vec<CartLine>, CartError>;

    async fn clear(&self) -> Result<(), CartError>;
}
