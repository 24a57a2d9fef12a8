//! Guest cart kept in client-side storage.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::kv::KeyValueStore;
use super::repository::CartRepository;
use crate::domain::aggregates::CartLine;
use crate::domain::value_objects::CartKey;
use crate::error::CartError;

/// Storage key holding the guest cart.
pub const GUEST_CART_KEY: &str = "guestCart";

/// Stored form: `{ key, product: { productId, variationId, color, size, quantity, price } }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GuestCartEntry {
    pub key: String,
    pub product: CartLine,
}

impl From<CartLine> for GuestCartEntry {
    fn from(line: CartLine) -> Self { Self { key: line.key().to_string(), product: line } }
}

pub struct LocalCartRepository {
    kv: Arc<dyn KeyValueStore>,
}

impl LocalCartRepository {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self { Self { kv } }

    async fn save(&self, lines: &[CartLine]) -> Result<(), CartError> {
        let entries: Vec<GuestCartEntry> = lines.iter().cloned().map(GuestCartEntry::from).collect();
        let json = serde_json::to_string(&entries).map_err(|e| CartError::Storage(e.to_string()))?;
        self.kv.set(GUEST_CART_KEY, &json).await?;
        Ok(())
    }
}

/// Parses the stored cart, skipping entries that no longer deserialize.
fn parse_entries(raw: &str) -> Vec<CartLine> {
    let values: Vec<serde_json::Value> = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "Discarding unreadable guest cart");
            return vec![];
        }
    };
    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<GuestCartEntry>(value) {
            Ok(entry) => Some(entry.product),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed guest cart entry");
                None
            }
        })
        .collect()
}

#[async_trait]
impl CartRepository for LocalCartRepository {
    async fn load(&self) -> Result<Vec<CartLine>, CartError> {
        Ok(self.kv.get(GUEST_CART_KEY).await?.map(|raw| parse_entries(&raw)).unwrap_or_default())
    }

    async fn add(&self, line: CartLine) -> Result<Vec<CartLine>, CartError> {
        let mut lines = self.load().await?;
        match lines.iter_mut().find(|l| l.matches(&line.key())) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(line.quantity);
                existing.price = line.price;
            }
            None => lines.push(line),
        }
        self.save(&lines).await?;
        Ok(lines)
    }

    async fn update_quantity(&self, key: &CartKey, quantity: u32) -> Result<Vec<CartLine>, CartError> {
        if quantity == 0 {
            return self.remove(key).await;
        }
        let mut lines = self.load().await?;
        if let Some(line) = lines.iter_mut().find(|l| l.matches(key)) {
            line.quantity = quantity;
            self.save(&lines).await?;
        }
        Ok(lines)
    }

    async fn remove(&self, key: &CartKey) -> Result<Vec<CartLine>, CartError> {
        let mut lines = self.load().await?;
        let before = lines.len();
        lines.retain(|l| !l.matches(key));
        if lines.len() != before {
            self.save(&lines).await?;
        }
        Ok(lines)
    }

    async fn clear(&self) -> Result<(), CartError> {
        self.kv.delete(GUEST_CART_KEY).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::kv::MemoryKv;
    use crate::domain::value_objects::Money;
    use rust_decimal::Decimal;

    fn line(size: &str, quantity: u32) -> CartLine {
        CartLine {
            product_id: "p1".into(), variation_id: "v1".into(), color: "Red".into(), size: size.into(),
            quantity, price: Some(Money::usd(Decimal::new(25, 0))), name: None,
        }
    }

    #[tokio::test]
    async fn test_add_same_key_increments() {
        let repo = LocalCartRepository::new(Arc::new(MemoryKv::new()));
        repo.add(line("M", 1)).await.unwrap();
        let lines = repo.add(line("M", 2)).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 3);
        assert_eq!(repo.load().await.unwrap(), lines);
    }

    #[tokio::test]
    async fn test_stored_shape() {
        let kv = Arc::new(MemoryKv::new());
        let repo = LocalCartRepository::new(kv.clone());
        repo.add(line("M", 1)).await.unwrap();
        let raw: serde_json::Value = serde_json::from_str(&kv.get(GUEST_CART_KEY).await.unwrap().unwrap()).unwrap();
        assert_eq!(raw[0]["key"], "p1-v1-Red-M");
        assert_eq!(raw[0]["product"]["productId"], "p1");
        assert_eq!(raw[0]["product"]["price"]["amount"], 25.0);
    }

    #[tokio::test]
    async fn test_malformed_entries_are_skipped() {
        let kv = Arc::new(MemoryKv::new());
        let good = serde_json::to_value(GuestCartEntry::from(line("S", 1))).unwrap();
        kv.set(GUEST_CART_KEY, &serde_json::json!([good, {"key": "x", "product": {"quantity": "lots"}}]).to_string()).await.unwrap();
        let repo = LocalCartRepository::new(kv.clone());
        assert_eq!(repo.load().await.unwrap().len(), 1);

        kv.set(GUEST_CART_KEY, "not json").await.unwrap();
        assert!(repo.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_zero_and_remove_missing() {
        let repo = LocalCartRepository::new(Arc::new(MemoryKv::new()));
        repo.add(line("S", 1)).await.unwrap();
        repo.add(line("M", 1)).await.unwrap();
        let lines = repo.update_quantity(&line("S", 0).key(), 0).await.unwrap();
        assert_eq!(lines.len(), 1);
        let lines = repo.remove(&line("XL", 0).key()).await.unwrap();
        assert_eq!(lines.len(), 1);
        repo.clear().await.unwrap();
        assert!(repo.load().await.unwrap().is_empty());
    }
}
