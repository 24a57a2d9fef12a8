use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CartEntry, CartStore, CatalogStore, CouponStore, OrderStore, StoreError};
use crate::domain::aggregates::{Coupon, CouponState, Order, Product};
use crate::domain::value_objects::{CartKey, CouponCode};

/// Process-local store. Each operation takes the lock once, so a coupon
/// redemption is a single atomic step.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    products: HashMap<String, Product>,
    carts: HashMap<String, Vec<CartEntry>>,
    coupons: HashMap<CouponCode, Coupon>,
    orders: HashMap<String, Order>,
    redemptions: Vec<Redemption>,
}

#[derive(Debug)]
struct Redemption {
    code: CouponCode,
    user_id: String,
    order_id: Option<Uuid>,
}

impl Redemption {
    fn is_unclaimed(&self, code: &CouponCode, user_id: &str) -> bool {
        &self.code == code && self.user_id == user_id && self.order_id.is_none()
    }
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn product(&self, product_id: &str) -> Result<Option<Product>, StoreError> {
        Ok(self.inner.read().await.products.get(product_id).cloned())
    }

    async fn products(&self, product_ids: &[String]) -> Result<Vec<Product>, StoreError> {
        let inner = self.inner.read().await;
        Ok(product_ids.iter().filter_map(|id| inner.products.get(id).cloned()).collect())
    }

    async fn upsert_product(&self, product: Product) -> Result<(), StoreError> {
        self.inner.write().await.products.insert(product.id.clone(), product);
        Ok(())
    }

    async fn remove_stock(&self, key: &CartKey, quantity: u32) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let product = inner
            .products
            .get_mut(&key.product_id)
            .ok_or_else(|| StoreError::NotFound(format!("product {}", key.product_id)))?;
        product.remove_stock(key, quantity)?;
        Ok(())
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn cart(&self, user_id: &str) -> Result<Vec<CartEntry>, StoreError> {
        Ok(self.inner.read().await.carts.get(user_id).cloned().unwrap_or_default())
    }

    async fn add_item(&self, user_id: &str, entry: CartEntry) -> Result<CartEntry, StoreError> {
        let mut inner = self.inner.write().await;
        let cart = inner.carts.entry(user_id.to_string()).or_default();
        if let Some(existing) = cart.iter_mut().find(|e| e.key == entry.key) {
            existing.quantity = existing.quantity.saturating_add(entry.quantity);
            return Ok(existing.clone());
        }
        cart.push(entry.clone());
        Ok(entry)
    }

    async fn set_quantity(&self, user_id: &str, key: &CartKey, quantity: u32) -> Result<Vec<CartEntry>, StoreError> {
        let mut inner = self.inner.write().await;
        let cart = inner.carts.entry(user_id.to_string()).or_default();
        if quantity == 0 {
            cart.retain(|e| &e.key != key);
        } else if let Some(existing) = cart.iter_mut().find(|e| &e.key == key) {
            existing.quantity = quantity;
        }
        Ok(cart.clone())
    }

    async fn remove_item(&self, user_id: &str, key: &CartKey) -> Result<Vec<CartEntry>, StoreError> {
        let mut inner = self.inner.write().await;
        let cart = inner.carts.entry(user_id.to_string()).or_default();
        cart.retain(|e| &e.key != key);
        Ok(cart.clone())
    }

    async fn clear(&self, user_id: &str) -> Result<(), StoreError> {
        self.inner.write().await.carts.remove(user_id);
        Ok(())
    }
}

#[async_trait]
impl CouponStore for MemoryStore {
    async fn active_coupon(&self, user_id: &str, now: DateTime<Utc>) -> Result<Option<Coupon>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .coupons
            .values()
            .filter(|c| c.user_id == user_id && c.state(now) == CouponState::Active)
            .max_by_key(|c| c.expiration_date)
            .cloned())
    }

    async fn redeem(&self, code: &CouponCode, user_id: &str, now: DateTime<Utc>) -> Result<Option<Coupon>, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(coupon) = inner.coupons.get_mut(code).filter(|c| c.is_redeemable_by(user_id, now)) else {
            return Ok(None);
        };
        if coupon.redeem(now).is_err() {
            return Ok(None);
        }
        let redeemed = coupon.clone();
        inner.redemptions.push(Redemption { code: code.clone(), user_id: user_id.to_string(), order_id: None });
        Ok(Some(redeemed))
    }

    async fn has_unclaimed_redemption(&self, code: &CouponCode, user_id: &str) -> Result<bool, StoreError> {
        Ok(self.inner.read().await.redemptions.iter().any(|r| r.is_unclaimed(code, user_id)))
    }

    async fn claim_redemption(&self, code: &CouponCode, user_id: &str, order_id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(redemption) = inner.redemptions.iter_mut().find(|r| r.is_unclaimed(code, user_id)) else {
            return Ok(false);
        };
        redemption.order_id = Some(order_id);
        Ok(true)
    }

    async fn coupon(&self, code: &CouponCode) -> Result<Option<Coupon>, StoreError> {
        Ok(self.inner.read().await.coupons.get(code).cloned())
    }

    async fn insert_coupon(&self, coupon: Coupon) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.coupons.contains_key(&coupon.code) {
            return Err(StoreError::Conflict(format!("coupon {}", coupon.code)));
        }
        inner.coupons.insert(coupon.code.clone(), coupon);
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn order_for_session(&self, payment_session_id: &str) -> Result<Option<Order>, StoreError> {
        Ok(self.inner.read().await.orders.get(payment_session_id).cloned())
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.orders.contains_key(order.payment_session_id()) {
            return Err(StoreError::Conflict(format!("order for session {}", order.payment_session_id())));
        }
        inner.orders.insert(order.payment_session_id().to_string(), order.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::DiscountPercentage;
    use chrono::Duration;

    fn entry(size: &str, quantity: u32) -> CartEntry {
        CartEntry { key: CartKey::new("p1", "v1", "Red", size), quantity }
    }

    #[tokio::test]
    async fn test_add_item_increments_existing_line() {
        let store = MemoryStore::new();
        store.add_item("u1", entry("M", 1)).await.unwrap();
        let merged = store.add_item("u1", entry("M", 2)).await.unwrap();
        assert_eq!(merged.quantity, 3);
        store.add_item("u1", entry("S", 1)).await.unwrap();
        assert_eq!(store.cart("u1").await.unwrap().len(), 2);
        assert!(store.cart("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_quantity_zero_removes() {
        let store = MemoryStore::new();
        store.add_item("u1", entry("M", 1)).await.unwrap();
        store.add_item("u1", entry("S", 1)).await.unwrap();
        let cart = store.set_quantity("u1", &entry("M", 0).key, 0).await.unwrap();
        assert_eq!(cart, vec![entry("S", 1)]);
        let cart = store.remove_item("u1", &entry("XL", 0).key).await.unwrap();
        assert_eq!(cart.len(), 1);
    }

    #[tokio::test]
    async fn test_redeem_until_deactivated() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let code = CouponCode::new("SAVE10").unwrap();
        let mut coupon = Coupon::new(code.clone(), "u1", DiscountPercentage::new(10).unwrap(), now + Duration::days(1), 3);
        coupon.usage_count = 2;
        store.insert_coupon(coupon).await.unwrap();

        assert!(store.redeem(&code, "u2", now).await.unwrap().is_none());
        let redeemed = store.redeem(&code, "u1", now).await.unwrap().unwrap();
        assert!(!redeemed.is_active);
        assert!(store.redeem(&code, "u1", now).await.unwrap().is_none());
        assert!(store.active_coupon("u1", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_each_redemption_claimed_once() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let code = CouponCode::new("SAVE10").unwrap();
        store.insert_coupon(Coupon::new(code.clone(), "u1", DiscountPercentage::new(10).unwrap(), now + Duration::days(1), 5)).await.unwrap();
        assert!(!store.has_unclaimed_redemption(&code, "u1").await.unwrap());

        store.redeem(&code, "u1", now).await.unwrap().unwrap();
        assert!(store.has_unclaimed_redemption(&code, "u1").await.unwrap());
        assert!(!store.has_unclaimed_redemption(&code, "u2").await.unwrap());

        assert!(store.claim_redemption(&code, "u1", Uuid::now_v7()).await.unwrap());
        assert!(!store.claim_redemption(&code, "u1", Uuid::now_v7()).await.unwrap());
        assert!(!store.has_unclaimed_redemption(&code, "u1").await.unwrap());
    }
}
