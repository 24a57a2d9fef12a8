//! Cart Store
//!
//! `CartService` owns the shopper's in-memory cart and routes every mutation
//! through the repository that matches the current session: server-backed when
//! signed in, local storage for guests. Totals are recomputed after each change.

use std::sync::{Arc, Mutex};

use super::api::{ApiClient, CouponGateway, RemoteCartRepository};
use super::kv::KeyValueStore;
use super::local::LocalCartRepository;
use super::repository::CartRepository;
use crate::domain::aggregates::{AppliedCoupon, Cart, CartLine, CartTotals, Product};
use crate::domain::services::{resolve_selection, VariationSelection};
use crate::domain::value_objects::{CartKey, CouponCode};
use crate::error::CartError;

/// Who is signed in, if anyone.
pub trait AuthSession: Send + Sync {
    fn user_id(&self) -> Option<String>;

    fn is_authenticated(&self) -> bool { self.user_id().is_some() }
}

/// Mutable session holder shared between the API client and the cart service.
#[derive(Debug, Default)]
pub struct SessionState {
    user_id: Mutex<Option<String>>,
}

impl SessionState {
    pub fn new() -> Self { Self::default() }

    pub fn sign_in(&self, user_id: impl Into<String>) {
        *self.user_id.lock().unwrap_or_else(|p| p.into_inner()) = Some(user_id.into());
    }

    pub fn sign_out(&self) {
        *self.user_id.lock().unwrap_or_else(|p| p.into_inner()) = None;
    }
}

impl AuthSession for SessionState {
    fn user_id(&self) -> Option<String> {
        self.user_id.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel { Success, Warning, Error }

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// User-visible, transient notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => tracing::info!(message = %notice.message, "Notice"),
            NoticeLevel::Warning => tracing::warn!(message = %notice.message, "Notice"),
            NoticeLevel::Error => tracing::error!(message = %notice.message, "Notice"),
        }
    }
}

/// Keeps every notice; useful for asserting on what the shopper would see.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self { Self::default() }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap_or_else(|p| p.into_inner()).push(notice);
    }
}

pub struct CartService {
    local: Arc<dyn CartRepository>,
    remote: Arc<dyn CartRepository>,
    auth: Arc<dyn AuthSession>,
    coupons: Arc<dyn CouponGateway>,
    notifier: Arc<dyn Notifier>,
    cart: Cart,
}

impl CartService {
    pub fn new(
        local: Arc<dyn CartRepository>,
        remote: Arc<dyn CartRepository>,
        auth: Arc<dyn AuthSession>,
        coupons: Arc<dyn CouponGateway>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { local, remote, auth, coupons, notifier, cart: Cart::new() }
    }

    /// Wires the standard repositories around one API client.
    pub fn with_api(api: Arc<ApiClient>, kv: Arc<dyn KeyValueStore>, auth: Arc<dyn AuthSession>, notifier: Arc<dyn Notifier>) -> Self {
        Self::new(
            Arc::new(LocalCartRepository::new(kv)),
            Arc::new(RemoteCartRepository::new(api.clone())),
            auth,
            api,
            notifier,
        )
    }

    fn repository(&self) -> &dyn CartRepository {
        if self.auth.is_authenticated() { self.remote.as_ref() } else { self.local.as_ref() }
    }

    fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        self.notifier.notify(Notice { level, message: message.into() });
    }

    /// Surfaces the error to the shopper and hands it back to the caller.
    fn fail<T>(&self, err: CartError) -> Result<T, CartError> {
        self.notify(NoticeLevel::Error, err.to_string());
        Err(err)
    }

    pub fn items(&self) -> &[CartLine] { self.cart.lines() }
    pub fn coupon(&self) -> Option<&AppliedCoupon> { self.cart.coupon() }
    pub fn get_totals(&self) -> &CartTotals { self.cart.totals() }

    /// Recomputes totals from the current lines and coupon.
    pub fn calculate_totals(&mut self) -> &CartTotals { self.cart.recalculate() }

    /// Resolves the selection against `product` and adds it. The requested
    /// quantity plus what is already in the cart must fit the size's stock.
    pub async fn add_to_cart(&mut self, product: &Product, selection: &VariationSelection) -> Result<&[CartLine], CartError> {
        let line = match resolve_selection(product, selection) {
            Ok(resolved) => {
                let in_cart = self.cart.line(&resolved.key()).map_or(0, |l| l.quantity);
                if let Err(e) = resolved.ensure_available(in_cart.saturating_add(selection.quantity)) {
                    return self.fail(e);
                }
                resolved.to_line(selection.quantity)
            }
            Err(e) => return self.fail(e),
        };
        let result = self.repository().add(line).await;
        match result {
            Ok(lines) => {
                self.cart.replace_lines(lines);
                self.notify(NoticeLevel::Success, "Product added to cart");
                Ok(self.cart.lines())
            }
            Err(e) => self.fail(e),
        }
    }

    /// Loads the cart from its source of truth. Failures leave an empty cart and a warning.
    pub async fn get_cart_items(&mut self) -> &[CartLine] {
        let result = self.repository().load().await;
        let lines = match result {
            Ok(lines) => lines,
            Err(e) => {
                tracing::warn!(error = %e, "Cart load failed");
                self.notify(NoticeLevel::Warning, "Could not load your cart");
                vec![]
            }
        };
        self.cart.replace_lines(lines);
        self.cart.lines()
    }

    pub async fn update_quantity(&mut self, key: &CartKey, quantity: u32) -> Result<&[CartLine], CartError> {
        if quantity == 0 {
            return self.remove_from_cart(key).await;
        }
        let result = self.repository().update_quantity(key, quantity).await;
        match result {
            Ok(lines) => {
                self.cart.replace_lines(lines);
                Ok(self.cart.lines())
            }
            Err(e) => self.fail(e),
        }
    }

    pub async fn remove_from_cart(&mut self, key: &CartKey) -> Result<&[CartLine], CartError> {
        let result = self.repository().remove(key).await;
        match result {
            Ok(lines) => {
                self.cart.replace_lines(lines);
                Ok(self.cart.lines())
            }
            Err(e) => self.fail(e),
        }
    }

    pub async fn clear_cart(&mut self) -> Result<(), CartError> {
        if let Err(e) = self.repository().clear().await {
            return self.fail(e);
        }
        self.cart.clear();
        Ok(())
    }

    /// Validates `code` with the server and applies it. Only one coupon at a time;
    /// guests cannot hold coupons.
    pub async fn apply_coupon(&mut self, code: &str) -> Result<&CartTotals, CartError> {
        if self.cart.coupon().is_some() {
            return self.fail(CartError::CouponAlreadyApplied);
        }
        if !self.auth.is_authenticated() {
            return self.fail(CartError::CouponNotFound);
        }
        let Ok(code) = CouponCode::new(code) else {
            return self.fail(CartError::CouponNotFound);
        };
        let applied = match self.coupons.validate(&code).await {
            Ok(applied) => applied,
            Err(e) => return self.fail(e),
        };
        if let Err(e) = self.cart.apply_coupon(applied) {
            return self.fail(e.into());
        }
        tracing::info!(%code, "Coupon applied");
        self.notify(NoticeLevel::Success, "Coupon applied successfully");
        Ok(self.cart.totals())
    }

    pub fn remove_coupon(&mut self) -> Result<&CartTotals, CartError> {
        if let Err(e) = self.cart.remove_coupon() {
            return self.fail(e.into());
        }
        self.notify(NoticeLevel::Success, "Coupon removed");
        Ok(self.cart.totals())
    }

    /// Called after sign-in. The guest cart is discarded, not merged, and the
    /// cart is reloaded from the server.
    pub async fn on_login(&mut self) -> &[CartLine] {
        if let Err(e) = self.local.clear().await {
            tracing::warn!(error = %e, "Guest cart could not be cleared");
        }
        self.cart = Cart::new();
        self.get_cart_items().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::kv::MemoryKv;
    use crate::domain::aggregates::product::fixtures::tee;
    use crate::domain::value_objects::DiscountPercentage;
    use async_trait::async_trait;
    use rust_decimal::Decimal;

    struct FixedCoupons(Option<u8>);

    #[async_trait]
    impl CouponGateway for FixedCoupons {
        async fn validate(&self, code: &CouponCode) -> Result<AppliedCoupon, CartError> {
            let pct = self.0.ok_or(CartError::CouponNotFound)?;
            Ok(AppliedCoupon { code: code.clone(), discount_percentage: DiscountPercentage::new(pct).unwrap_or(DiscountPercentage::saturating(0)) })
        }
    }

    struct Offline;

    #[async_trait]
    impl CartRepository for Offline {
        async fn load(&self) -> Result<Vec<CartLine>, CartError> { Err(CartError::Network("offline".into())) }
        async fn add(&self, _: CartLine) -> Result<Vec<CartLine>, CartError> { Err(CartError::Network("offline".into())) }
        async fn update_quantity(&self, _: &CartKey, _: u32) -> Result<Vec<CartLine>, CartError> { Err(CartError::Network("offline".into())) }
        async fn remove(&self, _: &CartKey) -> Result<Vec<CartLine>, CartError> { Err(CartError::Network("offline".into())) }
        async fn clear(&self) -> Result<(), CartError> { Err(CartError::Network("offline".into())) }
    }

    fn service(session: Arc<SessionState>, pct: Option<u8>, notifier: Arc<RecordingNotifier>) -> CartService {
        let local = Arc::new(LocalCartRepository::new(Arc::new(MemoryKv::new())));
        CartService::new(local, Arc::new(Offline), session, Arc::new(FixedCoupons(pct)), notifier)
    }

    fn guest() -> CartService {
        service(Arc::new(SessionState::new()), Some(10), Arc::new(RecordingNotifier::new()))
    }

    #[tokio::test]
    async fn test_guest_totals_with_coupon() {
        let product = tee();
        let session = Arc::new(SessionState::new());
        let mut cart = service(session.clone(), Some(10), Arc::new(RecordingNotifier::new()));
        cart.add_to_cart(&product, &VariationSelection::new("Red", "S", 2)).await.unwrap();
        cart.add_to_cart(&product, &VariationSelection::new("Blue", "M", 1)).await.unwrap();
        assert_eq!(cart.get_totals().sub_total.amount(), Decimal::new(60, 0));
        assert_eq!(cart.get_totals().total.amount(), Decimal::new(60, 0));

        assert_eq!(cart.apply_coupon("SAVE10").await, Err(CartError::CouponNotFound));
        session.sign_in("u1");
        let totals = cart.apply_coupon("SAVE10").await.unwrap();
        assert_eq!(totals.total.amount(), Decimal::new(54, 0));
        assert_eq!(totals.savings.amount(), Decimal::new(6, 0));

        assert_eq!(cart.apply_coupon("OTHER").await, Err(CartError::CouponAlreadyApplied));
        assert_eq!(cart.get_totals().total.amount(), Decimal::new(54, 0));

        cart.remove_coupon().unwrap();
        assert_eq!(cart.remove_coupon(), Err(CartError::NoCouponApplied));
        assert_eq!(cart.get_totals().total.amount(), Decimal::new(60, 0));
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_cart_empty() {
        let notifier = Arc::new(RecordingNotifier::new());
        let mut cart = service(Arc::new(SessionState::new()), None, notifier.clone());
        let err = cart.add_to_cart(&tee(), &VariationSelection::new("Red", "M", 3)).await.unwrap_err();
        assert_eq!(err, CartError::InsufficientStock { available: 2 });
        assert!(cart.items().is_empty());
        assert_eq!(notifier.notices()[0].message, "Only 2 left in stock");
        assert_eq!(notifier.notices()[0].level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn test_stock_check_counts_cart_quantity() {
        let mut cart = guest();
        let product = tee();
        cart.add_to_cart(&product, &VariationSelection::new("Red", "M", 2)).await.unwrap();
        let err = cart.add_to_cart(&product, &VariationSelection::new("Red", "M", 1)).await.unwrap_err();
        assert_eq!(err, CartError::InsufficientStock { available: 2 });
        assert_eq!(cart.items()[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_add_twice_update_and_remove() {
        let mut cart = guest();
        let product = tee();
        cart.add_to_cart(&product, &VariationSelection::new("Red", "S", 1)).await.unwrap();
        let lines = cart.add_to_cart(&product, &VariationSelection::new("Red", "S", 1)).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 2);

        cart.add_to_cart(&product, &VariationSelection::new("Blue", "M", 1)).await.unwrap();
        let key = CartKey::new("p1", "v1", "Red", "S");
        assert_eq!(cart.update_quantity(&key, 4).await.unwrap()[0].quantity, 4);
        assert_eq!(cart.update_quantity(&key, 0).await.unwrap().len(), 1);

        let before = cart.items().to_vec();
        cart.remove_from_cart(&key).await.unwrap();
        assert_eq!(cart.items(), before.as_slice());
        assert_eq!(cart.get_cart_items().await.len(), 1);

        cart.clear_cart().await.unwrap();
        assert!(cart.items().is_empty());
    }

    #[tokio::test]
    async fn test_failed_load_degrades_to_empty() {
        let notifier = Arc::new(RecordingNotifier::new());
        let session = Arc::new(SessionState::new());
        session.sign_in("u1");
        let mut cart = service(session, None, notifier.clone());
        assert!(cart.get_cart_items().await.is_empty());
        assert_eq!(notifier.notices()[0].level, NoticeLevel::Warning);
        assert!(cart.get_totals().total.is_zero());
    }

    #[tokio::test]
    async fn test_login_discards_guest_cart() {
        let session = Arc::new(SessionState::new());
        let kv = Arc::new(MemoryKv::new());
        let local = Arc::new(LocalCartRepository::new(kv.clone()));
        let mut cart = CartService::new(local.clone(), Arc::new(Offline), session.clone(), Arc::new(FixedCoupons(None)), Arc::new(RecordingNotifier::new()));
        cart.add_to_cart(&tee(), &VariationSelection::new("Blue", "M", 1)).await.unwrap();

        session.sign_in("u1");
        assert!(cart.on_login().await.is_empty());
        assert!(local.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_selection() {
        let mut cart = guest();
        let selection = VariationSelection { color: Some("Red".into()), size: None, quantity: 1 };
        assert_eq!(cart.add_to_cart(&tee(), &selection).await.unwrap_err(), CartError::InvalidSelection);
    }
}
