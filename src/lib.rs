//! Storefront Cart
//!
//! Cart pricing, variation resolution and coupon engine for a storefront.
//!
//! ## Features
//! - Variation resolution with stock checks
//! - Guest carts in local storage, authenticated carts on the server
//! - Percentage coupons with ownership, expiry and usage caps
//! - Checkout through a payment gateway, with reward coupons on large orders

pub mod api;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod server;
pub mod storage;

pub use client::{CartRepository, CartService, LocalCartRepository, RemoteCartRepository};
pub use config::Config;
pub use domain::aggregates::{AppliedCoupon, Cart, CartLine, CartTotals, Coupon, Product};
pub use domain::services::{calculate_totals, resolve, VariationSelection};
pub use domain::value_objects::{CartKey, CouponCode, DiscountPercentage, Money};
pub use error::{ApiError, CartError};
pub use server::{router, AppState};
