//! Aggregates module
pub mod product;
pub mod cart;
pub mod coupon;
pub mod order;

pub use product::{ColorOption, Product, ProductError, SizeOption, Variation};
pub use cart::{Cart, CartCouponError, CartLine, CartTotals, DEFAULT_CURRENCY};
pub use coupon::{AppliedCoupon, Coupon, CouponState};
pub use order::{Order, OrderError, OrderLine};
