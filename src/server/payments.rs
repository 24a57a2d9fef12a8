//! Checkout: payment session creation and order finalisation.
//!
//! Stock and prices are re-read from the catalog here; nothing the client
//! computed is trusted.

use axum::{extract::State, Json};
use chrono::Utc;

use super::gateway::{CheckoutLine, CheckoutRequest, PaymentSession};
use super::{validated, AppState, AuthUser};
use crate::api::{CheckoutSessionResponse, CheckoutSuccessRequest, CheckoutSuccessResponse, CreateCheckoutRequest};
use crate::domain::aggregates::{coupon::reward_for_order, AppliedCoupon, CartLine, Coupon, Order, OrderLine};
use crate::domain::events::{CartEvent, CouponEvent, DomainEvent};
use crate::domain::services::calculate_totals;
use crate::domain::value_objects::{CouponCode, Money, MoneyError};
use crate::error::{ApiError, CartError, Result};
use crate::storage::StoreError;

/// Attempts at minting a reward code before giving up on a collision streak.
const REWARD_CODE_ATTEMPTS: usize = 3;

fn money_error(e: MoneyError) -> ApiError { ApiError::Internal(e.to_string()) }

/// A coupon reaches checkout only through a redemption recorded by `validate`
/// that no earlier order has claimed. The coupon itself may already be
/// deactivated by that redemption.
async fn checkout_coupon(s: &AppState, code: Option<&str>, user_id: &str) -> Result<Option<AppliedCoupon>> {
    let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) else { return Ok(None) };
    let code = CouponCode::new(code).map_err(|_| CartError::CouponNotFound)?;
    let coupon = s
        .store
        .coupon(&code)
        .await?
        .filter(|c| c.user_id == user_id && c.expiration_date > Utc::now())
        .ok_or(CartError::CouponNotFound)?;
    if !s.store.has_unclaimed_redemption(&code, user_id).await? {
        tracing::debug!(%code, %user_id, "Coupon has no unclaimed redemption");
        return Err(CartError::CouponNotFound.into());
    }
    Ok(Some(coupon.applied()))
}

pub async fn create_checkout_session(State(s): State<AppState>, AuthUser(user_id): AuthUser, Json(r): Json<CreateCheckoutRequest>) -> Result<Json<CheckoutSessionResponse>> {
    let entries = s.store.cart(&user_id).await?;
    if entries.is_empty() {
        return Err(ApiError::BadRequest("Cart is empty".into()));
    }
    let ids: Vec<String> = entries.iter().map(|e| e.key.product_id.clone()).collect();
    let products = s.store.products(&ids).await?;

    let mut lines = Vec::with_capacity(entries.len());
    let mut checkout_lines = Vec::with_capacity(entries.len());
    for entry in entries {
        let product = products
            .iter()
            .find(|p| p.id == entry.key.product_id)
            .ok_or_else(|| ApiError::NotFound(format!("Product {} not found", entry.key.product_id)))?;
        let size = product.size_for(&entry.key).ok_or(CartError::VariationNotFound)?;
        if entry.quantity > size.quantity {
            return Err(CartError::InsufficientStock { available: size.quantity }.into());
        }
        if size.price.currency() != s.config.currency {
            return Err(ApiError::BadRequest(format!("{} is not priced in {}", entry.key, s.config.currency)));
        }
        checkout_lines.push(CheckoutLine {
            key: entry.key.clone(),
            name: product.name.clone(),
            unit_amount: size.price.to_minor_units().map_err(money_error)?,
            quantity: entry.quantity,
        });
        lines.push(CartLine {
            product_id: entry.key.product_id,
            variation_id: entry.key.variation_id,
            color: entry.key.color,
            size: entry.key.size,
            quantity: entry.quantity,
            price: Some(size.price.clone()),
            name: Some(product.name.clone()),
        });
    }

    let coupon = checkout_coupon(&s, r.coupon_code.as_deref(), &user_id).await?;
    let totals = calculate_totals(&lines, coupon.as_ref());
    let session = s
        .payments
        .create_session(CheckoutRequest {
            user_id: user_id.clone(),
            currency: s.config.currency.clone(),
            lines: checkout_lines,
            coupon,
            total_amount: totals.total.to_minor_units().map_err(money_error)?,
            success_url: s.config.success_url(),
            cancel_url: s.config.cancel_url(),
        })
        .await?;

    tracing::info!(%user_id, session_id = %session.id, total = %totals.total, "Checkout session created");
    Ok(Json(CheckoutSessionResponse { id: session.id, total_amount: totals.total.amount() }))
}

fn order_from_session(session: &PaymentSession) -> Result<Order> {
    let currency = session.currency.to_ascii_uppercase();
    let lines = session
        .metadata
        .products
        .iter()
        .map(|p| OrderLine { key: p.key.clone(), quantity: p.quantity, unit_price: Money::from_minor_units(p.unit_amount, &currency) })
        .collect();
    let coupon_code = session.metadata.coupon_code.as_deref().and_then(|c| CouponCode::new(c).ok());
    Order::place(&session.metadata.user_id, &session.id, lines, Money::from_minor_units(session.amount_total, &currency), coupon_code)
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn already_processed(order: &Order) -> Json<CheckoutSuccessResponse> {
    Json(CheckoutSuccessResponse { success: true, message: "Order already processed".into(), order_id: order.id(), reward_coupon: None })
}

async fn issue_reward(s: &AppState, user_id: &str, total: &Money) -> Result<Option<Coupon>> {
    for _ in 0..REWARD_CODE_ATTEMPTS {
        let Some(coupon) = reward_for_order(user_id, total, Utc::now()) else { return Ok(None) };
        match s.store.insert_coupon(coupon.clone()).await {
            Ok(()) => return Ok(Some(coupon)),
            Err(StoreError::Conflict(_)) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    tracing::warn!(%user_id, "Could not mint a unique reward coupon code");
    Ok(None)
}

pub async fn checkout_success(State(s): State<AppState>, AuthUser(user_id): AuthUser, Json(r): Json<CheckoutSuccessRequest>) -> Result<Json<CheckoutSuccessResponse>> {
    validated(&r)?;
    if let Some(order) = s.store.order_for_session(&r.session_id).await? {
        return Ok(already_processed(&order));
    }

    let session = s.payments.retrieve_session(&r.session_id).await?;
    if session.metadata.user_id != user_id {
        return Err(ApiError::NotFound("Payment session not found".into()));
    }
    if !session.paid {
        return Err(ApiError::BadRequest("Payment has not been completed".into()));
    }

    let mut order = order_from_session(&session)?;
    match s.store.insert_order(&order).await {
        Ok(()) => {}
        Err(StoreError::Conflict(_)) => {
            let existing = s.store.order_for_session(&r.session_id).await?.ok_or_else(|| ApiError::Internal("order vanished after conflict".into()))?;
            return Ok(already_processed(&existing));
        }
        Err(e) => return Err(e.into()),
    }

    // The order is recorded; everything below is best-effort.
    for line in order.lines() {
        if let Err(e) = s.store.remove_stock(&line.key, line.quantity).await {
            tracing::warn!(order_id = %order.id(), key = %line.key, error = %e, "Stock not decremented");
        }
    }
    if let Some(code) = order.coupon_code().cloned() {
        match s.store.claim_redemption(&code, &user_id, order.id()).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(order_id = %order.id(), %code, "No unclaimed redemption for order coupon"),
            Err(e) => tracing::warn!(order_id = %order.id(), %code, error = %e, "Coupon redemption not claimed"),
        }
    }
    let cleared = match s.store.clear(&user_id).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(order_id = %order.id(), %user_id, error = %e, "Cart not cleared after order");
            false
        }
    };
    let reward = issue_reward(&s, &user_id, order.total()).await.unwrap_or_else(|e| {
        tracing::warn!(order_id = %order.id(), %user_id, error = %e, "Reward coupon not issued");
        None
    });
    tracing::info!(order_id = %order.id(), %user_id, total = %order.total(), reward = reward.is_some(), "Order completed");

    let mut events = order.take_events();
    if cleared {
        events.push(DomainEvent::Cart(CartEvent::Cleared { user_id: user_id.clone() }));
    }
    if let Some(coupon) = &reward {
        events.push(DomainEvent::Coupon(CouponEvent::Issued { code: coupon.code.clone(), user_id: user_id.clone() }));
    }
    s.events.publish_all(events).await;

    Ok(Json(CheckoutSuccessResponse {
        success: true,
        message: "Order created".into(),
        order_id: order.id(),
        reward_coupon: reward.map(|c| c.code),
    }))
}
