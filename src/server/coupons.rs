//! Coupon engine endpoints.

use axum::{extract::State, Json};
use chrono::Utc;

use super::{validated, AppState, AuthUser};
use crate::api::{ValidateCouponRequest, ValidateCouponResponse};
use crate::domain::aggregates::Coupon;
use crate::domain::events::{CouponEvent, DomainEvent};
use crate::domain::value_objects::CouponCode;
use crate::error::{ApiError, CartError, Result};

pub async fn get_coupon(State(s): State<AppState>, AuthUser(user_id): AuthUser) -> Result<Json<Coupon>> {
    s.store
        .active_coupon(&user_id, Utc::now())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No active coupon found".into()))
}

pub async fn validate_coupon(State(s): State<AppState>, AuthUser(user_id): AuthUser, Json(r): Json<ValidateCouponRequest>) -> Result<Json<ValidateCouponResponse>> {
    validated(&r)?;
    let code = CouponCode::new(r.code).map_err(|_| CartError::CouponNotFound)?;
    let coupon = redeem_coupon(&s, &code, &user_id).await?;
    Ok(Json(ValidateCouponResponse {
        message: "Coupon is valid".into(),
        code: coupon.code,
        discount_percentage: coupon.discount_percentage,
    }))
}

/// Consumes one use of `{code, user}` if it is active and unexpired.
///
/// Unknown, foreign, inactive and expired codes all fail the same way.
pub(crate) async fn redeem_coupon(s: &AppState, code: &CouponCode, user_id: &str) -> Result<Coupon> {
    let Some(coupon) = s.store.redeem(code, user_id, Utc::now()).await? else {
        tracing::debug!(%code, %user_id, "Coupon rejected");
        return Err(CartError::CouponNotFound.into());
    };
    tracing::info!(%code, %user_id, usage = coupon.usage_count, max = coupon.max_usage, active = coupon.is_active, "Coupon redeemed");
    s.events
        .publish(&DomainEvent::Coupon(CouponEvent::Redeemed {
            code: coupon.code.clone(),
            user_id: user_id.to_string(),
            deactivated: !coupon.is_active,
        }))
        .await;
    Ok(coupon)
}
