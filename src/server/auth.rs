use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;

/// Header carrying the authenticated user id, set by the upstream auth layer.
pub const USER_HEADER: &str = "x-user-id";

/// Authenticated caller; rejects with 401 when the header is missing or blank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser(pub String);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| AuthUser(v.to_string()))
            .ok_or(ApiError::Unauthorized)
    }
}
