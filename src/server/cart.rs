//! `/api/cart` handlers for authenticated users.

use std::collections::HashMap;

use axum::{body::Bytes, extract::{Path, State}, http::StatusCode, Json};

use super::{validated, AppState, AuthUser};
use crate::api::{AddToCartRequest, AddToCartResponse, CartItemsResponse, RemoveFromCartRequest, UpdateQuantityRequest, MAX_LINE_QUANTITY};
use crate::domain::aggregates::{CartLine, Product};
use crate::domain::services::{resolve_selection, VariationSelection};
use crate::error::{ApiError, CartError, Result};
use crate::storage::{CartEntry, Store};

/// Joins stored entries with the catalog. Entries whose product no longer
/// exists are dropped; a missing size keeps the line without a price.
pub(crate) async fn hydrate(store: &dyn Store, entries: Vec<CartEntry>) -> Result<Vec<CartLine>> {
    if entries.is_empty() { return Ok(vec![]); }
    let mut ids: Vec<String> = entries.iter().map(|e| e.key.product_id.clone()).collect();
    ids.sort();
    ids.dedup();
    let products: HashMap<String, Product> = store.products(&ids).await?.into_iter().map(|p| (p.id.clone(), p)).collect();

    Ok(entries
        .into_iter()
        .filter_map(|entry| {
            let Some(product) = products.get(&entry.key.product_id) else {
                tracing::warn!(key = %entry.key, "Dropping cart entry for missing product");
                return None;
            };
            Some(CartLine {
                price: product.size_for(&entry.key).map(|s| s.price.clone()),
                name: Some(product.name.clone()),
                product_id: entry.key.product_id,
                variation_id: entry.key.variation_id,
                color: entry.key.color,
                size: entry.key.size,
                quantity: entry.quantity,
            })
        })
        .collect())
}

pub async fn get_cart(State(s): State<AppState>, AuthUser(user_id): AuthUser) -> Result<Json<CartItemsResponse>> {
    let entries = s.store.cart(&user_id).await?;
    Ok(Json(CartItemsResponse { cart_items: hydrate(s.store.as_ref(), entries).await? }))
}

pub async fn add_to_cart(State(s): State<AppState>, AuthUser(user_id): AuthUser, Json(r): Json<AddToCartRequest>) -> Result<(StatusCode, Json<AddToCartResponse>)> {
    validated(&r)?;
    let product = s.store.product(&r.product_id).await?.ok_or_else(|| ApiError::NotFound("Product not found".into()))?;
    let selection = VariationSelection { color: r.color.clone(), size: r.size.clone(), quantity: r.quantity };
    let resolved = resolve_selection(&product, &selection)?;
    if resolved.variation.id != r.variation_id {
        return Err(CartError::VariationNotFound.into());
    }

    let key = resolved.key();
    let in_cart = s.store.cart(&user_id).await?.into_iter().find(|e| e.key == key).map_or(0, |e| e.quantity);
    let wanted = in_cart.saturating_add(r.quantity);
    if wanted > MAX_LINE_QUANTITY {
        return Err(ApiError::BadRequest(format!("Quantity cannot exceed {MAX_LINE_QUANTITY}")));
    }
    resolved.ensure_available(wanted)?;

    let cart_item = s.store.add_item(&user_id, CartEntry { key, quantity: r.quantity }).await?;
    tracing::info!(%user_id, key = %cart_item.key, quantity = cart_item.quantity, "Cart item added");
    Ok((StatusCode::CREATED, Json(AddToCartResponse { success: true, cart_item })))
}

pub async fn update_quantity(State(s): State<AppState>, AuthUser(user_id): AuthUser, Path(product_id): Path<String>, Json(r): Json<UpdateQuantityRequest>) -> Result<Json<CartItemsResponse>> {
    validated(&r)?;
    let key = r.key(&product_id);
    if r.quantity > 0 {
        let product = s.store.product(&product_id).await?.ok_or_else(|| ApiError::NotFound("Product not found".into()))?;
        let size = product.size_for(&key).ok_or(CartError::VariationNotFound)?;
        if r.quantity > size.quantity {
            return Err(CartError::InsufficientStock { available: size.quantity }.into());
        }
    }
    let entries = s.store.set_quantity(&user_id, &key, r.quantity).await?;
    Ok(Json(CartItemsResponse { cart_items: hydrate(s.store.as_ref(), entries).await? }))
}

/// An empty body clears the cart; a body that does not parse is rejected.
pub async fn remove_from_cart(State(s): State<AppState>, AuthUser(user_id): AuthUser, body: Bytes) -> Result<Json<CartItemsResponse>> {
    let request: RemoveFromCartRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RemoveFromCartRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))?
    };
    let key = request.key().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let entries = match key {
        Some(key) => s.store.remove_item(&user_id, &key).await?,
        None => {
            s.store.clear(&user_id).await?;
            vec![]
        }
    };
    Ok(Json(CartItemsResponse { cart_items: hydrate(s.store.as_ref(), entries).await? }))
}
