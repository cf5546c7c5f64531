//! Cart endpoints. Every route acts on the authenticated user's own cart.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::CartItemId;
use domain::CartView;
use serde::Deserialize;
use store::{CartItem, NewCartItem, ShopStore};

use crate::AppState;
use crate::auth::AuthUser;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: u32,
}

/// GET /cart: the hydrated cart view.
pub async fn view<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
) -> Result<Json<CartView>, ApiError> {
    Ok(Json(state.carts.view(user.id).await?))
}

/// POST /cart/items: add a line, merging into an existing one on the same
/// (product, size, color).
#[tracing::instrument(skip(state, new))]
pub async fn add_item<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    Json(new): Json<NewCartItem>,
) -> Result<(StatusCode, Json<CartItem>), ApiError> {
    let item = state.carts.add_item(user.id, new).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// PUT /cart/items/{id}: replace a line's quantity.
#[tracing::instrument(skip(state, req))]
pub async fn update_item<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    Path(id): Path<CartItemId>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<CartItem>, ApiError> {
    let item = state.carts.update_item(user.id, id, req.quantity).await?;
    Ok(Json(item))
}

/// DELETE /cart/items/{id}
#[tracing::instrument(skip(state))]
pub async fn remove_item<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    Path(id): Path<CartItemId>,
) -> Result<StatusCode, ApiError> {
    state.carts.remove_item(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /cart: drop every line.
#[tracing::instrument(skip(state))]
pub async fn clear<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
) -> Result<StatusCode, ApiError> {
    state.carts.clear(user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
