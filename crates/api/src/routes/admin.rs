//! Operator endpoints. Every handler requires the admin principal.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{OrderId, ProductId};
use serde::Deserialize;
use store::{
    Category, NewCategory, NewProduct, Order, OrderScope, OrderStatus, OrderUpdate, Page,
    PageRequest, PlacedOrder, Product, ProductUpdate, ShopStore,
};

use crate::AppState;
use crate::auth::AdminUser;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// POST /admin/categories
#[tracing::instrument(skip(state, new))]
pub async fn create_category<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminUser,
    Json(new): Json<NewCategory>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let category = state.catalog.create_category(new).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// POST /admin/products
#[tracing::instrument(skip(state, new))]
pub async fn create_product<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminUser,
    Json(new): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = state.catalog.create_product(new).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /admin/products/{id}: partial update of the mutable fields.
#[tracing::instrument(skip(state, update))]
pub async fn update_product<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminUser,
    Path(id): Path<ProductId>,
    Json(update): Json<ProductUpdate>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.catalog.update_product(id, update).await?))
}

/// DELETE /admin/products/{id}: soft delete.
#[tracing::instrument(skip(state))]
pub async fn delete_product<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminUser,
    Path(id): Path<ProductId>,
) -> Result<StatusCode, ApiError> {
    state.catalog.deactivate_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /admin/orders: all orders, optionally filtered by status.
pub async fn list_orders<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminUser,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Page<Order>>, ApiError> {
    let page = PageRequest::new(query.page.unwrap_or(1), query.per_page.unwrap_or(20));
    Ok(Json(state.orders.list_all_orders(query.status, page).await?))
}

/// GET /admin/orders/{id}: any order, with items.
pub async fn get_order<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminUser,
    Path(id): Path<OrderId>,
) -> Result<Json<PlacedOrder>, ApiError> {
    Ok(Json(state.orders.get_order(id, OrderScope::Any).await?))
}

/// PUT /admin/orders/{id}: update status, payment status, tracking, notes.
#[tracing::instrument(skip(state, update))]
pub async fn update_order<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminUser,
    Path(id): Path<OrderId>,
    Json(update): Json<OrderUpdate>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(state.orders.update_order(id, update).await?))
}
