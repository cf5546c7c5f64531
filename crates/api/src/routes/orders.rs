//! Customer order endpoints: checkout and scoped reads.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::OrderId;
use store::{CheckoutRequest, Order, OrderScope, Page, PlacedOrder, ShopStore};

use crate::AppState;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::routes::PageQuery;

/// POST /orders: checkout: converts the user's cart into an order.
#[tracing::instrument(skip(state, request))]
pub async fn checkout<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<PlacedOrder>), ApiError> {
    let placed = state.orders.checkout(user.id, request).await?;
    Ok((StatusCode::CREATED, Json(placed)))
}

/// GET /orders: the user's own orders, newest first.
pub async fn list<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<Order>>, ApiError> {
    Ok(Json(
        state.orders.list_orders(user.id, page.request()).await?,
    ))
}

/// GET /orders/{id}: one of the user's own orders, with items.
pub async fn get<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    Path(id): Path<OrderId>,
) -> Result<Json<PlacedOrder>, ApiError> {
    Ok(Json(
        state.orders.get_order(id, OrderScope::User(user.id)).await?,
    ))
}

/// GET /orders/number/{number}: lookup by human-facing order number.
pub async fn get_by_number<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    Path(number): Path<String>,
) -> Result<Json<PlacedOrder>, ApiError> {
    Ok(Json(
        state
            .orders
            .get_order_by_number(&number, OrderScope::User(user.id))
            .await?,
    ))
}
