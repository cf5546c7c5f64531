//! Public catalog browsing endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::{CategoryId, Money, ProductId};
use serde::Deserialize;
use store::{Category, Page, PageRequest, Product, ProductFilter, ShopStore};

use crate::AppState;
use crate::error::ApiError;

const DEFAULT_FEATURED_LIMIT: u32 = 8;

#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    pub category_id: Option<CategoryId>,
    pub search: Option<String>,
    pub featured: Option<bool>,
    /// Price bounds in dollars, converted to cents.
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct FeaturedQuery {
    pub limit: Option<u32>,
}

fn dollars_to_money(value: f64) -> Money {
    Money::from_cents((value * 100.0).round() as i64)
}

/// GET /categories: active categories, alphabetical.
pub async fn list_categories<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.catalog.list_categories().await?))
}

/// GET /categories/{slug}
pub async fn get_category<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(slug): Path<String>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.catalog.get_category_by_slug(&slug).await?))
}

/// GET /products: filtered, paginated browsing over active products.
pub async fn list_products<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<Page<Product>>, ApiError> {
    let filter = ProductFilter {
        category_id: query.category_id,
        search: query.search,
        featured: query.featured,
        min_price: query.min_price.map(dollars_to_money),
        max_price: query.max_price.map(dollars_to_money),
    };
    let page = PageRequest::new(query.page.unwrap_or(1), query.per_page.unwrap_or(20));
    Ok(Json(state.catalog.list_products(filter, page).await?))
}

/// GET /products/featured
pub async fn featured<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<FeaturedQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_FEATURED_LIMIT);
    Ok(Json(state.catalog.list_featured(limit).await?))
}

/// GET /products/{id}
pub async fn get_product<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.catalog.get_product(id).await?))
}
