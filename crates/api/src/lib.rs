//! HTTP API server with observability for the shop backend.
//!
//! Provides REST endpoints for catalog browsing, cart management, checkout,
//! and operator administration, with structured logging (tracing) and
//! Prometheus metrics. Credential verification is delegated to an upstream
//! gateway; see [`auth`].

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use domain::{CartService, CatalogService, OrderService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::ShopStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub catalog: CatalogService<S>,
    pub carts: CartService<S>,
    pub orders: OrderService<S>,
}

/// Builds the application state over any store backend.
pub fn create_state<S: ShopStore + Clone>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState {
        catalog: CatalogService::new(store.clone()),
        carts: CartService::new(store.clone()),
        orders: OrderService::new(store),
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: ShopStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        // Catalog browsing (no principal required)
        .route("/categories", get(routes::catalog::list_categories::<S>))
        .route(
            "/categories/{slug}",
            get(routes::catalog::get_category::<S>),
        )
        .route("/products", get(routes::catalog::list_products::<S>))
        .route("/products/featured", get(routes::catalog::featured::<S>))
        .route("/products/{id}", get(routes::catalog::get_product::<S>))
        // Cart
        .route(
            "/cart",
            get(routes::cart::view::<S>).delete(routes::cart::clear::<S>),
        )
        .route("/cart/items", post(routes::cart::add_item::<S>))
        .route(
            "/cart/items/{id}",
            put(routes::cart::update_item::<S>).delete(routes::cart::remove_item::<S>),
        )
        // Orders
        .route(
            "/orders",
            post(routes::orders::checkout::<S>).get(routes::orders::list::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route(
            "/orders/number/{number}",
            get(routes::orders::get_by_number::<S>),
        )
        // Operator administration
        .route(
            "/admin/categories",
            post(routes::admin::create_category::<S>),
        )
        .route("/admin/products", post(routes::admin::create_product::<S>))
        .route(
            "/admin/products/{id}",
            put(routes::admin::update_product::<S>).delete(routes::admin::delete_product::<S>),
        )
        .route("/admin/orders", get(routes::admin::list_orders::<S>))
        .route(
            "/admin/orders/{id}",
            get(routes::admin::get_order::<S>).put(routes::admin::update_order::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
