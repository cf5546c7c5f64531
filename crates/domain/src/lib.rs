//! Service layer for the shop backend.
//!
//! Thin services over the storage traits that add input validation,
//! cross-entity hydration, tracing, and metrics. Each service is generic
//! over its store so the same logic runs against PostgreSQL in production
//! and the in-memory backend in tests.

pub mod cart;
pub mod catalog;
pub mod error;
pub mod orders;

pub use cart::{CartLine, CartService, CartView};
pub use catalog::CatalogService;
pub use error::{DomainError, Result};
pub use orders::OrderService;
