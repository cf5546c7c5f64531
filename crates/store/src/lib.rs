//! Persistence layer and checkout engine for the shop backend.
//!
//! Defines the storage traits ([`CatalogStore`], [`CartStore`], [`OrderStore`])
//! together with two backends sharing one contract: [`PostgresStore`] for
//! production and [`InMemoryStore`] for tests. The checkout transaction that
//! converts a mutable cart into an immutable priced order lives inside each
//! backend so that no partially applied state is ever observable.

pub mod cart;
pub mod catalog;
pub mod error;
pub mod memory;
pub mod order;
pub mod order_number;
pub mod postgres;
pub mod pricing;
pub mod store;

pub use common::{CartId, CartItemId, CategoryId, Money, OrderId, ProductId, UserId};

pub use cart::{Cart, CartItem, NewCartItem};
pub use catalog::{
    Category, NewCategory, NewProduct, Page, Product, ProductFilter, ProductImage, ProductState,
    ProductUpdate,
};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use order::{
    CheckoutRequest, Order, OrderItem, OrderStatus, OrderUpdate, PaymentStatus, PlacedOrder,
    ShippingAddress,
};
pub use postgres::PostgresStore;
pub use store::{CartStore, CatalogStore, OrderScope, OrderStore, PageRequest, ShopStore};
