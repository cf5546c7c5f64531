//! Storage trait contracts shared by the Postgres and in-memory backends.

use async_trait::async_trait;
use common::{CartItemId, CategoryId, OrderId, ProductId, UserId};

use crate::cart::{Cart, CartItem, NewCartItem};
use crate::catalog::{Category, NewCategory, NewProduct, Page, Product, ProductFilter, ProductUpdate};
use crate::error::Result;
use crate::order::{CheckoutRequest, Order, OrderItem, OrderStatus, OrderUpdate, PlacedOrder};

/// A pagination window. Page numbering starts at 1.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    page: u32,
    per_page: u32,
}

impl PageRequest {
    /// Creates a window, clamping the page to at least 1 and the size to
    /// 1..=100.
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }

    /// Number of rows to fetch.
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

/// Visibility scope for order reads. A customer sees only their own orders;
/// an operator sees everything.
#[derive(Debug, Clone, Copy)]
pub enum OrderScope {
    User(UserId),
    Any,
}

impl OrderScope {
    /// Whether an order owned by `user_id` is visible under this scope.
    pub fn permits(&self, user_id: UserId) -> bool {
        match self {
            OrderScope::User(scoped) => *scoped == user_id,
            OrderScope::Any => true,
        }
    }
}

/// Read/write access to categories and products.
///
/// Browsing reads (`list_*`) filter to active rows; direct lookups by id or
/// SKU return deactivated rows too, since historical orders still reference
/// them.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn create_category(&self, new: NewCategory) -> Result<Category>;
    async fn list_categories(&self) -> Result<Vec<Category>>;
    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>>;
    async fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    async fn create_product(&self, new: NewProduct) -> Result<Product>;
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;
    async fn get_product_by_sku(&self, sku: &str) -> Result<Option<Product>>;
    async fn list_products(&self, filter: ProductFilter, page: PageRequest)
    -> Result<Page<Product>>;
    async fn list_featured_products(&self, limit: u32) -> Result<Vec<Product>>;
    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product>;
    /// Soft delete: flips the product to `deactivated`.
    async fn deactivate_product(&self, id: ProductId) -> Result<()>;
}

/// Per-user cart access. The cart is created lazily on first touch.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn get_or_create_cart(&self, user_id: UserId) -> Result<Cart>;
    /// Lines of the user's cart, oldest first.
    async fn cart_items(&self, user_id: UserId) -> Result<Vec<CartItem>>;
    /// Adds a line, merging quantities into an existing
    /// (product, size, color) line when present. The product must exist and
    /// be active.
    async fn add_cart_item(&self, user_id: UserId, new: NewCartItem) -> Result<CartItem>;
    async fn update_cart_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<CartItem>;
    async fn remove_cart_item(&self, user_id: UserId, item_id: CartItemId) -> Result<()>;
    /// Removes every line; a no-op on an empty or absent cart.
    async fn clear_cart(&self, user_id: UserId) -> Result<()>;
}

/// Order persistence, including the checkout transaction.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Converts the user's cart into an order atomically: loads and locks
    /// the cart, rejects empty carts and unavailable products, prices the
    /// lines, persists the order with frozen item snapshots, and clears the
    /// cart. Either all of that happened, or none of it did.
    ///
    /// Concurrent checkouts on one cart serialize on the cart lock; the
    /// loser observes an empty cart.
    async fn checkout(&self, user_id: UserId, request: CheckoutRequest) -> Result<PlacedOrder>;

    async fn get_order(&self, id: OrderId, scope: OrderScope) -> Result<Option<Order>>;
    async fn get_order_by_number(&self, number: &str, scope: OrderScope)
    -> Result<Option<Order>>;
    /// Line snapshots of an order, in their original cart order.
    async fn order_items(&self, id: OrderId) -> Result<Vec<OrderItem>>;
    /// A user's orders, newest first.
    async fn list_orders(&self, user_id: UserId, page: PageRequest) -> Result<Page<Order>>;
    /// All orders, optionally filtered by status, newest first.
    async fn list_all_orders(
        &self,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<Page<Order>>;
    /// Operator update of the constrained mutable fields.
    async fn update_order(&self, id: OrderId, update: OrderUpdate) -> Result<Order>;
}

/// A complete backend.
pub trait ShopStore: CatalogStore + CartStore + OrderStore {}

impl<T: CatalogStore + CartStore + OrderStore> ShopStore for T {}
