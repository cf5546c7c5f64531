//! In-memory store implementation for tests and local development.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{CartId, CartItemId, CategoryId, OrderId, ProductId, UserId};
use tokio::sync::RwLock;

use crate::cart::{Cart, CartItem, NewCartItem};
use crate::catalog::{
    Category, NewCategory, NewProduct, Page, Product, ProductFilter, ProductState, ProductUpdate,
};
use crate::error::{Result, StoreError};
use crate::order::{
    CheckoutRequest, Order, OrderItem, OrderStatus, OrderUpdate, PaymentStatus, PlacedOrder,
};
use crate::store::{CartStore, CatalogStore, OrderScope, OrderStore, PageRequest};
use crate::{order_number, pricing};

#[derive(Default)]
struct Shop {
    categories: Vec<Category>,
    products: Vec<Product>,
    carts: Vec<Cart>,
    cart_items: Vec<CartItem>,
    orders: Vec<Order>,
    order_items: HashMap<OrderId, Vec<OrderItem>>,
}

/// In-memory shop store. All mutation happens under one write lock, which
/// gives every operation the same atomicity the Postgres backend gets from
/// transactions.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    shop: Arc<RwLock<Shop>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn page_of<T: Clone>(rows: &[T], page: PageRequest) -> Page<T> {
    let total = rows.len() as u64;
    let items = rows
        .iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .cloned()
        .collect();
    Page::new(items, total, page.page(), page.per_page())
}

fn matches_filter(product: &Product, filter: &ProductFilter) -> bool {
    if product.state != ProductState::Active {
        return false;
    }
    if let Some(category_id) = filter.category_id
        && product.category_id != category_id
    {
        return false;
    }
    if let Some(featured) = filter.featured
        && product.featured != featured
    {
        return false;
    }
    if let Some(min) = filter.min_price
        && product.price < min
    {
        return false;
    }
    if let Some(max) = filter.max_price
        && product.price > max
    {
        return false;
    }
    if let Some(ref search) = filter.search {
        let needle = search.to_lowercase();
        let hit = product.name.to_lowercase().contains(&needle)
            || product.description.to_lowercase().contains(&needle)
            || product.brand.to_lowercase().contains(&needle);
        if !hit {
            return false;
        }
    }
    true
}

impl Shop {
    fn cart_for(&self, user_id: UserId) -> Option<&Cart> {
        self.carts.iter().find(|c| c.user_id == user_id)
    }

    fn ensure_cart(&mut self, user_id: UserId) -> Cart {
        if let Some(cart) = self.cart_for(user_id) {
            return cart.clone();
        }
        let cart = Cart {
            id: CartId::new(),
            user_id,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.carts.push(cart.clone());
        cart
    }

    fn touch_cart(&mut self, cart_id: CartId) {
        if let Some(cart) = self.carts.iter_mut().find(|c| c.id == cart_id) {
            cart.updated_at = Some(Utc::now());
        }
    }

    fn items_of(&self, cart_id: CartId) -> Vec<CartItem> {
        let mut items: Vec<CartItem> = self
            .cart_items
            .iter()
            .filter(|i| i.cart_id == cart_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.added_at);
        items
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn create_category(&self, new: NewCategory) -> Result<Category> {
        let mut shop = self.shop.write().await;
        if shop.categories.iter().any(|c| c.slug == new.slug) {
            return Err(StoreError::duplicate("slug", &new.slug));
        }
        if shop.categories.iter().any(|c| c.name == new.name) {
            return Err(StoreError::duplicate("name", &new.name));
        }

        let category = Category {
            id: CategoryId::new(),
            name: new.name,
            description: new.description,
            slug: new.slug,
            is_active: true,
            created_at: Utc::now(),
        };
        shop.categories.push(category.clone());
        Ok(category)
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let shop = self.shop.read().await;
        let mut categories: Vec<Category> = shop
            .categories
            .iter()
            .filter(|c| c.is_active)
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>> {
        let shop = self.shop.read().await;
        Ok(shop.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let shop = self.shop.read().await;
        Ok(shop.categories.iter().find(|c| c.slug == slug).cloned())
    }

    async fn create_product(&self, new: NewProduct) -> Result<Product> {
        let mut shop = self.shop.write().await;
        if shop.products.iter().any(|p| p.sku == new.sku) {
            return Err(StoreError::duplicate("sku", &new.sku));
        }
        if !shop.categories.iter().any(|c| c.id == new.category_id) {
            return Err(StoreError::not_found("category", new.category_id));
        }

        let product = Product {
            id: ProductId::new(),
            category_id: new.category_id,
            name: new.name,
            description: new.description,
            sku: new.sku,
            brand: new.brand,
            price: new.price,
            original_price: new.original_price,
            featured: new.featured,
            state: ProductState::Active,
            stock_quantity: new.stock_quantity,
            images: new.images,
            sizes: new.sizes,
            colors: new.colors,
            created_at: Utc::now(),
            updated_at: None,
        };
        shop.products.push(product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let shop = self.shop.read().await;
        Ok(shop.products.iter().find(|p| p.id == id).cloned())
    }

    async fn get_product_by_sku(&self, sku: &str) -> Result<Option<Product>> {
        let shop = self.shop.read().await;
        Ok(shop.products.iter().find(|p| p.sku == sku).cloned())
    }

    async fn list_products(
        &self,
        filter: ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>> {
        let shop = self.shop.read().await;
        let mut matched: Vec<Product> = shop
            .products
            .iter()
            .filter(|p| matches_filter(p, &filter))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page_of(&matched, page))
    }

    async fn list_featured_products(&self, limit: u32) -> Result<Vec<Product>> {
        let shop = self.shop.read().await;
        let mut matched: Vec<Product> = shop
            .products
            .iter()
            .filter(|p| p.state == ProductState::Active && p.featured)
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched.truncate(limit as usize);
        Ok(matched)
    }

    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product> {
        let mut shop = self.shop.write().await;
        if let Some(category_id) = update.category_id
            && !shop.categories.iter().any(|c| c.id == category_id)
        {
            return Err(StoreError::not_found("category", category_id));
        }
        let product = shop
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::not_found("product", id))?;
        update.apply(product, Utc::now());
        Ok(product.clone())
    }

    async fn deactivate_product(&self, id: ProductId) -> Result<()> {
        let mut shop = self.shop.write().await;
        let product = shop
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::not_found("product", id))?;
        product.state = ProductState::Deactivated;
        product.updated_at = Some(Utc::now());
        Ok(())
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn get_or_create_cart(&self, user_id: UserId) -> Result<Cart> {
        let mut shop = self.shop.write().await;
        Ok(shop.ensure_cart(user_id))
    }

    async fn cart_items(&self, user_id: UserId) -> Result<Vec<CartItem>> {
        let shop = self.shop.read().await;
        match shop.cart_for(user_id) {
            Some(cart) => Ok(shop.items_of(cart.id)),
            None => Ok(vec![]),
        }
    }

    async fn add_cart_item(&self, user_id: UserId, new: NewCartItem) -> Result<CartItem> {
        let mut shop = self.shop.write().await;
        let active = shop
            .products
            .iter()
            .any(|p| p.id == new.product_id && p.state == ProductState::Active);
        if !active {
            return Err(StoreError::not_found("product", new.product_id));
        }

        let cart = shop.ensure_cart(user_id);

        let merged = shop.cart_items.iter_mut().find(|i| {
            i.cart_id == cart.id
                && i.product_id == new.product_id
                && i.size == new.size
                && i.color == new.color
        });
        let item = match merged {
            Some(existing) => {
                existing.quantity += new.quantity;
                existing.clone()
            }
            None => {
                let item = CartItem {
                    id: CartItemId::new(),
                    cart_id: cart.id,
                    product_id: new.product_id,
                    quantity: new.quantity,
                    size: new.size,
                    color: new.color,
                    added_at: Utc::now(),
                };
                shop.cart_items.push(item.clone());
                item
            }
        };
        shop.touch_cart(cart.id);
        Ok(item)
    }

    async fn update_cart_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<CartItem> {
        let mut shop = self.shop.write().await;
        let cart_id = shop
            .cart_for(user_id)
            .map(|c| c.id)
            .ok_or_else(|| StoreError::not_found("cart item", item_id))?;
        let item = shop
            .cart_items
            .iter_mut()
            .find(|i| i.id == item_id && i.cart_id == cart_id)
            .ok_or_else(|| StoreError::not_found("cart item", item_id))?;
        item.quantity = quantity;
        Ok(item.clone())
    }

    async fn remove_cart_item(&self, user_id: UserId, item_id: CartItemId) -> Result<()> {
        let mut shop = self.shop.write().await;
        let cart_id = shop
            .cart_for(user_id)
            .map(|c| c.id)
            .ok_or_else(|| StoreError::not_found("cart item", item_id))?;
        let before = shop.cart_items.len();
        shop.cart_items
            .retain(|i| !(i.id == item_id && i.cart_id == cart_id));
        if shop.cart_items.len() == before {
            return Err(StoreError::not_found("cart item", item_id));
        }
        Ok(())
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<()> {
        let mut shop = self.shop.write().await;
        if let Some(cart_id) = shop.cart_for(user_id).map(|c| c.id) {
            shop.cart_items.retain(|i| i.cart_id != cart_id);
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn checkout(&self, user_id: UserId, request: CheckoutRequest) -> Result<PlacedOrder> {
        let mut shop = self.shop.write().await;

        let cart_id = shop
            .cart_for(user_id)
            .map(|c| c.id)
            .ok_or(StoreError::EmptyCart)?;
        let cart_lines = shop.items_of(cart_id);
        if cart_lines.is_empty() {
            return Err(StoreError::EmptyCart);
        }

        let mut lines = Vec::with_capacity(cart_lines.len());
        for item in &cart_lines {
            let product = shop
                .products
                .iter()
                .find(|p| p.id == item.product_id)
                .filter(|p| p.state == ProductState::Active)
                .ok_or(StoreError::ProductUnavailable(item.product_id))?;
            lines.push(pricing::PricedLine {
                product_id: item.product_id,
                quantity: item.quantity,
                size: item.size.clone(),
                color: item.color.clone(),
                unit_price: product.price,
            });
        }

        let totals = pricing::order_totals(&lines);
        let now = Utc::now();

        let mut number = order_number::generate(now);
        if shop.orders.iter().any(|o| o.order_number == number) {
            number = order_number::generate(now);
            if shop.orders.iter().any(|o| o.order_number == number) {
                return Err(StoreError::duplicate("order_number", &number));
            }
        }

        let order = Order {
            id: OrderId::new(),
            user_id,
            order_number: number,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            subtotal: totals.subtotal,
            tax_amount: totals.tax,
            shipping_amount: totals.shipping,
            discount_amount: totals.discount,
            total_amount: totals.total,
            shipping: request.shipping,
            payment_method: request.payment_method,
            payment_transaction_id: request.payment_transaction_id,
            tracking_number: None,
            notes: None,
            created_at: now,
            updated_at: None,
            shipped_at: None,
            delivered_at: None,
        };

        let items: Vec<OrderItem> = lines
            .iter()
            .map(|line| OrderItem {
                order_id: order.id,
                product_id: line.product_id,
                quantity: line.quantity,
                size: line.size.clone(),
                color: line.color.clone(),
                unit_price: line.unit_price,
                total_price: line.total_price(),
            })
            .collect();

        shop.orders.push(order.clone());
        shop.order_items.insert(order.id, items.clone());
        shop.cart_items.retain(|i| i.cart_id != cart_id);
        shop.touch_cart(cart_id);

        Ok(PlacedOrder { order, items })
    }

    async fn get_order(&self, id: OrderId, scope: OrderScope) -> Result<Option<Order>> {
        let shop = self.shop.read().await;
        Ok(shop
            .orders
            .iter()
            .find(|o| o.id == id && scope.permits(o.user_id))
            .cloned())
    }

    async fn get_order_by_number(
        &self,
        number: &str,
        scope: OrderScope,
    ) -> Result<Option<Order>> {
        let shop = self.shop.read().await;
        Ok(shop
            .orders
            .iter()
            .find(|o| o.order_number == number && scope.permits(o.user_id))
            .cloned())
    }

    async fn order_items(&self, id: OrderId) -> Result<Vec<OrderItem>> {
        let shop = self.shop.read().await;
        Ok(shop.order_items.get(&id).cloned().unwrap_or_default())
    }

    async fn list_orders(&self, user_id: UserId, page: PageRequest) -> Result<Page<Order>> {
        let shop = self.shop.read().await;
        let mut orders: Vec<Order> = shop
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page_of(&orders, page))
    }

    async fn list_all_orders(
        &self,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<Page<Order>> {
        let shop = self.shop.read().await;
        let mut orders: Vec<Order> = shop
            .orders
            .iter()
            .filter(|o| status.is_none_or(|s| o.status == s))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page_of(&orders, page))
    }

    async fn update_order(&self, id: OrderId, update: OrderUpdate) -> Result<Order> {
        let mut shop = self.shop.write().await;
        let order = shop
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| StoreError::not_found("order", id))?;
        update.apply(order, Utc::now());
        Ok(order.clone())
    }
}
