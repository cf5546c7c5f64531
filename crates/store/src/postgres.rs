//! PostgreSQL-backed store implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use common::{CartId, CartItemId, CategoryId, Money, OrderId, ProductId, UserId};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::cart::{Cart, CartItem, NewCartItem};
use crate::catalog::{
    Category, NewCategory, NewProduct, Page, Product, ProductFilter, ProductImage, ProductState,
    ProductUpdate,
};
use crate::error::{Result, StoreError};
use crate::order::{
    CheckoutRequest, Order, OrderItem, OrderStatus, OrderUpdate, PaymentStatus, PlacedOrder,
    ShippingAddress,
};
use crate::store::{CartStore, CatalogStore, OrderScope, OrderStore, PageRequest};
use crate::{order_number, pricing};

/// PostgreSQL-backed shop store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    /// Attaches images, sizes, and colors to a batch of base product rows.
    async fn hydrate_products(&self, mut products: Vec<Product>) -> Result<Vec<Product>> {
        if products.is_empty() {
            return Ok(products);
        }
        let ids: Vec<Uuid> = products.iter().map(|p| p.id.as_uuid()).collect();

        let mut images: HashMap<Uuid, Vec<ProductImage>> = HashMap::new();
        let rows = sqlx::query(
            "SELECT product_id, url, alt_text, is_main, sort_order
             FROM product_images WHERE product_id = ANY($1) ORDER BY sort_order ASC",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        for row in rows {
            images
                .entry(row.try_get("product_id")?)
                .or_default()
                .push(ProductImage {
                    url: row.try_get("url")?,
                    alt_text: row.try_get("alt_text")?,
                    is_main: row.try_get("is_main")?,
                    sort_order: row.try_get("sort_order")?,
                });
        }

        let mut sizes: HashMap<Uuid, Vec<String>> = HashMap::new();
        let rows = sqlx::query(
            "SELECT product_id, size FROM product_sizes WHERE product_id = ANY($1) ORDER BY size",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        for row in rows {
            sizes
                .entry(row.try_get("product_id")?)
                .or_default()
                .push(row.try_get("size")?);
        }

        let mut colors: HashMap<Uuid, Vec<String>> = HashMap::new();
        let rows = sqlx::query(
            "SELECT product_id, color FROM product_colors WHERE product_id = ANY($1) ORDER BY color",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        for row in rows {
            colors
                .entry(row.try_get("product_id")?)
                .or_default()
                .push(row.try_get("color")?);
        }

        for product in &mut products {
            let id = product.id.as_uuid();
            product.images = images.remove(&id).unwrap_or_default();
            product.sizes = sizes.remove(&id).unwrap_or_default();
            product.colors = colors.remove(&id).unwrap_or_default();
        }
        Ok(products)
    }
}

fn decode_error(message: String) -> StoreError {
    StoreError::Database(sqlx::Error::Decode(message.into()))
}

fn parse_product_state(s: &str) -> Result<ProductState> {
    ProductState::parse(s).ok_or_else(|| decode_error(format!("unknown product state: {s}")))
}

fn parse_order_status(s: &str) -> Result<OrderStatus> {
    OrderStatus::parse(s).ok_or_else(|| decode_error(format!("unknown order status: {s}")))
}

fn parse_payment_status(s: &str) -> Result<PaymentStatus> {
    PaymentStatus::parse(s).ok_or_else(|| decode_error(format!("unknown payment status: {s}")))
}

fn row_to_category(row: &PgRow) -> Result<Category> {
    Ok(Category {
        id: CategoryId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        slug: row.try_get("slug")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Maps a base product row; side records are attached by `hydrate_products`.
fn row_to_product(row: &PgRow) -> Result<Product> {
    let state: String = row.try_get("state")?;
    Ok(Product {
        id: ProductId::from_uuid(row.try_get("id")?),
        category_id: CategoryId::from_uuid(row.try_get("category_id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        sku: row.try_get("sku")?,
        brand: row.try_get("brand")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        original_price: row
            .try_get::<Option<i64>, _>("original_price_cents")?
            .map(Money::from_cents),
        featured: row.try_get("featured")?,
        state: parse_product_state(&state)?,
        stock_quantity: row.try_get("stock_quantity")?,
        images: vec![],
        sizes: vec![],
        colors: vec![],
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_cart(row: &PgRow) -> Result<Cart> {
    Ok(Cart {
        id: CartId::from_uuid(row.try_get("id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_cart_item(row: &PgRow) -> Result<CartItem> {
    Ok(CartItem {
        id: CartItemId::from_uuid(row.try_get("id")?),
        cart_id: CartId::from_uuid(row.try_get("cart_id")?),
        product_id: ProductId::from_uuid(row.try_get("product_id")?),
        quantity: row.try_get::<i32, _>("quantity")? as u32,
        size: row.try_get("size")?,
        color: row.try_get("color")?,
        added_at: row.try_get("added_at")?,
    })
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    let payment_status: String = row.try_get("payment_status")?;
    Ok(Order {
        id: OrderId::from_uuid(row.try_get("id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        order_number: row.try_get("order_number")?,
        status: parse_order_status(&status)?,
        payment_status: parse_payment_status(&payment_status)?,
        subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
        tax_amount: Money::from_cents(row.try_get("tax_cents")?),
        shipping_amount: Money::from_cents(row.try_get("shipping_cents")?),
        discount_amount: Money::from_cents(row.try_get("discount_cents")?),
        total_amount: Money::from_cents(row.try_get("total_cents")?),
        shipping: ShippingAddress {
            first_name: row.try_get("shipping_first_name")?,
            last_name: row.try_get("shipping_last_name")?,
            address: row.try_get("shipping_address")?,
            city: row.try_get("shipping_city")?,
            state: row.try_get("shipping_state")?,
            zip_code: row.try_get("shipping_zip_code")?,
            country: row.try_get("shipping_country")?,
            phone: row.try_get("shipping_phone")?,
        },
        payment_method: row.try_get("payment_method")?,
        payment_transaction_id: row.try_get("payment_transaction_id")?,
        tracking_number: row.try_get("tracking_number")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        shipped_at: row.try_get("shipped_at")?,
        delivered_at: row.try_get("delivered_at")?,
    })
}

fn row_to_order_item(row: &PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        order_id: OrderId::from_uuid(row.try_get("order_id")?),
        product_id: ProductId::from_uuid(row.try_get("product_id")?),
        quantity: row.try_get::<i32, _>("quantity")? as u32,
        size: row.try_get("size")?,
        color: row.try_get("color")?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        total_price: Money::from_cents(row.try_get("total_price_cents")?),
    })
}

const ORDER_COLUMNS: &str = "id, user_id, order_number, status, payment_status, \
     subtotal_cents, tax_cents, shipping_cents, discount_cents, total_cents, \
     shipping_first_name, shipping_last_name, shipping_address, shipping_city, \
     shipping_state, shipping_zip_code, shipping_country, shipping_phone, \
     payment_method, payment_transaction_id, tracking_number, notes, \
     created_at, updated_at, shipped_at, delivered_at";

const PRODUCT_COLUMNS: &str = "id, category_id, name, description, sku, brand, price_cents, \
     original_price_cents, featured, state, stock_quantity, created_at, updated_at";

/// Inserts the order row. Returns false when the order number collided, so
/// the caller can regenerate without aborting the surrounding transaction.
async fn insert_order_row(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<bool> {
    let result = sqlx::query(
        "INSERT INTO orders (id, user_id, order_number, status, payment_status, \
         subtotal_cents, tax_cents, shipping_cents, discount_cents, total_cents, \
         shipping_first_name, shipping_last_name, shipping_address, shipping_city, \
         shipping_state, shipping_zip_code, shipping_country, shipping_phone, \
         payment_method, payment_transaction_id, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
         $18, $19, $20, $21) \
         ON CONFLICT ON CONSTRAINT orders_order_number_key DO NOTHING",
    )
    .bind(order.id.as_uuid())
    .bind(order.user_id.as_uuid())
    .bind(&order.order_number)
    .bind(order.status.as_str())
    .bind(order.payment_status.as_str())
    .bind(order.subtotal.cents())
    .bind(order.tax_amount.cents())
    .bind(order.shipping_amount.cents())
    .bind(order.discount_amount.cents())
    .bind(order.total_amount.cents())
    .bind(&order.shipping.first_name)
    .bind(&order.shipping.last_name)
    .bind(&order.shipping.address)
    .bind(&order.shipping.city)
    .bind(&order.shipping.state)
    .bind(&order.shipping.zip_code)
    .bind(&order.shipping.country)
    .bind(&order.shipping.phone)
    .bind(&order.payment_method)
    .bind(&order.payment_transaction_id)
    .bind(order.created_at)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() == 1)
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn create_category(&self, new: NewCategory) -> Result<Category> {
        let category = Category {
            id: CategoryId::new(),
            name: new.name,
            description: new.description,
            slug: new.slug,
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO categories (id, name, description, slug, is_active, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(category.id.as_uuid())
        .bind(&category.name)
        .bind(&category.description)
        .bind(&category.slug)
        .bind(category.is_active)
        .bind(category.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                match db_err.constraint() {
                    Some("categories_slug_key") => {
                        return StoreError::duplicate("slug", &category.slug);
                    }
                    Some("categories_name_key") => {
                        return StoreError::duplicate("name", &category.name);
                    }
                    _ => {}
                }
            }
            StoreError::Database(e)
        })?;

        Ok(category)
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query(
            "SELECT id, name, description, slug, is_active, created_at \
             FROM categories WHERE is_active ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_category).collect()
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>> {
        let row = sqlx::query(
            "SELECT id, name, description, slug, is_active, created_at \
             FROM categories WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_category).transpose()
    }

    async fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let row = sqlx::query(
            "SELECT id, name, description, slug, is_active, created_at \
             FROM categories WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_category).transpose()
    }

    async fn create_product(&self, new: NewProduct) -> Result<Product> {
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

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO products (id, category_id, name, description, sku, brand, \
             price_cents, original_price_cents, featured, state, stock_quantity, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(product.id.as_uuid())
        .bind(product.category_id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.sku)
        .bind(&product.brand)
        .bind(product.price.cents())
        .bind(product.original_price.map(|p| p.cents()))
        .bind(product.featured)
        .bind(product.state.as_str())
        .bind(product.stock_quantity)
        .bind(product.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                match db_err.constraint() {
                    Some("products_sku_key") => {
                        return StoreError::duplicate("sku", &product.sku);
                    }
                    Some("products_category_id_fkey") => {
                        return StoreError::not_found("category", product.category_id);
                    }
                    _ => {}
                }
            }
            StoreError::Database(e)
        })?;

        for image in &product.images {
            sqlx::query(
                "INSERT INTO product_images (product_id, url, alt_text, is_main, sort_order) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(product.id.as_uuid())
            .bind(&image.url)
            .bind(&image.alt_text)
            .bind(image.is_main)
            .bind(image.sort_order)
            .execute(&mut *tx)
            .await?;
        }
        for size in &product.sizes {
            sqlx::query("INSERT INTO product_sizes (product_id, size) VALUES ($1, $2)")
                .bind(product.id.as_uuid())
                .bind(size)
                .execute(&mut *tx)
                .await?;
        }
        for color in &product.colors {
            sqlx::query("INSERT INTO product_colors (product_id, color) VALUES ($1, $2)")
                .bind(product.id.as_uuid())
                .bind(color)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let product = row_to_product(&row)?;
                Ok(self.hydrate_products(vec![product]).await?.pop())
            }
            None => Ok(None),
        }
    }

    async fn get_product_by_sku(&self, sku: &str) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = $1"
        ))
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let product = row_to_product(&row)?;
                Ok(self.hydrate_products(vec![product]).await?.pop())
            }
            None => Ok(None),
        }
    }

    async fn list_products(
        &self,
        filter: ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>> {
        // Build the shared WHERE clause dynamically, count first, then fetch
        // the window.
        let mut clauses = String::from(" WHERE state = 'active'");
        let mut param_count = 0;

        if filter.category_id.is_some() {
            param_count += 1;
            clauses.push_str(&format!(" AND category_id = ${param_count}"));
        }
        if filter.search.is_some() {
            param_count += 1;
            clauses.push_str(&format!(
                " AND (name ILIKE ${param_count} OR description ILIKE ${param_count} \
                 OR brand ILIKE ${param_count})"
            ));
        }
        if filter.featured.is_some() {
            param_count += 1;
            clauses.push_str(&format!(" AND featured = ${param_count}"));
        }
        if filter.min_price.is_some() {
            param_count += 1;
            clauses.push_str(&format!(" AND price_cents >= ${param_count}"));
        }
        if filter.max_price.is_some() {
            param_count += 1;
            clauses.push_str(&format!(" AND price_cents <= ${param_count}"));
        }

        let search_pattern = filter.search.as_ref().map(|s| format!("%{s}%"));

        let count_sql = format!("SELECT COUNT(*) FROM products{clauses}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(id) = filter.category_id {
            count_query = count_query.bind(id.as_uuid());
        }
        if let Some(ref pattern) = search_pattern {
            count_query = count_query.bind(pattern);
        }
        if let Some(featured) = filter.featured {
            count_query = count_query.bind(featured);
        }
        if let Some(min) = filter.min_price {
            count_query = count_query.bind(min.cents());
        }
        if let Some(max) = filter.max_price {
            count_query = count_query.bind(max.cents());
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products{clauses} \
             ORDER BY created_at DESC LIMIT ${} OFFSET ${}",
            param_count + 1,
            param_count + 2
        );
        let mut select_query = sqlx::query(&sql);
        if let Some(id) = filter.category_id {
            select_query = select_query.bind(id.as_uuid());
        }
        if let Some(ref pattern) = search_pattern {
            select_query = select_query.bind(pattern);
        }
        if let Some(featured) = filter.featured {
            select_query = select_query.bind(featured);
        }
        if let Some(min) = filter.min_price {
            select_query = select_query.bind(min.cents());
        }
        if let Some(max) = filter.max_price {
            select_query = select_query.bind(max.cents());
        }
        let rows = select_query
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        let products: Vec<Product> = rows.iter().map(row_to_product).collect::<Result<_>>()?;
        let products = self.hydrate_products(products).await?;

        Ok(Page::new(
            products,
            total as u64,
            page.page(),
            page.per_page(),
        ))
    }

    async fn list_featured_products(&self, limit: u32) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE state = 'active' AND featured ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let products: Vec<Product> = rows.iter().map(row_to_product).collect::<Result<_>>()?;
        self.hydrate_products(products).await
    }

    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::not_found("product", id))?;

        let mut product = row_to_product(&row)?;
        update.apply(&mut product, Utc::now());

        sqlx::query(
            "UPDATE products SET category_id = $2, name = $3, description = $4, brand = $5, \
             price_cents = $6, original_price_cents = $7, featured = $8, state = $9, \
             stock_quantity = $10, updated_at = $11 WHERE id = $1",
        )
        .bind(product.id.as_uuid())
        .bind(product.category_id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.brand)
        .bind(product.price.cents())
        .bind(product.original_price.map(|p| p.cents()))
        .bind(product.featured)
        .bind(product.state.as_str())
        .bind(product.stock_quantity)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("products_category_id_fkey")
            {
                return StoreError::not_found("category", product.category_id);
            }
            StoreError::Database(e)
        })?;

        tx.commit().await?;

        let mut hydrated = self.hydrate_products(vec![product]).await?;
        hydrated
            .pop()
            .ok_or_else(|| StoreError::not_found("product", id))
    }

    async fn deactivate_product(&self, id: ProductId) -> Result<()> {
        let result =
            sqlx::query("UPDATE products SET state = 'deactivated', updated_at = $2 WHERE id = $1")
                .bind(id.as_uuid())
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("product", id));
        }
        Ok(())
    }
}

#[async_trait]
impl CartStore for PostgresStore {
    async fn get_or_create_cart(&self, user_id: UserId) -> Result<Cart> {
        sqlx::query(
            "INSERT INTO carts (id, user_id, created_at) VALUES ($1, $2, $3) \
             ON CONFLICT ON CONSTRAINT carts_user_id_key DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(user_id.as_uuid())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            "SELECT id, user_id, created_at, updated_at FROM carts WHERE user_id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        row_to_cart(&row)
    }

    async fn cart_items(&self, user_id: UserId) -> Result<Vec<CartItem>> {
        let rows = sqlx::query(
            "SELECT ci.id, ci.cart_id, ci.product_id, ci.quantity, ci.size, ci.color, ci.added_at \
             FROM cart_items ci JOIN carts c ON c.id = ci.cart_id \
             WHERE c.user_id = $1 ORDER BY ci.added_at ASC, ci.id ASC",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_cart_item).collect()
    }

    async fn add_cart_item(&self, user_id: UserId, new: NewCartItem) -> Result<CartItem> {
        let mut tx = self.pool.begin().await?;

        // The referenced product must exist and be active.
        let exists: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM products WHERE id = $1 AND state = 'active'")
                .bind(new.product_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Err(StoreError::not_found("product", new.product_id));
        }

        let now = Utc::now();
        sqlx::query(
            "INSERT INTO carts (id, user_id, created_at) VALUES ($1, $2, $3) \
             ON CONFLICT ON CONSTRAINT carts_user_id_key DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(user_id.as_uuid())
        .bind(now)
        .execute(&mut *tx)
        .await?;
        let cart_id: Uuid = sqlx::query_scalar("SELECT id FROM carts WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_one(&mut *tx)
            .await?;

        // Merging on the line key keeps at most one row per
        // (product, size, color) triple even under concurrent adds.
        let row = sqlx::query(
            "INSERT INTO cart_items (id, cart_id, product_id, quantity, size, color, added_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT ON CONSTRAINT cart_items_line_key \
             DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity \
             RETURNING id, cart_id, product_id, quantity, size, color, added_at",
        )
        .bind(Uuid::new_v4())
        .bind(cart_id)
        .bind(new.product_id.as_uuid())
        .bind(new.quantity as i32)
        .bind(&new.size)
        .bind(&new.color)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE carts SET updated_at = $2 WHERE id = $1")
            .bind(cart_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        row_to_cart_item(&row)
    }

    async fn update_cart_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<CartItem> {
        let row = sqlx::query(
            "UPDATE cart_items SET quantity = $3 FROM carts \
             WHERE cart_items.id = $1 AND cart_items.cart_id = carts.id AND carts.user_id = $2 \
             RETURNING cart_items.id, cart_items.cart_id, cart_items.product_id, \
             cart_items.quantity, cart_items.size, cart_items.color, cart_items.added_at",
        )
        .bind(item_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(quantity as i32)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found("cart item", item_id))?;

        row_to_cart_item(&row)
    }

    async fn remove_cart_item(&self, user_id: UserId, item_id: CartItemId) -> Result<()> {
        let result = sqlx::query(
            "DELETE FROM cart_items USING carts \
             WHERE cart_items.id = $1 AND cart_items.cart_id = carts.id AND carts.user_id = $2",
        )
        .bind(item_id.as_uuid())
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("cart item", item_id));
        }
        Ok(())
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<()> {
        sqlx::query(
            "DELETE FROM cart_items USING carts \
             WHERE cart_items.cart_id = carts.id AND carts.user_id = $1",
        )
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn checkout(&self, user_id: UserId, request: CheckoutRequest) -> Result<PlacedOrder> {
        let mut tx = self.pool.begin().await?;

        // Lock the cart row for the duration of the transaction; concurrent
        // checkouts on the same cart serialize here and the loser sees an
        // empty cart below.
        let cart_id: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM carts WHERE user_id = $1 FOR UPDATE")
                .bind(user_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        let Some(cart_id) = cart_id else {
            return Err(StoreError::EmptyCart);
        };

        let rows = sqlx::query(
            "SELECT ci.id, ci.product_id, ci.quantity, ci.size, ci.color, p.price_cents, p.state \
             FROM cart_items ci JOIN products p ON p.id = ci.product_id \
             WHERE ci.cart_id = $1 ORDER BY ci.added_at ASC, ci.id ASC",
        )
        .bind(cart_id)
        .fetch_all(&mut *tx)
        .await?;
        if rows.is_empty() {
            return Err(StoreError::EmptyCart);
        }

        let mut lines = Vec::with_capacity(rows.len());
        let mut line_ids = Vec::with_capacity(rows.len());
        for row in &rows {
            line_ids.push(row.try_get::<Uuid, _>("id")?);
            let product_id = ProductId::from_uuid(row.try_get("product_id")?);
            let state: String = row.try_get("state")?;
            if parse_product_state(&state)? != ProductState::Active {
                return Err(StoreError::ProductUnavailable(product_id));
            }
            lines.push(pricing::PricedLine {
                product_id,
                quantity: row.try_get::<i32, _>("quantity")? as u32,
                size: row.try_get("size")?,
                color: row.try_get("color")?,
                unit_price: Money::from_cents(row.try_get("price_cents")?),
            });
        }

        let totals = pricing::order_totals(&lines);
        let now = Utc::now();
        let mut order = Order {
            id: OrderId::new(),
            user_id,
            order_number: order_number::generate(now),
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

        // One regenerate-and-retry on an order number collision; a second
        // collision in a row is surfaced instead of looped on.
        if !insert_order_row(&mut tx, &order).await? {
            order.order_number = order_number::generate(now);
            if !insert_order_row(&mut tx, &order).await? {
                return Err(StoreError::duplicate("order_number", &order.order_number));
            }
        }

        let mut items = Vec::with_capacity(lines.len());
        for (position, line) in lines.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items (order_id, position, product_id, quantity, size, \
                 color, unit_price_cents, total_price_cents) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(order.id.as_uuid())
            .bind(position as i32)
            .bind(line.product_id.as_uuid())
            .bind(line.quantity as i32)
            .bind(&line.size)
            .bind(&line.color)
            .bind(line.unit_price.cents())
            .bind(line.total_price().cents())
            .execute(&mut *tx)
            .await?;

            items.push(OrderItem {
                order_id: order.id,
                product_id: line.product_id,
                quantity: line.quantity,
                size: line.size.clone(),
                color: line.color.clone(),
                unit_price: line.unit_price,
                total_price: line.total_price(),
            });
        }

        // Remove exactly the lines that went into the order; a line committed
        // by a concurrent add after the snapshot read stays in the cart.
        sqlx::query("DELETE FROM cart_items WHERE id = ANY($1)")
            .bind(&line_ids)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE carts SET updated_at = $2 WHERE id = $1")
            .bind(cart_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(PlacedOrder { order, items })
    }

    async fn get_order(&self, id: OrderId, scope: OrderScope) -> Result<Option<Order>> {
        let row = match scope {
            OrderScope::User(user_id) => {
                sqlx::query(&format!(
                    "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2"
                ))
                .bind(id.as_uuid())
                .bind(user_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?
            }
            OrderScope::Any => {
                sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                    .bind(id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await?
            }
        };

        row.as_ref().map(row_to_order).transpose()
    }

    async fn get_order_by_number(
        &self,
        number: &str,
        scope: OrderScope,
    ) -> Result<Option<Order>> {
        let row = match scope {
            OrderScope::User(user_id) => {
                sqlx::query(&format!(
                    "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1 AND user_id = $2"
                ))
                .bind(number)
                .bind(user_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?
            }
            OrderScope::Any => {
                sqlx::query(&format!(
                    "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1"
                ))
                .bind(number)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        row.as_ref().map(row_to_order).transpose()
    }

    async fn order_items(&self, id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            "SELECT order_id, product_id, quantity, size, color, unit_price_cents, \
             total_price_cents FROM order_items WHERE order_id = $1 ORDER BY position ASC",
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_order_item).collect()
    }

    async fn list_orders(&self, user_id: UserId, page: PageRequest) -> Result<Page<Order>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id.as_uuid())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let orders: Vec<Order> = rows.iter().map(row_to_order).collect::<Result<_>>()?;
        Ok(Page::new(orders, total as u64, page.page(), page.per_page()))
    }

    async fn list_all_orders(
        &self,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<Page<Order>> {
        let (total, rows) = match status {
            Some(status) => {
                let total: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE status = $1")
                        .bind(status.as_str())
                        .fetch_one(&self.pool)
                        .await?;
                let rows = sqlx::query(&format!(
                    "SELECT {ORDER_COLUMNS} FROM orders WHERE status = $1 \
                     ORDER BY created_at DESC LIMIT $2 OFFSET $3"
                ))
                .bind(status.as_str())
                .bind(page.limit())
                .bind(page.offset())
                .fetch_all(&self.pool)
                .await?;
                (total, rows)
            }
            None => {
                let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
                    .fetch_one(&self.pool)
                    .await?;
                let rows = sqlx::query(&format!(
                    "SELECT {ORDER_COLUMNS} FROM orders \
                     ORDER BY created_at DESC LIMIT $1 OFFSET $2"
                ))
                .bind(page.limit())
                .bind(page.offset())
                .fetch_all(&self.pool)
                .await?;
                (total, rows)
            }
        };

        let orders: Vec<Order> = rows.iter().map(row_to_order).collect::<Result<_>>()?;
        Ok(Page::new(orders, total as u64, page.page(), page.per_page()))
    }

    async fn update_order(&self, id: OrderId, update: OrderUpdate) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::not_found("order", id))?;

        let mut order = row_to_order(&row)?;
        update.apply(&mut order, Utc::now());

        sqlx::query(
            "UPDATE orders SET status = $2, payment_status = $3, tracking_number = $4, \
             notes = $5, shipped_at = $6, delivered_at = $7, updated_at = $8 WHERE id = $1",
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(&order.tracking_number)
        .bind(&order.notes)
        .bind(order.shipped_at)
        .bind(order.delivered_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(order)
    }
}
