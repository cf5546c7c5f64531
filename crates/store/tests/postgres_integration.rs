//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use sqlx::PgPool;
use store::{
    CartStore, CatalogStore, CheckoutRequest, Money, NewCartItem, NewCategory, NewProduct,
    OrderScope, OrderStatus, OrderStore, OrderUpdate, PageRequest, PostgresStore, ProductFilter,
    ProductId, ProductImage, ProductUpdate, ShippingAddress, StoreError, UserId,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            // Run migrations using raw_sql to execute multiple statements
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_shop_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    // Create a fresh pool for each test to avoid connection issues
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    // Clear tables for test isolation
    sqlx::query(
        "TRUNCATE TABLE order_items, orders, cart_items, carts, product_colors, \
         product_sizes, product_images, products, categories, users",
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresStore::new(pool)
}

async fn seed_product(store: &PostgresStore, price_cents: i64) -> store::Product {
    let tag = Uuid::new_v4().simple().to_string();
    let category = store
        .create_category(NewCategory {
            name: format!("Running {tag}"),
            description: Some("Road shoes".to_string()),
            slug: format!("running-{tag}"),
        })
        .await
        .unwrap();

    store
        .create_product(NewProduct {
            category_id: category.id,
            name: "Air Runner".to_string(),
            description: "Lightweight runner".to_string(),
            sku: format!("SKU-{tag}"),
            brand: "Nike".to_string(),
            price: Money::from_cents(price_cents),
            original_price: None,
            featured: false,
            stock_quantity: 10,
            images: vec![ProductImage {
                url: "main.jpg".to_string(),
                alt_text: Some("front".to_string()),
                is_main: true,
                sort_order: 0,
            }],
            sizes: vec!["10".to_string(), "11".to_string()],
            colors: vec!["black".to_string()],
        })
        .await
        .unwrap()
}

fn new_item(product_id: ProductId, quantity: u32) -> NewCartItem {
    NewCartItem {
        product_id,
        quantity,
        size: "10".to_string(),
        color: "black".to_string(),
    }
}

fn checkout_request() -> CheckoutRequest {
    CheckoutRequest {
        shipping: ShippingAddress {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            address: "1 Analytical Way".to_string(),
            city: "London".to_string(),
            state: "LDN".to_string(),
            zip_code: "E1 6AN".to_string(),
            country: "UK".to_string(),
            phone: None,
        },
        payment_method: Some("card".to_string()),
        payment_transaction_id: Some("txn-1".to_string()),
    }
}

#[tokio::test]
async fn create_and_fetch_product_with_side_records() {
    let store = get_test_store().await;
    let created = seed_product(&store, 4000).await;

    let fetched = store.get_product(created.id).await.unwrap().unwrap();
    assert_eq!(fetched.sku, created.sku);
    assert_eq!(fetched.price.cents(), 4000);
    assert_eq!(fetched.main_image(), Some("main.jpg"));
    assert_eq!(fetched.sizes, vec!["10", "11"]);
    assert_eq!(fetched.colors, vec!["black"]);

    let by_sku = store.get_product_by_sku(&created.sku).await.unwrap();
    assert_eq!(by_sku.map(|p| p.id), Some(created.id));
}

#[tokio::test]
async fn duplicate_sku_is_rejected() {
    let store = get_test_store().await;
    let product = seed_product(&store, 4000).await;

    let result = store
        .create_product(NewProduct {
            category_id: product.category_id,
            name: "Other".to_string(),
            description: "Other".to_string(),
            sku: product.sku.clone(),
            brand: "Nike".to_string(),
            price: Money::from_cents(100),
            original_price: None,
            featured: false,
            stock_quantity: 0,
            images: vec![],
            sizes: vec![],
            colors: vec![],
        })
        .await;

    assert!(matches!(result, Err(StoreError::Duplicate { field, .. }) if field == "sku"));
}

#[tokio::test]
async fn duplicate_category_slug_is_rejected() {
    let store = get_test_store().await;
    let first = store
        .create_category(NewCategory {
            name: "Basketball".to_string(),
            description: None,
            slug: "basketball".to_string(),
        })
        .await
        .unwrap();

    let result = store
        .create_category(NewCategory {
            name: "Basketball Two".to_string(),
            description: None,
            slug: first.slug.clone(),
        })
        .await;

    assert!(matches!(result, Err(StoreError::Duplicate { field, .. }) if field == "slug"));
}

#[tokio::test]
async fn list_products_applies_filters_and_pagination() {
    let store = get_test_store().await;
    let cheap = seed_product(&store, 2000).await;
    let pricey = seed_product(&store, 9000).await;

    let page = store
        .list_products(
            ProductFilter {
                min_price: Some(Money::from_cents(5000)),
                ..Default::default()
            },
            PageRequest::new(1, 10),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, pricey.id);

    // A deactivated product disappears from browsing but stays fetchable.
    store.deactivate_product(cheap.id).await.unwrap();
    let page = store
        .list_products(ProductFilter::default(), PageRequest::new(1, 10))
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert!(store.get_product(cheap.id).await.unwrap().is_some());
}

#[tokio::test]
async fn search_matches_name_description_and_brand() {
    let store = get_test_store().await;
    seed_product(&store, 4000).await;

    let page = store
        .list_products(
            ProductFilter {
                search: Some("NIKE".to_string()),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);

    let page = store
        .list_products(
            ProductFilter {
                search: Some("no-such-thing".to_string()),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn product_update_applies_only_set_fields() {
    let store = get_test_store().await;
    let product = seed_product(&store, 4000).await;

    let updated = store
        .update_product(
            product.id,
            ProductUpdate {
                price: Some(Money::from_cents(3500)),
                featured: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.price.cents(), 3500);
    assert!(updated.featured);
    assert_eq!(updated.name, product.name);
    assert!(updated.updated_at.is_some());
    // Side records survive an update untouched.
    assert_eq!(updated.sizes, product.sizes);
}

#[tokio::test]
async fn adding_same_line_twice_merges_quantities() {
    let store = get_test_store().await;
    let user = UserId::new();
    let product = seed_product(&store, 4000).await;

    store
        .add_cart_item(user, new_item(product.id, 2))
        .await
        .unwrap();
    let merged = store
        .add_cart_item(user, new_item(product.id, 3))
        .await
        .unwrap();

    assert_eq!(merged.quantity, 5);
    assert_eq!(store.cart_items(user).await.unwrap().len(), 1);
}

#[tokio::test]
async fn adding_an_item_touches_the_cart_timestamp() {
    let store = get_test_store().await;
    let user = UserId::new();
    let product = seed_product(&store, 4000).await;

    let fresh = store.get_or_create_cart(user).await.unwrap();
    assert!(fresh.updated_at.is_none());

    let item = store
        .add_cart_item(user, new_item(product.id, 1))
        .await
        .unwrap();
    let cart = store.get_or_create_cart(user).await.unwrap();
    // The line insert and the timestamp touch commit together.
    assert_eq!(cart.updated_at, Some(item.added_at));
}

#[tokio::test]
async fn cart_mutations_are_scoped_to_the_owner() {
    let store = get_test_store().await;
    let owner = UserId::new();
    let stranger = UserId::new();
    let product = seed_product(&store, 4000).await;
    let item = store
        .add_cart_item(owner, new_item(product.id, 1))
        .await
        .unwrap();

    let result = store.update_cart_item(stranger, item.id, 5).await;
    assert!(matches!(result, Err(StoreError::NotFound { .. })));

    let result = store.remove_cart_item(stranger, item.id).await;
    assert!(matches!(result, Err(StoreError::NotFound { .. })));

    let updated = store.update_cart_item(owner, item.id, 5).await.unwrap();
    assert_eq!(updated.quantity, 5);
    store.remove_cart_item(owner, item.id).await.unwrap();
    assert!(store.cart_items(owner).await.unwrap().is_empty());
}

#[tokio::test]
async fn adding_a_deactivated_product_is_rejected() {
    let store = get_test_store().await;
    let user = UserId::new();
    let product = seed_product(&store, 4000).await;
    store.deactivate_product(product.id).await.unwrap();

    let result = store.add_cart_item(user, new_item(product.id, 1)).await;
    assert!(matches!(result, Err(StoreError::NotFound { .. })));
}

#[tokio::test]
async fn checkout_prices_persists_and_clears() {
    let store = get_test_store().await;
    let user = UserId::new();
    let shoe = seed_product(&store, 12000).await;
    let sock = seed_product(&store, 1500).await;
    store
        .add_cart_item(user, new_item(shoe.id, 1))
        .await
        .unwrap();
    store
        .add_cart_item(user, new_item(sock.id, 2))
        .await
        .unwrap();

    let placed = store.checkout(user, checkout_request()).await.unwrap();

    // $120 + 2 x $15 = $150 subtotal, 8% tax, free shipping over $100.
    assert_eq!(placed.order.subtotal.cents(), 15000);
    assert_eq!(placed.order.tax_amount.cents(), 1200);
    assert_eq!(placed.order.shipping_amount.cents(), 0);
    assert_eq!(placed.order.total_amount.cents(), 16200);
    assert!(placed.order.order_number.starts_with("NK"));
    assert_eq!(placed.order.order_number.len(), 18);
    assert_eq!(placed.order.status, OrderStatus::Pending);

    // Items keep cart order and frozen prices.
    assert_eq!(placed.items.len(), 2);
    assert_eq!(placed.items[0].product_id, shoe.id);
    assert_eq!(placed.items[0].unit_price.cents(), 12000);
    assert_eq!(placed.items[1].total_price.cents(), 3000);

    assert!(store.cart_items(user).await.unwrap().is_empty());

    let stored_items = store.order_items(placed.order.id).await.unwrap();
    assert_eq!(stored_items, placed.items);
}

#[tokio::test]
async fn checkout_deletes_the_ordered_lines_by_id() {
    let store = get_test_store().await;
    let user = UserId::new();
    let bystander = UserId::new();
    let product = seed_product(&store, 4000).await;

    let ordered = store
        .add_cart_item(user, new_item(product.id, 1))
        .await
        .unwrap();
    let kept = store
        .add_cart_item(bystander, new_item(product.id, 2))
        .await
        .unwrap();

    store.checkout(user, checkout_request()).await.unwrap();

    // Only the snapshotted line ids are deleted; other carts' lines stay.
    let gone: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items WHERE id = $1")
        .bind(ordered.id.as_uuid())
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(gone, 0);
    assert_eq!(store.cart_items(bystander).await.unwrap(), vec![kept]);
}

#[tokio::test]
async fn checkout_rejects_empty_cart() {
    let store = get_test_store().await;
    let user = UserId::new();

    let result = store.checkout(user, checkout_request()).await;
    assert!(matches!(result, Err(StoreError::EmptyCart)));

    // An existing but emptied cart behaves the same.
    let product = seed_product(&store, 4000).await;
    store
        .add_cart_item(user, new_item(product.id, 1))
        .await
        .unwrap();
    store.clear_cart(user).await.unwrap();
    let result = store.checkout(user, checkout_request()).await;
    assert!(matches!(result, Err(StoreError::EmptyCart)));
}

#[tokio::test]
async fn checkout_failure_leaves_cart_intact() {
    let store = get_test_store().await;
    let user = UserId::new();
    let product = seed_product(&store, 4000).await;
    store
        .add_cart_item(user, new_item(product.id, 1))
        .await
        .unwrap();
    store.deactivate_product(product.id).await.unwrap();

    let result = store.checkout(user, checkout_request()).await;
    assert!(matches!(result, Err(StoreError::ProductUnavailable(id)) if id == product.id));
    assert_eq!(store.cart_items(user).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_checkouts_place_exactly_one_order() {
    let store = get_test_store().await;
    let user = UserId::new();
    let product = seed_product(&store, 4000).await;
    store
        .add_cart_item(user, new_item(product.id, 1))
        .await
        .unwrap();

    let a = {
        let store = store.clone();
        tokio::spawn(async move { store.checkout(user, checkout_request()).await })
    };
    let b = {
        let store = store.clone();
        tokio::spawn(async move { store.checkout(user, checkout_request()).await })
    };
    let results = [a.await.unwrap(), b.await.unwrap()];

    let placed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(placed, 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(StoreError::EmptyCart)))
    );

    let orders = store
        .list_orders(user, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(orders.total, 1);
}

#[tokio::test]
async fn order_reads_are_scoped() {
    let store = get_test_store().await;
    let owner = UserId::new();
    let stranger = UserId::new();
    let product = seed_product(&store, 4000).await;
    store
        .add_cart_item(owner, new_item(product.id, 1))
        .await
        .unwrap();
    let placed = store.checkout(owner, checkout_request()).await.unwrap();

    let hidden = store
        .get_order(placed.order.id, OrderScope::User(stranger))
        .await
        .unwrap();
    assert!(hidden.is_none());

    let by_number = store
        .get_order_by_number(&placed.order.order_number, OrderScope::User(owner))
        .await
        .unwrap();
    assert_eq!(by_number.map(|o| o.id), Some(placed.order.id));

    let any = store
        .get_order(placed.order.id, OrderScope::Any)
        .await
        .unwrap();
    assert!(any.is_some());
}

#[tokio::test]
async fn list_all_orders_filters_by_status() {
    let store = get_test_store().await;
    let product = seed_product(&store, 4000).await;
    let mut ids = vec![];
    for _ in 0..2 {
        let user = UserId::new();
        store
            .add_cart_item(user, new_item(product.id, 1))
            .await
            .unwrap();
        ids.push(store.checkout(user, checkout_request()).await.unwrap().order.id);
    }

    store
        .update_order(
            ids[0],
            OrderUpdate {
                status: Some(OrderStatus::Shipped),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let shipped = store
        .list_all_orders(Some(OrderStatus::Shipped), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(shipped.total, 1);
    assert_eq!(shipped.items[0].id, ids[0]);

    let all = store
        .list_all_orders(None, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(all.total, 2);
}

#[tokio::test]
async fn shipped_timestamp_is_set_once() {
    let store = get_test_store().await;
    let user = UserId::new();
    let product = seed_product(&store, 4000).await;
    store
        .add_cart_item(user, new_item(product.id, 1))
        .await
        .unwrap();
    let placed = store.checkout(user, checkout_request()).await.unwrap();

    let shipped = store
        .update_order(
            placed.order.id,
            OrderUpdate {
                status: Some(OrderStatus::Shipped),
                tracking_number: Some("TRACK-1".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let first_shipped_at = shipped.shipped_at.unwrap();
    assert_eq!(shipped.tracking_number.as_deref(), Some("TRACK-1"));

    // Re-marking as shipped must not move the timestamp.
    let again = store
        .update_order(
            placed.order.id,
            OrderUpdate {
                status: Some(OrderStatus::Shipped),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(again.shipped_at, Some(first_shipped_at));
}
