//! Catalog entities: categories, products, and their side records.

use chrono::{DateTime, Utc};
use common::{CategoryId, Money, ProductId};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a product.
///
/// Deletion is soft: a deactivated product stays referenced by historical
/// orders but disappears from catalog browsing and rejects new cart lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductState {
    Active,
    Deactivated,
}

impl ProductState {
    /// Returns the wire/storage form of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductState::Active => "active",
            ProductState::Deactivated => "deactivated",
        }
    }

    /// Parses the storage form of the state.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ProductState::Active),
            "deactivated" => Some(ProductState::Deactivated),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProductState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub slug: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a category.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
    pub slug: String,
}

/// An image attached to a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub url: String,
    pub alt_text: Option<String>,
    pub is_main: bool,
    pub sort_order: i32,
}

/// A catalog product with its hydrated side records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub category_id: CategoryId,
    pub name: String,
    pub description: String,
    pub sku: String,
    pub brand: String,
    pub price: Money,
    pub original_price: Option<Money>,
    pub featured: bool,
    pub state: ProductState,
    /// Tracked but never validated or decremented at checkout.
    pub stock_quantity: i32,
    pub images: Vec<ProductImage>,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Product {
    /// True when an original price is set and greater than the current price.
    pub fn is_on_sale(&self) -> bool {
        self.original_price.is_some_and(|orig| orig > self.price)
    }

    /// Discount off the original price as a rounded percentage, 0 when not
    /// on sale.
    pub fn discount_percentage(&self) -> u32 {
        match self.original_price {
            Some(orig) if orig > self.price && !orig.is_zero() => {
                let discount = orig - self.price;
                ((discount.cents() * 100 + orig.cents() / 2) / orig.cents()) as u32
            }
            _ => 0,
        }
    }

    /// URL of the image flagged as main, if any.
    pub fn main_image(&self) -> Option<&str> {
        self.images
            .iter()
            .find(|img| img.is_main)
            .map(|img| img.url.as_str())
    }
}

/// Fields required to create a product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub category_id: CategoryId,
    pub name: String,
    pub description: String,
    pub sku: String,
    pub brand: String,
    pub price: Money,
    pub original_price: Option<Money>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub stock_quantity: i32,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
}

/// Explicit per-field product update; `None` leaves a field untouched.
///
/// Every mutable field is enumerated here; anything else on the product is
/// immutable after creation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub category_id: Option<CategoryId>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub price: Option<Money>,
    pub original_price: Option<Money>,
    pub featured: Option<bool>,
    pub state: Option<ProductState>,
    pub stock_quantity: Option<i32>,
}

impl ProductUpdate {
    /// Applies the update in place, stamping `updated_at`.
    pub fn apply(&self, product: &mut Product, now: DateTime<Utc>) {
        if let Some(category_id) = self.category_id {
            product.category_id = category_id;
        }
        if let Some(ref name) = self.name {
            product.name = name.clone();
        }
        if let Some(ref description) = self.description {
            product.description = description.clone();
        }
        if let Some(ref brand) = self.brand {
            product.brand = brand.clone();
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(original_price) = self.original_price {
            product.original_price = Some(original_price);
        }
        if let Some(featured) = self.featured {
            product.featured = featured;
        }
        if let Some(state) = self.state {
            product.state = state;
        }
        if let Some(stock_quantity) = self.stock_quantity {
            product.stock_quantity = stock_quantity;
        }
        product.updated_at = Some(now);
    }
}

/// Filters for catalog browsing; only active products are ever returned.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category_id: Option<CategoryId>,
    /// Case-insensitive substring match over name, description, and brand.
    pub search: Option<String>,
    pub featured: Option<bool>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
}

/// One page of results with pagination bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub pages: u32,
}

impl<T> Page<T> {
    /// Builds a page from a result window and the unpaginated total.
    pub fn new(items: Vec<T>, total: u64, page: u32, per_page: u32) -> Self {
        let pages = (total.div_ceil(u64::from(per_page))) as u32;
        Self {
            items,
            total,
            page,
            per_page,
            pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price: i64, original: Option<i64>) -> Product {
        Product {
            id: ProductId::new(),
            category_id: CategoryId::new(),
            name: "Air Max".to_string(),
            description: "Running shoe".to_string(),
            sku: "SKU-001".to_string(),
            brand: "Nike".to_string(),
            price: Money::from_cents(price),
            original_price: original.map(Money::from_cents),
            featured: false,
            state: ProductState::Active,
            stock_quantity: 10,
            images: vec![],
            sizes: vec![],
            colors: vec![],
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn on_sale_requires_higher_original_price() {
        assert!(product(8000, Some(10000)).is_on_sale());
        assert!(!product(10000, Some(10000)).is_on_sale());
        assert!(!product(10000, None).is_on_sale());
    }

    #[test]
    fn discount_percentage_rounds() {
        // (100 - 80) / 100 = 20%
        assert_eq!(product(8000, Some(10000)).discount_percentage(), 20);
        // (120 - 80) / 120 = 33.33% -> 33
        assert_eq!(product(8000, Some(12000)).discount_percentage(), 33);
        // (30 - 20) / 30 = 33.33% -> 33, (30 - 10) / 30 = 66.67% -> 67
        assert_eq!(product(1000, Some(3000)).discount_percentage(), 67);
        assert_eq!(product(10000, None).discount_percentage(), 0);
    }

    #[test]
    fn main_image_picks_flagged_entry() {
        let mut p = product(1000, None);
        assert_eq!(p.main_image(), None);

        p.images = vec![
            ProductImage {
                url: "a.jpg".to_string(),
                alt_text: None,
                is_main: false,
                sort_order: 0,
            },
            ProductImage {
                url: "b.jpg".to_string(),
                alt_text: Some("front".to_string()),
                is_main: true,
                sort_order: 1,
            },
        ];
        assert_eq!(p.main_image(), Some("b.jpg"));
    }

    #[test]
    fn product_update_applies_only_set_fields() {
        let mut p = product(1000, None);
        let before = p.clone();
        let now = Utc::now();

        let update = ProductUpdate {
            price: Some(Money::from_cents(900)),
            state: Some(ProductState::Deactivated),
            ..ProductUpdate::default()
        };
        update.apply(&mut p, now);

        assert_eq!(p.price.cents(), 900);
        assert_eq!(p.state, ProductState::Deactivated);
        assert_eq!(p.name, before.name);
        assert_eq!(p.brand, before.brand);
        assert_eq!(p.updated_at, Some(now));
    }

    #[test]
    fn page_counts() {
        let page = Page::new(vec![1, 2, 3], 7, 1, 3);
        assert_eq!(page.pages, 3);
        let empty: Page<i32> = Page::new(vec![], 0, 1, 20);
        assert_eq!(empty.pages, 0);
    }
}
