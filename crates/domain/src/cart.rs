//! Cart service: per-user cart mutations and the hydrated cart view.

use common::{CartItemId, Money, UserId};
use serde::Serialize;
use store::{CartItem, CartStore, CatalogStore, NewCartItem, ProductState};

use crate::error::{DomainError, Result, require_filled};

const MAX_LINE_QUANTITY: u32 = 100;

/// One cart line joined with the product it references.
///
/// `available` is false when the product has been deactivated since the
/// line was added; such lines still display but will fail checkout.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    #[serde(flatten)]
    pub item: CartItem,
    pub product_name: String,
    pub unit_price: Money,
    pub line_total: Money,
    pub image: Option<String>,
    pub available: bool,
}

/// A user's cart hydrated for display: lines with current product data and
/// a running subtotal. Tax and shipping are computed at checkout, not here.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub subtotal: Money,
    pub total_quantity: u32,
}

/// Service for managing a user's cart.
pub struct CartService<S> {
    store: S,
}

impl<S: CartStore + CatalogStore> CartService<S> {
    /// Creates a new cart service with the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The user's cart joined with current product data. Lines whose product
    /// has vanished are dropped from the view.
    #[tracing::instrument(skip(self))]
    pub async fn view(&self, user_id: UserId) -> Result<CartView> {
        let items = self.store.cart_items(user_id).await?;

        let mut lines = Vec::with_capacity(items.len());
        let mut subtotal = Money::zero();
        let mut total_quantity = 0;
        for item in items {
            let Some(product) = self.store.get_product(item.product_id).await? else {
                continue;
            };
            let line_total = product.price.multiply(item.quantity);
            subtotal += line_total;
            total_quantity += item.quantity;
            lines.push(CartLine {
                product_name: product.name.clone(),
                unit_price: product.price,
                line_total,
                image: product.main_image().map(str::to_string),
                available: product.state == ProductState::Active,
                item,
            });
        }

        Ok(CartView {
            lines,
            subtotal,
            total_quantity,
        })
    }

    #[tracing::instrument(skip(self, new), fields(product_id = %new.product_id))]
    pub async fn add_item(&self, user_id: UserId, new: NewCartItem) -> Result<CartItem> {
        Self::check_quantity(new.quantity)?;
        require_filled("size", &new.size)?;
        require_filled("color", &new.color)?;

        let item = self.store.add_cart_item(user_id, new).await?;
        metrics::counter!("cart_items_added").increment(1);
        Ok(item)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<CartItem> {
        Self::check_quantity(quantity)?;
        Ok(self.store.update_cart_item(user_id, item_id, quantity).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_item(&self, user_id: UserId, item_id: CartItemId) -> Result<()> {
        Ok(self.store.remove_cart_item(user_id, item_id).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, user_id: UserId) -> Result<()> {
        Ok(self.store.clear_cart(user_id).await?)
    }

    fn check_quantity(quantity: u32) -> Result<()> {
        if quantity == 0 || quantity > MAX_LINE_QUANTITY {
            return Err(DomainError::validation(format!(
                "quantity must be between 1 and {MAX_LINE_QUANTITY}"
            )));
        }
        Ok(())
    }
}
