//! Cart entities: a per-user mutable collection of line items.

use chrono::{DateTime, Utc};
use common::{CartId, CartItemId, ProductId, UserId};
use serde::{Deserialize, Serialize};

/// A user's cart. At most one exists per user; it is created lazily on
/// first access and survives checkout (only its lines are consumed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// One line in a cart.
///
/// The unit price is not stored here; it is derived from the referenced
/// product's current price until checkout freezes it into an order item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub size: String,
    pub color: String,
    pub added_at: DateTime<Utc>,
}

/// Fields required to add a line to a cart. Adding an already-present
/// (product, size, color) triple increments the existing line instead of
/// creating a second one.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCartItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub size: String,
    pub color: String,
}
