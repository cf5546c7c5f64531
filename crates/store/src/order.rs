//! Order entities: immutable priced snapshots created at checkout.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

macro_rules! fmt_as_str {
    () => {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.as_str())
        }
    };
}

/// Fulfillment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// Returns the wire/storage form of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    /// Parses the storage form of the status.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "confirmed" => Some(OrderStatus::Confirmed),
            "processing" => Some(OrderStatus::Processing),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            "refunded" => Some(OrderStatus::Refunded),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fmt_as_str!();
}

/// Payment status of an order. Payment confirmation arrives as a later
/// operator update, never as part of the checkout transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// Returns the wire/storage form of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    /// Parses the storage form of the status.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "paid" => Some(PaymentStatus::Paid),
            "failed" => Some(PaymentStatus::Failed),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fmt_as_str!();
}

/// Shipping address captured at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub phone: Option<String>,
}

/// An order created at checkout.
///
/// Immutable except for the operator-controlled fields named by
/// [`OrderUpdate`] and the shipped/delivered timestamps they imply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    /// Human-facing unique identifier, distinct from the internal id.
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub subtotal: Money,
    pub tax_amount: Money,
    pub shipping_amount: Money,
    pub discount_amount: Money,
    pub total_amount: Money,
    pub shipping: ShippingAddress,
    pub payment_method: Option<String>,
    pub payment_transaction_id: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// One line of an order: a snapshot of a cart line at checkout time.
/// The unit price is copied, not referenced, so later catalog price changes
/// never alter historical orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub size: String,
    pub color: String,
    pub unit_price: Money,
    pub total_price: Money,
}

/// Caller-supplied checkout fields; everything else on the order is computed.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub shipping: ShippingAddress,
    pub payment_method: Option<String>,
    pub payment_transaction_id: Option<String>,
}

/// An order together with its line snapshots, as returned by checkout.
#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Explicit per-field operator update; `None` leaves a field untouched.
///
/// No transition-legality matrix is enforced: any status may follow any
/// other, matching the current product behavior.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderUpdate {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
}

impl OrderUpdate {
    /// Applies the update in place.
    ///
    /// Transitioning to `shipped` or `delivered` stamps the matching
    /// timestamp only if it is not already set, so a repeated transition
    /// never overwrites the original time.
    pub fn apply(&self, order: &mut Order, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            order.status = status;
            if status == OrderStatus::Shipped && order.shipped_at.is_none() {
                order.shipped_at = Some(now);
            }
            if status == OrderStatus::Delivered && order.delivered_at.is_none() {
                order.delivered_at = Some(now);
            }
        }
        if let Some(payment_status) = self.payment_status {
            order.payment_status = payment_status;
        }
        if let Some(ref tracking_number) = self.tracking_number {
            order.tracking_number = Some(tracking_number.clone());
        }
        if let Some(ref notes) = self.notes {
            order.notes = Some(notes.clone());
        }
        order.updated_at = Some(now);
    }
}
