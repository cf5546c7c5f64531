//! Order service: checkout and order lifecycle operations.

use common::{OrderId, UserId};
use store::{
    CheckoutRequest, Order, OrderScope, OrderStatus, OrderStore, OrderUpdate, Page, PageRequest,
    PlacedOrder,
};

use crate::error::{DomainError, Result, require_filled};

/// Service for placing and managing orders.
pub struct OrderService<S> {
    store: S,
}

impl<S: OrderStore> OrderService<S> {
    /// Creates a new order service with the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Places an order from the user's cart.
    ///
    /// Validates the shipping address, then delegates to the store's atomic
    /// checkout. Totals, the order number, and the cleared cart all come
    /// from that one transaction.
    #[tracing::instrument(skip(self, request))]
    pub async fn checkout(&self, user_id: UserId, request: CheckoutRequest) -> Result<PlacedOrder> {
        require_filled("first_name", &request.shipping.first_name)?;
        require_filled("last_name", &request.shipping.last_name)?;
        require_filled("address", &request.shipping.address)?;
        require_filled("city", &request.shipping.city)?;
        require_filled("zip_code", &request.shipping.zip_code)?;
        require_filled("country", &request.shipping.country)?;

        let placed = self.store.checkout(user_id, request).await?;
        metrics::counter!("orders_placed").increment(1);
        metrics::histogram!("order_total_cents").record(placed.order.total_amount.cents() as f64);
        tracing::info!(
            order_number = %placed.order.order_number,
            total_cents = placed.order.total_amount.cents(),
            "order placed"
        );
        Ok(placed)
    }

    /// An order with its line snapshots, subject to the caller's scope.
    pub async fn get_order(&self, id: OrderId, scope: OrderScope) -> Result<PlacedOrder> {
        let order = self
            .store
            .get_order(id, scope)
            .await?
            .ok_or_else(|| DomainError::not_found("order", id))?;
        let items = self.store.order_items(order.id).await?;
        Ok(PlacedOrder { order, items })
    }

    /// Looks an order up by its human-facing number, subject to the
    /// caller's scope.
    pub async fn get_order_by_number(&self, number: &str, scope: OrderScope) -> Result<PlacedOrder> {
        let order = self
            .store
            .get_order_by_number(number, scope)
            .await?
            .ok_or_else(|| DomainError::not_found("order", number))?;
        let items = self.store.order_items(order.id).await?;
        Ok(PlacedOrder { order, items })
    }

    pub async fn list_orders(&self, user_id: UserId, page: PageRequest) -> Result<Page<Order>> {
        Ok(self.store.list_orders(user_id, page).await?)
    }

    pub async fn list_all_orders(
        &self,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<Page<Order>> {
        Ok(self.store.list_all_orders(status, page).await?)
    }

    #[tracing::instrument(skip(self, update))]
    pub async fn update_order(&self, id: OrderId, update: OrderUpdate) -> Result<Order> {
        let order = self.store.update_order(id, update).await?;
        metrics::counter!("orders_updated").increment(1);
        Ok(order)
    }
}
