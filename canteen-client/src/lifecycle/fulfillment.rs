//! Owner-side fulfilment

use super::{CheckoutResult, OrderEvent, OrderEvents, PickupScanner, bounded};
use crate::config::ClientConfig;
use crate::service::OrderService;
use shared::error::AppError;
use shared::models::{Order, OrderStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, instrument};

/// Order queue management for one canteen
pub struct FulfillmentController {
    service: Arc<dyn OrderService>,
    canteen_id: String,
    events: OrderEvents,
    request_timeout: Duration,
}

impl FulfillmentController {
    pub fn new(
        service: Arc<dyn OrderService>,
        canteen_id: impl Into<String>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            service,
            canteen_id: canteen_id.into(),
            events: OrderEvents::new(),
            request_timeout: config.request_timeout(),
        }
    }

    pub fn with_events(mut self, events: OrderEvents) -> Self {
        self.events = events;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.events.subscribe()
    }

    pub fn canteen_id(&self) -> &str {
        &self.canteen_id
    }

    /// Orders of this canteen, optionally filtered by status
    #[instrument(skip(self), fields(canteen_id = %self.canteen_id))]
    pub async fn list_orders(&self, status: Option<OrderStatus>) -> CheckoutResult<Vec<Order>> {
        Ok(bounded(
            self.request_timeout,
            self.service.list_canteen_orders(&self.canteen_id, status),
        )
        .await?)
    }

    /// Move an order one step along the lifecycle.
    ///
    /// `paid` is only ever reached through payment verification.
    #[instrument(skip(self, order), fields(order_id = %order.order_id, from = %order.status))]
    pub async fn advance_status(&self, order: &Order, next: OrderStatus) -> CheckoutResult<Order> {
        if next == OrderStatus::Paid || !order.status.can_transition_to(next) {
            return Err(AppError::invalid_transition(order.status, next)
                .with_detail("order_id", order.order_id.clone())
                .into());
        }

        let updated = bounded(
            self.request_timeout,
            self.service.update_order_status(&order.id, next),
        )
        .await?;
        info!(to = %updated.status, "Order status updated");
        self.events.emit(OrderEvent::OrdersChanged {
            order_id: updated.id.clone(),
        });
        Ok(updated)
    }

    /// QR pickup scanner sharing this controller's service and events
    pub fn scanner(&self) -> PickupScanner {
        PickupScanner::new(self.service.clone(), self.request_timeout).with_events(self.events.clone())
    }
}
