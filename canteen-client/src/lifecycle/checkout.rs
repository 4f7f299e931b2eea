//! Customer checkout: cart → order → provider → backend verification

use super::{
    CheckoutError, CheckoutResult, OrderEvent, OrderEvents, PaymentResult, Verification, bounded,
    verify_with_retry,
};
use crate::availability::{self, Availability};
use crate::config::{ClientConfig, RetryPolicy};
use crate::logger::PAYMENT_TARGET;
use crate::payment::{CheckoutRequest, PaymentGateway, Prefill};
use crate::service::OrderService;
use crate::submission_log::SubmissionLog;
use chrono::{FixedOffset, Utc};
use parking_lot::Mutex;
use shared::error::{AppError, ErrorCode};
use shared::models::{
    Canteen, Cart, CartLine, DeviceInfo, LocalPaymentSubmission, MenuItem, Order, OrderStatus,
    PaymentOutcome, PaymentSession, ProviderPayment, VerifyPaymentRequest,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, instrument, warn};

/// Created order together with how its payment ended
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSummary {
    pub order: Order,
    pub result: PaymentResult,
}

/// Clears the in-flight flag when the flow ends, including on cancellation
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> CheckoutResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self(flag))
            .map_err(|_| CheckoutError::CheckoutInProgress)
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Customer-side order lifecycle
///
/// Owns the session cart. At most one create/pay flow runs at a time.
pub struct CheckoutController {
    service: Arc<dyn OrderService>,
    gateway: Arc<dyn PaymentGateway>,
    log: Arc<SubmissionLog>,
    cart: Mutex<Cart>,
    orders: Mutex<HashMap<String, Order>>,
    in_flight: AtomicBool,
    events: OrderEvents,
    request_timeout: Duration,
    verify_retry: RetryPolicy,
    timezone: FixedOffset,
    device_label: Option<String>,
    prefill: Prefill,
}

impl CheckoutController {
    pub fn new(
        service: Arc<dyn OrderService>,
        gateway: Arc<dyn PaymentGateway>,
        log: Arc<SubmissionLog>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            service,
            gateway,
            log,
            cart: Mutex::new(Cart::new()),
            orders: Mutex::new(HashMap::new()),
            in_flight: AtomicBool::new(false),
            events: OrderEvents::new(),
            request_timeout: config.request_timeout(),
            verify_retry: config.verify_retry,
            timezone: config.canteen_timezone(),
            device_label: config.device_label.clone(),
            prefill: Prefill::default(),
        }
    }

    /// Payer details pre-filled in every provider checkout
    pub fn with_prefill(mut self, prefill: Prefill) -> Self {
        self.prefill = prefill;
        self
    }

    /// Share an event channel with other controllers
    pub fn with_events(mut self, events: OrderEvents) -> Self {
        self.events = events;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.events.subscribe()
    }

    pub fn is_processing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    // ========== Cart ==========

    /// Snapshot of the cart
    pub fn cart(&self) -> Cart {
        self.cart.lock().clone()
    }

    pub fn add_item(&self, item: &MenuItem, quantity: u32) -> CheckoutResult<()> {
        Ok(self.cart.lock().add_item(item, quantity)?)
    }

    pub fn remove_item(&self, menu_item_id: &str) -> CheckoutResult<CartLine> {
        Ok(self.cart.lock().remove_item(menu_item_id)?)
    }

    pub fn update_quantity(&self, menu_item_id: &str, quantity: u32) -> CheckoutResult<()> {
        Ok(self.cart.lock().update_quantity(menu_item_id, quantity)?)
    }

    pub fn clear_cart(&self) {
        self.cart.lock().clear();
    }

    // ========== Orders ==========

    /// Last known copy of an order this controller has seen
    pub fn cached_order(&self, id: &str) -> Option<Order> {
        self.orders.lock().get(id).cloned()
    }

    /// Create an order from the cart. The cart is kept.
    #[instrument(skip(self, canteen), fields(canteen_id = %canteen.id))]
    pub async fn create_order(&self, canteen: &Canteen) -> CheckoutResult<Order> {
        let _guard = FlightGuard::acquire(&self.in_flight)?;
        self.create_order_inner(canteen).await
    }

    /// Ask the backend for a provider session for `order`
    #[instrument(skip(self, order), fields(order_id = %order.order_id))]
    pub async fn initiate_payment(&self, order: &Order) -> CheckoutResult<PaymentSession> {
        ensure_payable(order)?;
        Ok(bounded(self.request_timeout, self.service.initiate_payment(&order.id)).await?)
    }

    /// Run one payment attempt for an existing pending order
    #[instrument(skip(self, order), fields(order_id = %order.order_id))]
    pub async fn pay(&self, order: &Order) -> CheckoutResult<PaymentResult> {
        let _guard = FlightGuard::acquire(&self.in_flight)?;
        self.pay_inner(order).await
    }

    /// Create an order and pay for it as one flow
    #[instrument(skip(self, canteen), fields(canteen_id = %canteen.id))]
    pub async fn checkout(&self, canteen: &Canteen) -> CheckoutResult<CheckoutSummary> {
        let _guard = FlightGuard::acquire(&self.in_flight)?;
        let order = self.create_order_inner(canteen).await?;
        let result = self.pay_inner(&order).await?;
        let order = match &result {
            PaymentResult::Paid(paid) => paid.clone(),
            _ => order,
        };
        Ok(CheckoutSummary { order, result })
    }

    /// Abandon an unpaid order. Refused while a create/pay flow is running.
    #[instrument(skip(self, order), fields(order_id = %order.order_id))]
    pub async fn cancel_order(&self, order: &Order) -> CheckoutResult<Order> {
        let _guard = FlightGuard::acquire(&self.in_flight)?;
        if !order.is_awaiting_payment() {
            return Err(AppError::invalid_transition(order.status, OrderStatus::Cancelled)
                .with_detail("order_id", order.order_id.clone())
                .into());
        }
        let cancelled = bounded(
            self.request_timeout,
            self.service
                .update_order_status(&order.id, OrderStatus::Cancelled),
        )
        .await?;
        info!("Order cancelled");
        Ok(self.remember(cancelled))
    }

    /// Fetch an order and merge it into the cached copy
    #[instrument(skip(self))]
    pub async fn refresh_order(&self, id: &str) -> CheckoutResult<Order> {
        let fresh = bounded(self.request_timeout, self.service.get_order(id)).await?;
        Ok(self.remember(fresh))
    }

    // ========== Internals ==========

    async fn create_order_inner(&self, canteen: &Canteen) -> CheckoutResult<Order> {
        // 1. Availability gate
        if let Availability::Closed { reason } =
            availability::check(canteen, Utc::now(), self.timezone)
        {
            info!(%reason, "Checkout blocked, canteen closed");
            return Err(CheckoutError::CanteenClosed { reason });
        }
        if canteen.id.is_empty() {
            return Err(AppError::new(ErrorCode::CanteenNotSelected).into());
        }

        // 2. Non-empty cart
        let lines = {
            let cart = self.cart.lock();
            if cart.is_empty() {
                return Err(AppError::new(ErrorCode::OrderEmpty).into());
            }
            cart.to_order_lines()
        };

        // 3. Signed in
        if !self.service.is_authenticated() {
            return Err(AppError::not_authenticated().into());
        }

        // 4. Backend creates and prices the order
        let order = bounded(
            self.request_timeout,
            self.service.create_order(&canteen.id, &lines),
        )
        .await?;
        Ok(self.remember(order))
    }

    async fn pay_inner(&self, order: &Order) -> CheckoutResult<PaymentResult> {
        // 1. Session priced by the backend
        ensure_payable(order)?;
        let started_at = Utc::now();
        let session = bounded(self.request_timeout, self.service.initiate_payment(&order.id)).await?;

        // 2. Provider checkout
        let request = CheckoutRequest::new(session.clone(), order.order_id.clone())
            .with_prefill(self.prefill.clone());
        let request = match &order.canteen_name {
            Some(name) => request.with_merchant_name(name.clone()),
            None => request,
        };
        let payment = match self.gateway.open(request).await {
            PaymentOutcome::Success(payment) => payment,
            PaymentOutcome::Failure { reason, code } => {
                warn!(%reason, code = ?code, "Provider reported payment failure");
                return Ok(PaymentResult::Failed { reason });
            }
            PaymentOutcome::Cancelled => {
                info!("Payment cancelled by user");
                return Ok(PaymentResult::Cancelled);
            }
        };

        // 3. Recovery record before verification, whatever session the provider names
        if payment.provider_order_id != session.provider_order_id {
            warn!(
                target: PAYMENT_TARGET,
                order_id = %order.order_id,
                provider_order_id = %payment.provider_order_id,
                session_order_id = %session.provider_order_id,
                "Provider captured a payment for another session"
            );
        }
        self.record_submission(order, &session, &payment, started_at);

        // 4. Backend verification is the only proof of payment
        let request = VerifyPaymentRequest::from(&payment);
        match verify_with_retry(
            self.service.as_ref(),
            &request,
            self.verify_retry,
            self.request_timeout,
        )
        .await
        {
            Verification::Confirmed(paid) => {
                {
                    let mut cart = self.cart.lock();
                    if cart_matches_order(&cart, order) {
                        cart.clear();
                    }
                }
                info!(provider_payment_id = %payment.provider_payment_id, "Payment verified");
                Ok(PaymentResult::Paid(self.remember(paid)))
            }
            Verification::Rejected { order: fresh, message } => {
                error!(
                    target: PAYMENT_TARGET,
                    order_id = %order.order_id,
                    provider_payment_id = %payment.provider_payment_id,
                    %message,
                    "Backend rejected a provider-captured payment"
                );
                if let Some(fresh) = fresh {
                    self.remember(fresh);
                }
                Ok(PaymentResult::VerificationRejected {
                    order_id: order.id.clone(),
                    message,
                })
            }
            Verification::Unconfirmed(e) => {
                error!(
                    target: PAYMENT_TARGET,
                    order_id = %order.order_id,
                    provider_payment_id = %payment.provider_payment_id,
                    error = %e,
                    "Payment captured but verification could not be completed"
                );
                Ok(PaymentResult::VerificationUnconfirmed {
                    order_id: order.id.clone(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Best effort: a storage failure never blocks the payment flow
    fn record_submission(
        &self,
        order: &Order,
        session: &PaymentSession,
        payment: &ProviderPayment,
        started_at: chrono::DateTime<Utc>,
    ) {
        let submission = LocalPaymentSubmission::new(
            order,
            session,
            payment,
            DeviceInfo::current(self.device_label.clone()),
            started_at,
        );
        if let Err(e) = self.log.append(&submission) {
            error!(
                target: PAYMENT_TARGET,
                local_id = %submission.local_id,
                provider_payment_id = %payment.provider_payment_id,
                error = %e,
                "Failed to record payment submission"
            );
        }
    }

    /// Merge into the cache without ever moving backwards, then notify
    fn remember(&self, fresh: Order) -> Order {
        let merged = {
            let mut orders = self.orders.lock();
            match orders.get_mut(&fresh.id) {
                Some(cached) => {
                    if let Err(e) = cached.accept_update(fresh) {
                        warn!(error = %e, "Ignoring stale order update");
                    }
                    cached.clone()
                }
                None => {
                    orders.insert(fresh.id.clone(), fresh.clone());
                    fresh
                }
            }
        };
        self.events.emit(OrderEvent::OrdersChanged {
            order_id: merged.id.clone(),
        });
        merged
    }
}

/// Whether the cart still holds exactly the lines `order` was created from
fn cart_matches_order(cart: &Cart, order: &Order) -> bool {
    let mut in_cart: Vec<(&str, u32)> = cart
        .lines()
        .iter()
        .map(|l| (l.item.id.as_str(), l.quantity))
        .collect();
    let mut ordered: Vec<(&str, u32)> = order
        .items
        .iter()
        .map(|l| (l.menu_item_id.as_str(), l.quantity))
        .collect();
    in_cart.sort_unstable();
    ordered.sort_unstable();
    in_cart == ordered
}

fn ensure_payable(order: &Order) -> CheckoutResult<()> {
    if order.is_awaiting_payment() {
        return Ok(());
    }
    let code = match order.status {
        OrderStatus::Cancelled => ErrorCode::OrderAlreadyCancelled,
        OrderStatus::Completed => ErrorCode::OrderAlreadyCompleted,
        _ => ErrorCode::OrderAlreadyPaid,
    };
    Err(AppError::new(code)
        .with_detail("order_id", order.order_id.clone())
        .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shared::models::{OrderLineItem, PaymentStatus};

    fn order(status: OrderStatus, payment: PaymentStatus) -> Order {
        Order::new(
            "665f",
            "ORD-1",
            "u1",
            "c1",
            vec![OrderLineItem {
                menu_item_id: "a".into(),
                name: "Dosa".into(),
                unit_price: Decimal::from(50),
                quantity: 1,
            }],
        )
        .with_status(status, payment)
    }

    #[test]
    fn test_flight_guard_is_exclusive_and_released_on_drop() {
        let flag = AtomicBool::new(false);
        let guard = FlightGuard::acquire(&flag).unwrap();
        assert!(matches!(
            FlightGuard::acquire(&flag),
            Err(CheckoutError::CheckoutInProgress)
        ));
        drop(guard);
        assert!(FlightGuard::acquire(&flag).is_ok());
    }

    #[test]
    fn test_cart_matches_order_ignores_line_order() {
        let dosa = MenuItem::new("a", "Dosa", Decimal::from(50), 20);
        let vada = MenuItem::new("b", "Vada", Decimal::from(30), 20);
        let order = order(OrderStatus::Pending, PaymentStatus::Pending);

        let mut cart = Cart::new();
        cart.add_item(&dosa, 1).unwrap();
        assert!(cart_matches_order(&cart, &order));

        cart.add_item(&vada, 1).unwrap();
        assert!(!cart_matches_order(&cart, &order));

        cart.remove_item("b").unwrap();
        cart.update_quantity("a", 2).unwrap();
        assert!(!cart_matches_order(&cart, &order));
        assert!(!cart_matches_order(&Cart::new(), &order));
    }

    #[test]
    fn test_ensure_payable() {
        assert!(ensure_payable(&order(OrderStatus::Pending, PaymentStatus::Pending)).is_ok());
        assert!(ensure_payable(&order(OrderStatus::Pending, PaymentStatus::Failed)).is_ok());

        let err = ensure_payable(&order(OrderStatus::Paid, PaymentStatus::Success)).unwrap_err();
        assert!(matches!(err, CheckoutError::App(e) if e.code == ErrorCode::OrderAlreadyPaid));

        let err =
            ensure_payable(&order(OrderStatus::Cancelled, PaymentStatus::Pending)).unwrap_err();
        assert!(matches!(err, CheckoutError::App(e) if e.code == ErrorCode::OrderAlreadyCancelled));
    }
}
