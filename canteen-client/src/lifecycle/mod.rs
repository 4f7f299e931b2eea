//! Order Lifecycle Controller
//!
//! Customer checkout (`CheckoutController`), owner fulfilment
//! (`FulfillmentController`, `PickupScanner`) and post-crash recovery
//! (`Reconciler`). Every backend call goes through an `OrderService` and is
//! bounded by the configured request timeout.

mod checkout;
mod fulfillment;
mod pickup;
mod reconcile;

pub use checkout::{CheckoutController, CheckoutSummary};
pub use fulfillment::FulfillmentController;
pub use pickup::{PickupScanner, ScanResult, ScannerState};
pub use reconcile::{ReconcileReport, ReconcileStatus, Reconciler};

use crate::config::RetryPolicy;
use crate::service::OrderService;
use crate::{ClientError, ClientResult};
use shared::error::AppError;
use shared::models::{Order, PaymentStatus, VerifyPaymentRequest};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::warn;

const EVENT_CAPACITY: usize = 64;

/// Notification for order list views
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderEvent {
    /// An order was created or changed state
    OrdersChanged { order_id: String },
    /// Staff confirmed a pickup
    PickupCompleted { order_id: String },
}

/// Broadcast handle shared by the controllers
#[derive(Debug, Clone)]
pub struct OrderEvents {
    tx: broadcast::Sender<OrderEvent>,
}

impl OrderEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.tx.subscribe()
    }

    /// Send to current subscribers; no subscribers is fine
    pub fn emit(&self, event: OrderEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for OrderEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// Terminal result of one payment attempt
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentResult {
    /// Backend confirmed the payment; the order carries its QR code
    Paid(Order),
    /// Provider reported a failure; the order is still payable
    Failed { reason: String },
    /// User closed the provider checkout
    Cancelled,
    /// Provider took the payment but the backend refused it
    VerificationRejected { order_id: String, message: String },
    /// Provider took the payment and the backend could not be asked
    VerificationUnconfirmed { order_id: String, message: String },
}

impl PaymentResult {
    pub fn is_paid(&self) -> bool {
        matches!(self, PaymentResult::Paid(_))
    }

    /// Text for the customer
    pub fn user_message(&self) -> String {
        match self {
            PaymentResult::Paid(order) => format!("Order {} confirmed", order.order_id),
            PaymentResult::Failed { reason } => format!("Payment failed: {}", reason),
            PaymentResult::Cancelled => "Payment cancelled".to_string(),
            PaymentResult::VerificationRejected { .. } => {
                "Payment verification failed. Please check your orders.".to_string()
            }
            PaymentResult::VerificationUnconfirmed { .. } => {
                "We could not confirm your payment yet. Please check your orders.".to_string()
            }
        }
    }
}

/// Errors from lifecycle operations
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Rejected before any network call
    #[error(transparent)]
    App(#[from] AppError),

    #[error("Canteen closed: {reason}")]
    CanteenClosed { reason: String },

    #[error("A checkout is already in progress")]
    CheckoutInProgress,

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl CheckoutError {
    /// Safe to retry the same operation
    pub fn is_retryable(&self) -> bool {
        match self {
            CheckoutError::Client(e) => e.is_retryable(),
            _ => false,
        }
    }
}

pub type CheckoutResult<T> = Result<T, CheckoutError>;

/// Run `fut` with a hard deadline; elapsing counts as a retryable failure
pub(crate) async fn bounded<T, F>(timeout: Duration, fut: F) -> ClientResult<T>
where
    F: Future<Output = ClientResult<T>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| ClientError::Timeout(timeout))?
}

/// What the backend said about a captured payment
#[derive(Debug)]
pub(crate) enum Verification {
    Confirmed(Order),
    Rejected { order: Option<Order>, message: String },
    Unconfirmed(ClientError),
}

/// Errors meaning the backend evaluated the payment and refused it
fn is_rejection(err: &ClientError) -> bool {
    matches!(
        err,
        ClientError::Validation(_) | ClientError::Conflict(_) | ClientError::NotFound(_)
    )
}

/// Ask the backend to verify, retrying transport failures only
pub(crate) async fn verify_with_retry(
    service: &dyn OrderService,
    request: &VerifyPaymentRequest,
    policy: RetryPolicy,
    timeout: Duration,
) -> Verification {
    let mut attempt = 1;
    loop {
        match bounded(timeout, service.verify_payment(request)).await {
            Ok(order) if order.payment_status == PaymentStatus::Success => {
                return Verification::Confirmed(order);
            }
            Ok(order) => {
                return Verification::Rejected {
                    message: format!("backend reports payment {}", order.payment_status),
                    order: Some(order),
                };
            }
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.backoff(attempt);
                warn!(
                    provider_order_id = %request.provider_order_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Payment verification failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) if is_rejection(&e) => {
                return Verification::Rejected {
                    order: None,
                    message: e.backend_message().unwrap_or_default().to_string(),
                };
            }
            Err(e) => return Verification::Unconfirmed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_times_out() {
        let result: ClientResult<()> = bounded(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        let err = result.unwrap_err();
        assert!(matches!(err, ClientError::Timeout(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_events_without_subscribers_are_dropped() {
        let events = OrderEvents::new();
        events.emit(OrderEvent::OrdersChanged {
            order_id: "a".into(),
        });
        let mut rx = events.subscribe();
        events.emit(OrderEvent::PickupCompleted {
            order_id: "b".into(),
        });
        assert_eq!(
            rx.recv().await.unwrap(),
            OrderEvent::PickupCompleted {
                order_id: "b".into()
            }
        );
    }

    #[test]
    fn test_checkout_error_retryable() {
        assert!(CheckoutError::Client(ClientError::Internal("502".into())).is_retryable());
        assert!(!CheckoutError::CheckoutInProgress.is_retryable());
        assert!(!CheckoutError::CanteenClosed {
            reason: "Manually Closed".into()
        }
        .is_retryable());
    }
}
