//! QR pickup scanner
//!
//! Two steps: a scan only looks the order up, and staff confirm the handover
//! separately. While one scan is being handled every other scan is dropped,
//! and the same code is never sent twice in a row.
//!
//! ```text
//! Ready ──scan──▶ Processing ──valid──▶ ShowingOrder ──confirm──▶ Completed
//!   ▲                 │   └──picked up──▶ AlreadyPickedUp            │
//!   └──── invalid ────┘                       │                      │
//!   └───────────────────── acknowledge ───────┴──────────────────────┘
//! ```

use super::{CheckoutError, CheckoutResult, OrderEvent, OrderEvents, bounded};
use crate::service::{OrderService, PickupConfirmation, QrVerification};
use parking_lot::Mutex;
use shared::error::{AppError, ErrorCode};
use shared::models::{Order, OrderStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum ScannerState {
    /// Accepting scans
    Ready,
    /// A backend call is in flight
    Processing,
    /// Verified order awaiting staff confirmation
    ShowingOrder { code: String, order: Order },
    /// The order was handed over earlier
    AlreadyPickedUp { message: String },
    Completed { order: Order },
}

/// What a scan event led to
#[derive(Debug, Clone, PartialEq)]
pub enum ScanResult {
    /// Dropped: busy, or the same code as the previous scan
    Ignored,
    ShowingOrder(Order),
    AlreadyPickedUp { message: String },
    /// Back to `Ready`
    Invalid { message: String },
}

#[derive(Debug)]
struct Inner {
    state: ScannerState,
    last_code: Option<String>,
}

pub struct PickupScanner {
    service: Arc<dyn OrderService>,
    inner: Mutex<Inner>,
    events: OrderEvents,
    request_timeout: Duration,
}

impl PickupScanner {
    pub fn new(service: Arc<dyn OrderService>, request_timeout: Duration) -> Self {
        Self {
            service,
            inner: Mutex::new(Inner {
                state: ScannerState::Ready,
                last_code: None,
            }),
            events: OrderEvents::new(),
            request_timeout,
        }
    }

    pub fn with_events(mut self, events: OrderEvents) -> Self {
        self.events = events;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> ScannerState {
        self.inner.lock().state.clone()
    }

    /// Whether the camera should be delivering scans
    pub fn is_scanning(&self) -> bool {
        self.inner.lock().state == ScannerState::Ready
    }

    /// Handle one scan event
    #[instrument(skip(self, code))]
    pub async fn scan(&self, code: &str) -> CheckoutResult<ScanResult> {
        {
            let mut inner = self.inner.lock();
            if inner.state != ScannerState::Ready {
                debug!("Scan dropped, scanner busy");
                return Ok(ScanResult::Ignored);
            }
            if inner.last_code.as_deref() == Some(code) {
                debug!("Scan dropped, same code as previous scan");
                return Ok(ScanResult::Ignored);
            }
            inner.state = ScannerState::Processing;
            inner.last_code = Some(code.to_string());
        }

        let verification = bounded(self.request_timeout, self.service.verify_qr(code)).await;

        let mut inner = self.inner.lock();
        match verification {
            Ok(QrVerification::Valid(order)) if order.status == OrderStatus::Completed => {
                let message = format!("Order {} was already picked up", order.order_id);
                info!(order_id = %order.order_id, "Scanned order already completed");
                inner.state = ScannerState::AlreadyPickedUp {
                    message: message.clone(),
                };
                Ok(ScanResult::AlreadyPickedUp { message })
            }
            Ok(QrVerification::Valid(order)) => {
                info!(order_id = %order.order_id, "QR verified");
                inner.state = ScannerState::ShowingOrder {
                    code: code.to_string(),
                    order: order.clone(),
                };
                Ok(ScanResult::ShowingOrder(order))
            }
            Ok(QrVerification::AlreadyPickedUp { message }) => {
                info!(%message, "QR belongs to a collected order");
                inner.state = ScannerState::AlreadyPickedUp {
                    message: message.clone(),
                };
                Ok(ScanResult::AlreadyPickedUp { message })
            }
            Ok(QrVerification::Invalid { message }) => {
                warn!(%message, "Invalid QR scanned");
                inner.state = ScannerState::Ready;
                Ok(ScanResult::Invalid { message })
            }
            Err(e) => {
                warn!(error = %e, "QR verification failed");
                inner.state = ScannerState::Ready;
                inner.last_code = None;
                Err(e.into())
            }
        }
    }

    /// Confirm the handover of the order currently shown
    #[instrument(skip(self))]
    pub async fn complete_pickup(&self) -> CheckoutResult<PickupConfirmation> {
        let (code, order) = {
            let mut inner = self.inner.lock();
            let shown = match &inner.state {
                ScannerState::ShowingOrder { code, order }
                    if order.status != OrderStatus::Completed =>
                {
                    Some((code.clone(), order.clone()))
                }
                _ => None,
            };
            let Some(shown) = shown else {
                return Err(CheckoutError::App(AppError::with_message(
                    ErrorCode::InvalidRequest,
                    "no verified order is awaiting pickup",
                )));
            };
            inner.state = ScannerState::Processing;
            shown
        };

        let confirmation =
            bounded(self.request_timeout, self.service.complete_pickup(&code)).await;

        let mut inner = self.inner.lock();
        match confirmation {
            Ok(PickupConfirmation::Completed(done)) => {
                info!(order_id = %done.order_id, "Pickup completed");
                inner.state = ScannerState::Completed {
                    order: done.clone(),
                };
                self.events.emit(OrderEvent::PickupCompleted {
                    order_id: done.id.clone(),
                });
                Ok(PickupConfirmation::Completed(done))
            }
            Ok(PickupConfirmation::AlreadyPickedUp { message }) => {
                info!(order_id = %order.order_id, %message, "Pickup already completed");
                inner.state = ScannerState::AlreadyPickedUp {
                    message: message.clone(),
                };
                Ok(PickupConfirmation::AlreadyPickedUp { message })
            }
            Err(e) => {
                warn!(order_id = %order.order_id, error = %e, "Pickup confirmation failed");
                inner.state = ScannerState::ShowingOrder { code, order };
                Err(e.into())
            }
        }
    }

    /// Dismiss the current result and resume scanning
    pub fn acknowledge(&self) {
        let mut inner = self.inner.lock();
        inner.state = ScannerState::Ready;
        inner.last_code = None;
    }
}
