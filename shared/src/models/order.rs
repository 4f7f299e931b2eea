//! Order Model
//!
//! The backend owns orders; these are the client's read copies. Status moves
//! forward only:
//!
//! ```text
//! pending → paid → preparing → ready → completed
//!    └────→ cancelled
//! ```

use crate::error::{AppError, AppResult, ErrorCode};
use crate::money;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order fulfilment status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Position on the main lifecycle line; `None` for the cancelled branch
    const fn rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Paid => Some(1),
            Self::Preparing => Some(2),
            Self::Ready => Some(3),
            Self::Completed => Some(4),
            Self::Cancelled => None,
        }
    }

    /// The single next fulfilment step, if any
    pub const fn next(&self) -> Option<OrderStatus> {
        match self {
            Self::Pending => Some(Self::Paid),
            Self::Paid => Some(Self::Preparing),
            Self::Preparing => Some(Self::Ready),
            Self::Ready => Some(Self::Completed),
            Self::Completed | Self::Cancelled => None,
        }
    }

    /// Whether `next` is a legal single-step transition
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        (*self == OrderStatus::Pending && next == OrderStatus::Cancelled) || self.next() == Some(next)
    }

    /// Whether `later` can follow `self`, possibly skipping intermediate steps
    /// (a refreshed copy may have missed some transitions)
    pub fn precedes_or_equals(&self, later: OrderStatus) -> bool {
        if *self == later {
            return true;
        }
        match (self.rank(), later.rank()) {
            (Some(a), Some(b)) => a < b,
            (Some(0), None) => true,
            _ => false,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "preparing" => Ok(Self::Preparing),
            "ready" => Ok(Self::Ready),
            "completed" => Ok(Self::Completed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(AppError::with_message(
                ErrorCode::InvalidFormat,
                format!("unknown order status: {}", other),
            )),
        }
    }
}

/// Payment status of an order
///
/// Terminal once resolved for a given attempt; a retry is a new attempt that
/// may move `failed` to `success`, never away from `success`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    /// Whether `later` may replace `self` on a refreshed copy
    pub fn precedes_or_equals(&self, later: PaymentStatus) -> bool {
        match self {
            Self::Success => later == Self::Success,
            Self::Pending | Self::Failed => true,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable snapshot of a cart line taken when the order was created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub menu_item_id: String,
    pub name: String,
    /// Price in currency unit, as charged
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl OrderLineItem {
    pub fn subtotal(&self) -> Decimal {
        money::line_subtotal(self.unit_price, self.quantity)
    }
}

/// Order line sent on creation. The server looks up the price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRequest {
    pub menu_item_id: String,
    pub quantity: u32,
}

/// Order entity (client copy)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Backend persistent id
    pub id: String,
    /// Business-facing order number
    pub order_id: String,
    pub user_id: String,
    pub canteen_id: String,
    pub canteen_name: Option<String>,
    pub items: Vec<OrderLineItem>,
    /// Total amount in currency unit
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_id: Option<String>,
    qr_code: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Order {
    /// New pending order with the total derived from `items`
    pub fn new(
        id: impl Into<String>,
        order_id: impl Into<String>,
        user_id: impl Into<String>,
        canteen_id: impl Into<String>,
        items: Vec<OrderLineItem>,
    ) -> Self {
        let total_amount = money::sum_lines(items.iter().map(|i| (i.unit_price, i.quantity)));
        Self {
            id: id.into(),
            order_id: order_id.into(),
            user_id: user_id.into(),
            canteen_id: canteen_id.into(),
            canteen_name: None,
            items,
            total_amount,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_id: None,
            qr_code: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Set the status pair as reported by the backend
    pub fn with_status(mut self, status: OrderStatus, payment_status: PaymentStatus) -> Self {
        self.status = status;
        self.payment_status = payment_status;
        if payment_status != PaymentStatus::Success {
            self.qr_code = None;
        }
        self
    }

    /// Attach the pickup QR payload. Dropped unless payment succeeded.
    pub fn with_qr_code(mut self, qr_code: Option<String>) -> Self {
        self.qr_code = if self.payment_status == PaymentStatus::Success {
            qr_code
        } else {
            None
        };
        self
    }

    /// QR payload, only ever present once payment succeeded
    pub fn qr_code(&self) -> Option<&str> {
        match self.payment_status {
            PaymentStatus::Success => self.qr_code.as_deref(),
            _ => None,
        }
    }

    /// QR payload to show the customer: paid and not yet collected
    pub fn visible_qr_code(&self) -> Option<&str> {
        match self.status {
            OrderStatus::Paid | OrderStatus::Ready => self.qr_code(),
            _ => None,
        }
    }

    /// Whether a payment attempt may be started for this order
    pub fn is_awaiting_payment(&self) -> bool {
        self.status == OrderStatus::Pending && self.payment_status != PaymentStatus::Success
    }

    /// Σ line subtotals
    pub fn computed_total(&self) -> Decimal {
        money::sum_lines(self.items.iter().map(|i| (i.unit_price, i.quantity)))
    }

    /// Check `total_amount == Σ unit_price × quantity`
    pub fn verify_total(&self) -> AppResult<()> {
        let computed = self.computed_total();
        if money::round_money(self.total_amount) != computed {
            return Err(AppError::with_message(
                ErrorCode::OrderTotalMismatch,
                format!(
                    "order {} total {} does not match items total {}",
                    self.order_id, self.total_amount, computed
                ),
            )
            .with_detail("order_id", self.order_id.clone()));
        }
        Ok(())
    }

    /// Replace this copy with a fresher one from the backend.
    ///
    /// Refuses an update that would move status or payment status backwards.
    pub fn accept_update(&mut self, fresh: Order) -> AppResult<()> {
        if fresh.id != self.id {
            return Err(AppError::validation(format!(
                "order id mismatch: {} vs {}",
                self.id, fresh.id
            )));
        }
        if !self.status.precedes_or_equals(fresh.status) {
            return Err(AppError::invalid_transition(self.status, fresh.status)
                .with_detail("order_id", self.order_id.clone()));
        }
        if !self.payment_status.precedes_or_equals(fresh.payment_status) {
            return Err(AppError::with_message(
                ErrorCode::InvalidStatusTransition,
                format!(
                    "payment status cannot change from {} to {}",
                    self.payment_status, fresh.payment_status
                ),
            )
            .with_detail("order_id", self.order_id.clone()));
        }
        *self = fresh;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    fn sample_order() -> Order {
        Order::new(
            "665f",
            "ORD-1001",
            "u1",
            "c1",
            vec![
                OrderLineItem {
                    menu_item_id: "a".into(),
                    name: "Dosa".into(),
                    unit_price: Decimal::from(50),
                    quantity: 2,
                },
                OrderLineItem {
                    menu_item_id: "b".into(),
                    name: "Vada".into(),
                    unit_price: Decimal::from(30),
                    quantity: 1,
                },
            ],
        )
    }

    #[test]
    fn test_only_lifecycle_edges_are_legal() {
        let legal = [
            (OrderStatus::Pending, OrderStatus::Paid),
            (OrderStatus::Paid, OrderStatus::Preparing),
            (OrderStatus::Preparing, OrderStatus::Ready),
            (OrderStatus::Ready, OrderStatus::Completed),
            (OrderStatus::Pending, OrderStatus::Cancelled),
        ];
        for from in ALL {
            for to in ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    legal.contains(&(from, to)),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_precedes_or_equals() {
        assert!(OrderStatus::Paid.precedes_or_equals(OrderStatus::Ready));
        assert!(OrderStatus::Pending.precedes_or_equals(OrderStatus::Cancelled));
        assert!(!OrderStatus::Paid.precedes_or_equals(OrderStatus::Cancelled));
        assert!(!OrderStatus::Ready.precedes_or_equals(OrderStatus::Paid));
        assert!(!OrderStatus::Cancelled.precedes_or_equals(OrderStatus::Paid));
        assert!(PaymentStatus::Failed.precedes_or_equals(PaymentStatus::Success));
        assert!(!PaymentStatus::Success.precedes_or_equals(PaymentStatus::Failed));
    }

    #[test]
    fn test_status_serde_and_parse() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Preparing).unwrap(),
            "\"preparing\""
        );
        assert_eq!("Completed".parse::<OrderStatus>().unwrap(), OrderStatus::Completed);
        assert_eq!("canceled".parse::<OrderStatus>().unwrap(), OrderStatus::Cancelled);
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_total_is_derived_from_items() {
        let order = sample_order();
        assert_eq!(order.total_amount, Decimal::from(130));
        assert!(order.verify_total().is_ok());

        let mut tampered = order.clone();
        tampered.total_amount = Decimal::from(1);
        assert_eq!(
            tampered.verify_total().unwrap_err().code,
            ErrorCode::OrderTotalMismatch
        );
    }

    #[test]
    fn test_qr_code_requires_successful_payment() {
        let pending = sample_order().with_qr_code(Some("QR".into()));
        assert!(pending.qr_code().is_none());

        let paid = sample_order()
            .with_status(OrderStatus::Paid, PaymentStatus::Success)
            .with_qr_code(Some("QR".into()));
        assert_eq!(paid.qr_code(), Some("QR"));
        assert_eq!(paid.visible_qr_code(), Some("QR"));

        let failed = paid.clone().with_status(OrderStatus::Pending, PaymentStatus::Failed);
        assert!(failed.qr_code().is_none());

        let preparing = paid.with_status(OrderStatus::Preparing, PaymentStatus::Success);
        assert_eq!(preparing.qr_code(), Some("QR"));
        assert!(preparing.visible_qr_code().is_none());
    }

    #[test]
    fn test_accept_update_refuses_regression() {
        let mut cached = sample_order().with_status(OrderStatus::Ready, PaymentStatus::Success);
        let stale = sample_order().with_status(OrderStatus::Paid, PaymentStatus::Success);
        let err = cached.accept_update(stale).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStatusTransition);
        assert_eq!(cached.status, OrderStatus::Ready);

        let fresh = sample_order().with_status(OrderStatus::Completed, PaymentStatus::Success);
        cached.accept_update(fresh).unwrap();
        assert_eq!(cached.status, OrderStatus::Completed);
    }

    #[test]
    fn test_awaiting_payment() {
        let order = sample_order();
        assert!(order.is_awaiting_payment());
        let failed = order.clone().with_status(OrderStatus::Pending, PaymentStatus::Failed);
        assert!(failed.is_awaiting_payment());
        let paid = order.with_status(OrderStatus::Paid, PaymentStatus::Success);
        assert!(!paid.is_awaiting_payment());
    }
}
