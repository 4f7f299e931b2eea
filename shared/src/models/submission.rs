//! Local payment submission record
//!
//! Written on the device right after the provider reports a captured payment
//! and before the backend is asked to verify it. Never synchronized.

use super::order::{Order, OrderLineItem};
use super::payment::{PaymentMetadata, PaymentSession, ProviderPayment};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Prefix for locally generated submission ids
pub const LOCAL_ID_PREFIX: &str = "local_";

/// Order as it stood when payment was captured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedOrder {
    /// Backend persistent id
    pub id: String,
    pub order_id: String,
    pub canteen_id: String,
    pub total_amount: Decimal,
    pub items: Vec<OrderLineItem>,
}

/// Provider payment fields plus the session they belong to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedPayment {
    #[serde(flatten)]
    pub provider: ProviderPayment,
    pub amount_minor_units: i64,
    pub currency: String,
}

/// Device the payment was taken on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub platform: String,
    pub app_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl DeviceInfo {
    /// Current platform and this crate's version
    pub fn current(label: Option<String>) -> Self {
        Self {
            platform: std::env::consts::OS.to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            label,
        }
    }
}

/// Append-only recovery record of a captured payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalPaymentSubmission {
    /// `local_<uuid>`, never a backend id
    pub local_id: String,
    pub order: SubmittedOrder,
    pub payment: SubmittedPayment,
    pub device: DeviceInfo,
    /// When the payment attempt started
    pub created_at: DateTime<Utc>,
    /// When the provider reported success
    pub paid_at: DateTime<Utc>,
}

impl LocalPaymentSubmission {
    pub fn new(
        order: &Order,
        session: &PaymentSession,
        payment: &ProviderPayment,
        device: DeviceInfo,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            local_id: format!("{}{}", LOCAL_ID_PREFIX, uuid::Uuid::new_v4()),
            order: SubmittedOrder {
                id: order.id.clone(),
                order_id: order.order_id.clone(),
                canteen_id: order.canteen_id.clone(),
                total_amount: order.total_amount,
                items: order.items.clone(),
            },
            payment: SubmittedPayment {
                provider: payment.clone(),
                amount_minor_units: session.amount_minor_units,
                currency: session.currency.clone(),
            },
            device,
            created_at,
            paid_at: Utc::now(),
        }
    }

    pub fn provider_payment(&self) -> &ProviderPayment {
        &self.payment.provider
    }

    pub fn metadata(&self) -> &PaymentMetadata {
        &self.payment.provider.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn submission() -> LocalPaymentSubmission {
        let order = Order::new(
            "665f",
            "ORD-1001",
            "u1",
            "c1",
            vec![OrderLineItem {
                menu_item_id: "a".into(),
                name: "Dosa".into(),
                unit_price: Decimal::from(50),
                quantity: 2,
            }],
        );
        let session = PaymentSession {
            provider_order_id: "order_1".into(),
            provider_key_id: "rzp_test".into(),
            amount_minor_units: 10000,
            currency: "INR".into(),
        };
        let payment = ProviderPayment {
            provider_order_id: "order_1".into(),
            provider_payment_id: "pay_1".into(),
            provider_signature: "sig_1".into(),
            metadata: PaymentMetadata {
                method: Some("upi".into()),
                ..Default::default()
            },
            raw_fields: BTreeMap::from([("razorpay_payment_id".into(), "pay_1".into())]),
        };
        LocalPaymentSubmission::new(&order, &session, &payment, DeviceInfo::current(None), Utc::now())
    }

    #[test]
    fn test_local_id_is_prefixed_and_unique() {
        let a = submission();
        let b = submission();
        assert!(a.local_id.starts_with(LOCAL_ID_PREFIX));
        assert_ne!(a.local_id, b.local_id);
        assert_ne!(a.local_id, a.order.id);
    }

    #[test]
    fn test_serde_keeps_signature_for_support() {
        let s = submission();
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["payment"]["provider_signature"], "sig_1");
        assert_eq!(json["payment"]["amount_minor_units"], 10000);

        let back: LocalPaymentSubmission = serde_json::from_value(json).unwrap();
        assert_eq!(back, s);
        assert_eq!(back.metadata().method.as_deref(), Some("upi"));
    }
}
