//! Payment Gateway Adapter
//!
//! The provider's checkout is a black box that reports back exactly once.
//! `PaymentGateway::open` turns that report into a single awaited
//! `PaymentOutcome`; the controller never sees provider callbacks.

mod sdk;

pub use sdk::{CheckoutCallbacks, CheckoutSdk, ProviderFieldKeys, SdkGateway};

use async_trait::async_trait;
use serde::Serialize;
use shared::models::{PaymentOutcome, PaymentSession};
use std::collections::BTreeMap;

/// Payer details shown pre-filled in the provider UI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Prefill {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

/// Everything needed to open a checkout for one payment attempt
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    /// Server-issued session; the only source of the amount
    pub session: PaymentSession,
    /// Business-facing order number, passed to the provider as a note
    pub order_id: String,
    /// Merchant name shown in the provider UI
    pub merchant_name: String,
    pub description: String,
    pub prefill: Prefill,
}

impl CheckoutRequest {
    pub fn new(session: PaymentSession, order_id: impl Into<String>) -> Self {
        let order_id = order_id.into();
        Self {
            description: format!("Order {}", order_id),
            session,
            order_id,
            merchant_name: "Campus Canteen".to_string(),
            prefill: Prefill::default(),
        }
    }

    pub fn with_merchant_name(mut self, name: impl Into<String>) -> Self {
        self.merchant_name = name.into();
        self
    }

    pub fn with_prefill(mut self, prefill: Prefill) -> Self {
        self.prefill = prefill;
        self
    }

    /// Options handed to the provider SDK
    pub fn options(&self) -> CheckoutOptions {
        CheckoutOptions {
            key: self.session.provider_key_id.clone(),
            amount: self.session.amount_minor_units,
            currency: self.session.currency.clone(),
            name: self.merchant_name.clone(),
            description: self.description.clone(),
            order_id: self.session.provider_order_id.clone(),
            prefill: self.prefill.clone(),
            notes: BTreeMap::from([("order_id".to_string(), self.order_id.clone())]),
        }
    }
}

/// Provider checkout options, built only from the server-issued session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutOptions {
    /// Publishable provider key
    pub key: String,
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    pub name: String,
    pub description: String,
    /// Provider order id
    pub order_id: String,
    pub prefill: Prefill,
    pub notes: BTreeMap<String, String>,
}

/// Collects one payment from the provider
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Present the provider checkout and wait for its single outcome
    async fn open(&self, request: CheckoutRequest) -> PaymentOutcome;
}
