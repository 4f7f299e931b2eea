//! Bridge from a callback-style provider SDK to an awaited outcome

use super::{CheckoutOptions, CheckoutRequest, PaymentGateway};
use async_trait::async_trait;
use shared::models::{PaymentMetadata, PaymentOutcome, ProviderPayment};
use std::collections::BTreeMap;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Keys of the provider's success map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFieldKeys {
    pub payment_id: String,
    pub order_id: String,
    pub signature: String,
}

impl Default for ProviderFieldKeys {
    fn default() -> Self {
        Self {
            payment_id: "razorpay_payment_id".to_string(),
            order_id: "razorpay_order_id".to_string(),
            signature: "razorpay_signature".to_string(),
        }
    }
}

impl ProviderFieldKeys {
    /// Read the success map verbatim; a missing required key is a failure
    pub fn parse(&self, raw: BTreeMap<String, String>) -> PaymentOutcome {
        let field = |key: &str| raw.get(key).filter(|v| !v.is_empty()).cloned();

        let (Some(provider_payment_id), Some(provider_order_id), Some(provider_signature)) = (
            field(&self.payment_id),
            field(&self.order_id),
            field(&self.signature),
        ) else {
            let missing = [&self.payment_id, &self.order_id, &self.signature]
                .into_iter()
                .find(|k| field(k).is_none())
                .cloned()
                .unwrap_or_default();
            return PaymentOutcome::failure(format!("provider response missing {}", missing));
        };

        let metadata = PaymentMetadata {
            email: field("email"),
            contact: field("contact"),
            method: field("method"),
            instrument_id: field("instrument_id"),
        };

        PaymentOutcome::Success(ProviderPayment {
            provider_order_id,
            provider_payment_id,
            provider_signature,
            metadata,
            raw_fields: raw,
        })
    }
}

enum SdkReport {
    Success(BTreeMap<String, String>),
    Failure {
        code: Option<String>,
        description: String,
    },
    Dismissed,
}

/// Single-use callback handle given to the SDK.
///
/// Every method consumes the handle, so at most one report is delivered.
/// Dropping it without reporting ends the checkout as a failure.
pub struct CheckoutCallbacks {
    tx: oneshot::Sender<SdkReport>,
}

impl CheckoutCallbacks {
    /// Provider captured the payment; `fields` exactly as returned
    pub fn success(self, fields: BTreeMap<String, String>) {
        let _ = self.tx.send(SdkReport::Success(fields));
    }

    /// Provider reported an error
    pub fn failure(self, code: Option<String>, description: impl Into<String>) {
        let _ = self.tx.send(SdkReport::Failure {
            code,
            description: description.into(),
        });
    }

    /// User closed the checkout
    pub fn dismiss(self) {
        let _ = self.tx.send(SdkReport::Dismissed);
    }
}

/// Callback-style provider checkout
///
/// `open` may return immediately; the SDK reports later, from any thread,
/// through `callbacks`.
pub trait CheckoutSdk: Send + Sync {
    fn open(&self, options: CheckoutOptions, callbacks: CheckoutCallbacks);
}

/// `PaymentGateway` over a callback-style SDK
pub struct SdkGateway<S> {
    sdk: S,
    keys: ProviderFieldKeys,
}

impl<S: CheckoutSdk> SdkGateway<S> {
    pub fn new(sdk: S) -> Self {
        Self {
            sdk,
            keys: ProviderFieldKeys::default(),
        }
    }

    pub fn with_field_keys(mut self, keys: ProviderFieldKeys) -> Self {
        self.keys = keys;
        self
    }
}

#[async_trait]
impl<S: CheckoutSdk> PaymentGateway for SdkGateway<S> {
    async fn open(&self, request: CheckoutRequest) -> PaymentOutcome {
        let (tx, rx) = oneshot::channel();
        let expected_order = request.session.provider_order_id.clone();
        debug!(provider_order_id = %expected_order, "Opening provider checkout");

        self.sdk.open(request.options(), CheckoutCallbacks { tx });

        match rx.await {
            Ok(SdkReport::Success(fields)) => {
                let outcome = self.keys.parse(fields);
                // Kept as a success; the controller records and verifies it
                if let PaymentOutcome::Success(payment) = &outcome {
                    if payment.provider_order_id != expected_order {
                        warn!(
                            provider_order_id = %payment.provider_order_id,
                            expected = %expected_order,
                            "Provider reported a payment for a different session"
                        );
                    }
                }
                outcome
            }
            Ok(SdkReport::Failure { code, description }) => PaymentOutcome::Failure {
                reason: description,
                code,
            },
            Ok(SdkReport::Dismissed) => PaymentOutcome::Cancelled,
            Err(_) => PaymentOutcome::failure("checkout closed without a result"),
        }
    }
}
