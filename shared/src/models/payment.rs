//! Payment Models
//!
//! Session data issued by the backend, the provider's single result, and the
//! verification request built from it.

use crate::money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Provider checkout session, priced by the backend from the stored order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSession {
    pub provider_order_id: String,
    /// Publishable provider key
    pub provider_key_id: String,
    /// Amount in minor currency units (paise)
    pub amount_minor_units: i64,
    pub currency: String,
}

impl PaymentSession {
    pub fn amount(&self) -> Decimal {
        money::from_minor_units(self.amount_minor_units)
    }
}

/// Optional payer metadata reported by the provider.
///
/// Used for the local recovery log and support only, never for verification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument_id: Option<String>,
}

/// Provider-captured payment, fields exactly as the provider returned them
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderPayment {
    pub provider_order_id: String,
    pub provider_payment_id: String,
    pub provider_signature: String,
    #[serde(default)]
    pub metadata: PaymentMetadata,
    /// Every key/value the provider returned
    #[serde(default)]
    pub raw_fields: BTreeMap<String, String>,
}

impl fmt::Debug for ProviderPayment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderPayment")
            .field("provider_order_id", &self.provider_order_id)
            .field("provider_payment_id", &self.provider_payment_id)
            .field("provider_signature", &"<redacted>")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// The one result a payment attempt produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Success(ProviderPayment),
    Failure {
        reason: String,
        /// Provider error code, if it sent one
        code: Option<String>,
    },
    Cancelled,
}

impl PaymentOutcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
            code: None,
        }
    }
}

/// Body of the verify-payment call
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    pub provider_order_id: String,
    pub provider_payment_id: String,
    pub provider_signature: String,
}

impl fmt::Debug for VerifyPaymentRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifyPaymentRequest")
            .field("provider_order_id", &self.provider_order_id)
            .field("provider_payment_id", &self.provider_payment_id)
            .finish_non_exhaustive()
    }
}

impl From<&ProviderPayment> for VerifyPaymentRequest {
    fn from(payment: &ProviderPayment) -> Self {
        Self {
            provider_order_id: payment.provider_order_id.clone(),
            provider_payment_id: payment.provider_payment_id.clone(),
            provider_signature: payment.provider_signature.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment() -> ProviderPayment {
        ProviderPayment {
            provider_order_id: "order_1".into(),
            provider_payment_id: "pay_1".into(),
            provider_signature: "sig_1".into(),
            metadata: PaymentMetadata::default(),
            raw_fields: BTreeMap::new(),
        }
    }

    #[test]
    fn test_debug_never_prints_signature() {
        let p = payment();
        assert!(!format!("{:?}", p).contains("sig_1"));
        assert!(!format!("{:?}", VerifyPaymentRequest::from(&p)).contains("sig_1"));
    }

    #[test]
    fn test_verify_request_copies_fields_verbatim() {
        let req = VerifyPaymentRequest::from(&payment());
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "providerOrderId": "order_1",
                "providerPaymentId": "pay_1",
                "providerSignature": "sig_1"
            })
        );
    }

    #[test]
    fn test_session_amount() {
        let session: PaymentSession = serde_json::from_str(
            r#"{"providerOrderId":"order_1","providerKeyId":"rzp_test","amountMinorUnits":13000,"currency":"INR"}"#,
        )
        .unwrap();
        assert_eq!(session.amount(), Decimal::from(130));
    }
}
