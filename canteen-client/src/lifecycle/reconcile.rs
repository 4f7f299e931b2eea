//! Recovery of captured payments the backend never confirmed
//!
//! Walks the local submission log and re-submits verification for orders
//! that are still waiting on payment. Run on app start or when the user asks;
//! one pass per call.

use super::{Verification, bounded, verify_with_retry};
use crate::config::{ClientConfig, RetryPolicy};
use crate::service::OrderService;
use crate::submission_log::SubmissionLog;
use shared::error::AppResult;
use shared::models::{LocalPaymentSubmission, PaymentStatus, VerifyPaymentRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileStatus {
    /// Backend already has the payment
    AlreadySettled,
    /// Re-verification succeeded in this pass
    Verified,
    /// Backend refuses the payment; needs support
    Rejected,
    /// Backend could not be reached; try again later
    Unreachable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub local_id: String,
    pub order_id: String,
    pub provider_payment_id: String,
    pub status: ReconcileStatus,
}

pub struct Reconciler {
    service: Arc<dyn OrderService>,
    verify_retry: RetryPolicy,
    request_timeout: Duration,
}

impl Reconciler {
    pub fn new(service: Arc<dyn OrderService>, config: &ClientConfig) -> Self {
        Self {
            service,
            verify_retry: config.verify_retry,
            request_timeout: config.request_timeout(),
        }
    }

    /// One pass over the log, oldest submission first
    #[instrument(skip(self, log), fields(path = %log.path().display()))]
    pub async fn reconcile(&self, log: &SubmissionLog) -> AppResult<Vec<ReconcileReport>> {
        let submissions = log.load_all()?;
        let mut reports = Vec::with_capacity(submissions.len());

        for submission in &submissions {
            let status = self.reconcile_one(submission).await;
            reports.push(ReconcileReport {
                local_id: submission.local_id.clone(),
                order_id: submission.order.order_id.clone(),
                provider_payment_id: submission.provider_payment().provider_payment_id.clone(),
                status,
            });
        }

        info!(
            submissions = reports.len(),
            verified = reports
                .iter()
                .filter(|r| r.status == ReconcileStatus::Verified)
                .count(),
            "Reconciliation pass finished"
        );
        Ok(reports)
    }

    async fn reconcile_one(&self, submission: &LocalPaymentSubmission) -> ReconcileStatus {
        let order = match bounded(
            self.request_timeout,
            self.service.get_order(&submission.order.id),
        )
        .await
        {
            Ok(order) => order,
            Err(e) => {
                warn!(local_id = %submission.local_id, error = %e, "Cannot fetch order for reconciliation");
                return ReconcileStatus::Unreachable;
            }
        };

        match order.payment_status {
            PaymentStatus::Success => return ReconcileStatus::AlreadySettled,
            PaymentStatus::Failed => {
                warn!(
                    local_id = %submission.local_id,
                    order_id = %order.order_id,
                    "Backend marks a captured payment as failed"
                );
                return ReconcileStatus::Rejected;
            }
            PaymentStatus::Pending => {}
        }

        let request = VerifyPaymentRequest::from(submission.provider_payment());
        match verify_with_retry(
            self.service.as_ref(),
            &request,
            self.verify_retry,
            self.request_timeout,
        )
        .await
        {
            Verification::Confirmed(paid) => {
                info!(local_id = %submission.local_id, order_id = %paid.order_id, "Payment reconciled");
                ReconcileStatus::Verified
            }
            Verification::Rejected { message, .. } => {
                warn!(local_id = %submission.local_id, %message, "Payment rejected on reconciliation");
                ReconcileStatus::Rejected
            }
            Verification::Unconfirmed(e) => {
                warn!(local_id = %submission.local_id, error = %e, "Backend unreachable");
                ReconcileStatus::Unreachable
            }
        }
    }
}
