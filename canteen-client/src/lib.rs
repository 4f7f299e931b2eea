//! Canteen Client - order lifecycle and payment reconciliation
//!
//! Talks to the canteen backend over HTTP, drives the provider checkout and
//! keeps a local record of every captured payment.
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! use canteen_client::{ClientConfig, HttpOrderService, SubmissionLog};
//! use std::sync::Arc;
//!
//! let config = ClientConfig::from_env()?;
//! canteen_client::logger::init_logger(&config.log_level, false, Some(&config.data_dir.join("logs")))?;
//! let service = Arc::new(HttpOrderService::new(config.build_http_client()?));
//! let log = Arc::new(SubmissionLog::new(&config.data_dir));
//! let reports = canteen_client::Reconciler::new(service, &config)
//!     .reconcile(&log)
//!     .await?;
//! # let _ = reports;
//! # Ok(())
//! # }
//! ```

pub mod availability;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod logger;
pub mod payment;
pub mod service;
pub mod submission_log;
pub mod wire;

pub use availability::Availability;
pub use config::{ClientConfig, RetryPolicy};
pub use error::{ClientError, ClientResult};
pub use http::HttpClient;
pub use lifecycle::{
    CheckoutController, CheckoutError, CheckoutResult, CheckoutSummary, FulfillmentController,
    OrderEvent, OrderEvents, PaymentResult, PickupScanner, ReconcileReport, ReconcileStatus,
    Reconciler, ScanResult, ScannerState,
};
pub use payment::{CheckoutRequest, PaymentGateway, Prefill, SdkGateway};
pub use service::{HttpOrderService, OrderService, PickupConfirmation, QrVerification};
pub use submission_log::SubmissionLog;

// Re-export shared types for convenience
pub use shared::models;
pub use shared::{AppError, AppResult, ErrorCode};
