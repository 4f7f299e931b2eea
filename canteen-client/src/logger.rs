//! Logging Infrastructure
//!
//! Console output plus optional daily rotating files:
//! - `app/` everything except payment records
//! - `payment/` events with target `"payment"` (captured, rejected and
//!   unconfirmed payments), kept for support

use std::fs;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, prelude::*};

/// Target used for payment records
pub const PAYMENT_TARGET: &str = "payment";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize logging
///
/// # Arguments
/// * `level` - Default level when `RUST_LOG` is unset (e.g. "info")
/// * `json_format` - JSON lines instead of human-readable output
/// * `log_dir` - Optional directory for rotating log files
pub fn init_logger(level: &str, json_format: bool, log_dir: Option<&Path>) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let mut layers: Vec<BoxedLayer> = Vec::new();

    // Console layer
    if json_format {
        layers.push(
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_file(true)
                .with_line_number(true)
                .boxed(),
        );
    } else {
        layers.push(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .boxed(),
        );
    }

    if let Some(dir) = log_dir {
        let app_log_dir = dir.join("app");
        let payment_log_dir = dir.join(PAYMENT_TARGET);
        fs::create_dir_all(&app_log_dir)?;
        fs::create_dir_all(&payment_log_dir)?;

        let app_log = RollingFileAppender::new(Rotation::DAILY, app_log_dir, "app");
        layers.push(
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(app_log))
                .with_filter(tracing_subscriber::filter::filter_fn(|meta| {
                    meta.target() != PAYMENT_TARGET
                }))
                .boxed(),
        );

        // Never pruned
        let payment_log = RollingFileAppender::new(Rotation::DAILY, payment_log_dir, PAYMENT_TARGET);
        layers.push(
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(payment_log))
                .with_filter(tracing_subscriber::filter::filter_fn(|meta| {
                    meta.target() == PAYMENT_TARGET
                }))
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()?;

    Ok(())
}
