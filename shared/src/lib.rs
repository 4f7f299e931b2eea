//! Shared types for the canteen ordering client
//!
//! Domain models, money arithmetic, error codes and the backend response
//! envelope. Nothing in here performs I/O.

pub mod error;
pub mod models;
pub mod money;
pub mod response;

// Re-exports
pub use error::{AppError, AppResult, ErrorCode};
pub use response::ApiResponse;
pub use serde::{Deserialize, Serialize};
