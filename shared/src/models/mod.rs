//! Data models
//!
//! Shared between the order service client and the UI layer.
//! Ids are backend strings; money is `rust_decimal::Decimal`.

pub mod canteen;
pub mod cart;
pub mod menu_item;
pub mod order;
pub mod payment;
pub mod submission;

// Re-exports
pub use canteen::*;
pub use cart::*;
pub use menu_item::*;
pub use order::*;
pub use payment::*;
pub use submission::*;
