//! Menu Item Model

use crate::error::{AppError, AppResult, ErrorCode};
use crate::money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Menu item offered by a canteen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    /// Unit price in currency unit
    pub price: Decimal,
    /// Units left in stock
    #[serde(default, alias = "quantity")]
    pub available_quantity: u32,
    /// Owner availability toggle
    #[serde(default = "default_true")]
    pub is_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canteen_id: Option<String>,
}

fn default_true() -> bool {
    true
}

impl MenuItem {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        price: Decimal,
        available_quantity: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            available_quantity,
            is_available: true,
            category: None,
            canteen_id: None,
        }
    }

    /// Whether the item can be put into a cart right now
    pub fn is_orderable(&self) -> bool {
        self.is_available && self.available_quantity > 0
    }

    /// Check that `quantity` units can be ordered
    pub fn ensure_orderable(&self, quantity: u32) -> AppResult<()> {
        money::validate_price(self.price, "price")?;
        if !self.is_orderable() {
            return Err(AppError::with_message(
                ErrorCode::MenuItemUnavailable,
                format!("{} is not available", self.name),
            )
            .with_detail("menu_item_id", self.id.clone()));
        }
        if quantity > self.available_quantity {
            return Err(AppError::with_message(
                ErrorCode::InsufficientStock,
                format!(
                    "Only {} of {} left, requested {}",
                    self.available_quantity, self.name, quantity
                ),
            )
            .with_detail("menu_item_id", self.id.clone())
            .with_detail("available", self.available_quantity));
        }
        if quantity > money::MAX_QUANTITY {
            return Err(AppError::with_message(
                ErrorCode::ValueOutOfRange,
                format!(
                    "quantity exceeds maximum allowed ({}), got {}",
                    money::MAX_QUANTITY,
                    quantity
                ),
            ));
        }
        Ok(())
    }
}
