//! Cart Model
//!
//! Session-scoped working buffer. Lines keep insertion order and there is at
//! most one line per menu item id; a quantity of zero removes the line.

use super::menu_item::MenuItem;
use super::order::OrderLineRequest;
use crate::error::{AppError, AppResult, ErrorCode};
use crate::money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One line in the cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub item: MenuItem,
    /// Always >= 1
    pub quantity: u32,
}

impl CartLine {
    pub fn subtotal(&self) -> Decimal {
        money::line_subtotal(self.item.price, self.quantity)
    }
}

/// Cart of menu items
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `quantity` units of `item`, merging with an existing line.
    ///
    /// The stored line picks up the latest menu snapshot (price, stock).
    pub fn add_item(&mut self, item: &MenuItem, quantity: u32) -> AppResult<()> {
        if quantity == 0 {
            return Err(AppError::validation("quantity must be positive, got 0"));
        }

        match self.position(&item.id) {
            Some(idx) => {
                let wanted = self.lines[idx].quantity.saturating_add(quantity);
                item.ensure_orderable(wanted)?;
                let line = &mut self.lines[idx];
                line.item = item.clone();
                line.quantity = wanted;
            }
            None => {
                item.ensure_orderable(quantity)?;
                self.lines.push(CartLine {
                    item: item.clone(),
                    quantity,
                });
            }
        }
        Ok(())
    }

    /// Remove the line for `menu_item_id`
    pub fn remove_item(&mut self, menu_item_id: &str) -> AppResult<CartLine> {
        let idx = self
            .position(menu_item_id)
            .ok_or_else(|| cart_item_not_found(menu_item_id))?;
        Ok(self.lines.remove(idx))
    }

    /// Set the quantity of an existing line; zero removes it
    pub fn update_quantity(&mut self, menu_item_id: &str, quantity: u32) -> AppResult<()> {
        let idx = self
            .position(menu_item_id)
            .ok_or_else(|| cart_item_not_found(menu_item_id))?;

        if quantity == 0 {
            self.lines.remove(idx);
            return Ok(());
        }

        self.lines[idx].item.ensure_orderable(quantity)?;
        self.lines[idx].quantity = quantity;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn get(&self, menu_item_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.item.id == menu_item_id)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Σ unit price × quantity
    pub fn total_amount(&self) -> Decimal {
        money::sum_lines(self.lines.iter().map(|l| (l.item.price, l.quantity)))
    }

    /// Σ quantity
    pub fn total_items(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Order-line requests for checkout. Prices stay out: the server prices the order.
    pub fn to_order_lines(&self) -> Vec<OrderLineRequest> {
        self.lines
            .iter()
            .map(|l| OrderLineRequest {
                menu_item_id: l.item.id.clone(),
                quantity: l.quantity,
            })
            .collect()
    }

    fn position(&self, menu_item_id: &str) -> Option<usize> {
        self.lines.iter().position(|l| l.item.id == menu_item_id)
    }
}

fn cart_item_not_found(menu_item_id: &str) -> AppError {
    AppError::new(ErrorCode::CartItemNotFound).with_detail("menu_item_id", menu_item_id)
}
