//! Money calculation utilities using rust_decimal for precision
//!
//! Amounts are `Decimal` end to end. Minor units (paise) only appear at the
//! payment provider boundary.

use crate::error::{AppError, AppResult, ErrorCode};
use rust_decimal::prelude::*;

/// Rounding strategy for monetary values (2 decimal places, half-up)
pub const DECIMAL_PLACES: u32 = 2;

/// Maximum allowed unit price (₹1,000,000)
const MAX_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);
/// Maximum allowed quantity per cart line
pub const MAX_QUANTITY: u32 = 999;

/// Round to currency precision
#[inline]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Subtotal of one line: `unit_price × quantity`, rounded
#[inline]
pub fn line_subtotal(unit_price: Decimal, quantity: u32) -> Decimal {
    round_money(unit_price * Decimal::from(quantity))
}

/// Sum a sequence of `(unit_price, quantity)` pairs
pub fn sum_lines<I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = (Decimal, u32)>,
{
    lines
        .into_iter()
        .map(|(price, qty)| line_subtotal(price, qty))
        .sum()
}

/// Convert an amount to minor currency units (e.g. ₹130.50 → 13050)
pub fn to_minor_units(amount: Decimal) -> AppResult<i64> {
    round_money(amount)
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|minor| minor.to_i64())
        .ok_or_else(|| {
            AppError::with_message(
                ErrorCode::ValueOutOfRange,
                format!("amount {} does not fit in minor units", amount),
            )
        })
}

/// Convert minor currency units back to a decimal amount
#[inline]
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, DECIMAL_PLACES)
}

/// Validate a unit price: non-negative, at most 2 decimal places, bounded
pub fn validate_price(price: Decimal, field_name: &str) -> AppResult<()> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(AppError::validation(format!(
            "{} must be non-negative, got {}",
            field_name, price
        )));
    }
    if price > MAX_PRICE {
        return Err(AppError::validation(format!(
            "{} exceeds maximum allowed ({}), got {}",
            field_name, MAX_PRICE, price
        )));
    }
    if round_money(price) != price {
        return Err(AppError::validation(format!(
            "{} has more than {} decimal places: {}",
            field_name, DECIMAL_PLACES, price
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_subtotal_exact() {
        let price = Decimal::new(1099, 2);
        assert_eq!(line_subtotal(price, 3), Decimal::new(3297, 2));
    }

    #[test]
    fn test_accumulation_precision() {
        let cent = Decimal::new(1, 2);
        let total = sum_lines((0..1000).map(|_| (cent, 1)));
        assert_eq!(total, Decimal::from(10));
    }

    #[test]
    fn test_sum_lines_example_cart() {
        let total = sum_lines([(Decimal::from(50), 2), (Decimal::from(30), 1)]);
        assert_eq!(total, Decimal::from(130));
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(to_minor_units(Decimal::new(13050, 2)).unwrap(), 13050);
        assert_eq!(to_minor_units(Decimal::from(130)).unwrap(), 13000);
        assert_eq!(from_minor_units(13050), Decimal::new(13050, 2));
        assert!(to_minor_units(Decimal::MAX).is_err());
    }

    #[test]
    fn test_validate_price() {
        assert!(validate_price(Decimal::ZERO, "price").is_ok());
        assert!(validate_price(Decimal::new(4999, 2), "price").is_ok());
        assert!(validate_price(Decimal::new(-1, 0), "price").is_err());
        assert!(validate_price(Decimal::new(10001, 3), "price").is_err());
        assert!(validate_price(Decimal::from(2_000_000), "price").is_err());
    }
}
