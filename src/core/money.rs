//! Decimal helpers for amounts and percentages.
//!
//! Computations keep full `Decimal` precision. The helpers here are only
//! used when a result leaves the core, so chained computations (batches,
//! target price inversion) never accumulate rounding error.

use crate::core::error::PricingError;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Decimal places of a money amount at the boundary.
pub const AMOUNT_SCALE: u32 = 2;

/// Decimal places of a margin or markup percentage at the boundary.
pub const PERCENT_SCALE: u32 = 1;

/// Rounds an amount to a fixed two-decimal representation.
pub fn round_amount(value: Decimal) -> Decimal {
    fixed_scale(value, AMOUNT_SCALE)
}

/// Rounds a percentage to a fixed one-decimal representation.
pub fn round_percent(value: Decimal) -> Decimal {
    fixed_scale(value, PERCENT_SCALE)
}

fn fixed_scale(value: Decimal, scale: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(scale);
    if rounded.is_zero() {
        rounded.set_sign_positive(true);
    }
    rounded
}

/// Parses a decimal string received from outside the core.
///
/// Only the textual form is accepted so that no binary float ever sits
/// between the caller and the arithmetic.
pub fn parse_amount(field: &str, raw: &str) -> Result<Decimal, PricingError> {
    Decimal::from_str(raw.trim()).map_err(|_| PricingError::InvalidAmount {
        field: field.to_string(),
        value: raw.to_string(),
    })
}
