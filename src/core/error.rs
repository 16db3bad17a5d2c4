//! Typed failures callers are expected to branch on

use rust_decimal::Decimal;
use thiserror::Error;

/// Failures of the pricing operations.
///
/// A missing purchase history is not represented here: it is a normal
/// [`Lookup::NotFound`](crate::core::resolver::Lookup) outcome.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PricingError {
    #[error("Target margin must be within [0, 100), got {0}")]
    InvalidMargin(Decimal),

    #[error("Cost must be positive, got {0}")]
    InvalidCost(Decimal),

    #[error("{field} is not a decimal amount: '{value}'")]
    InvalidAmount { field: String, value: String },

    #[error("Amount out of range while computing {0}")]
    Overflow(&'static str),

    #[error("Ledger did not answer for {product_id} within {timeout_ms} ms")]
    Timeout { product_id: String, timeout_ms: u64 },

    #[error("Ledger query failed for {product_id}: {message}")]
    Ledger { product_id: String, message: String },

    #[error("Cost snapshot for {product_id} was not stored: {message}")]
    Snapshot { product_id: String, message: String },
}

impl PricingError {
    /// Timeouts may succeed when the caller asks again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PricingError::Timeout { .. })
    }
}
