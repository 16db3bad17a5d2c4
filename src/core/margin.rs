//! Margin and markup arithmetic

use crate::core::error::PricingError;
use crate::core::money::{round_amount, round_percent};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Profitability of selling at `sell_net` something bought at `buy_net`.
///
/// Margin is relative to the sell price, markup to the cost. A negative
/// profit is a loss, which is a regular result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginResult {
    pub sell_net: Decimal,
    pub buy_net: Decimal,
    pub profit: Decimal,
    pub margin_percent: Decimal,
    pub markup_percent: Decimal,
}

impl MarginResult {
    /// Result used when either price is missing or non-positive.
    pub const fn zero() -> Self {
        MarginResult {
            sell_net: Decimal::ZERO,
            buy_net: Decimal::ZERO,
            profit: Decimal::ZERO,
            margin_percent: Decimal::ZERO,
            markup_percent: Decimal::ZERO,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    pub fn is_loss(&self) -> bool {
        self.profit.is_sign_negative() && !self.profit.is_zero()
    }

    pub fn meets_minimum(&self, minimum_margin_percent: Decimal) -> bool {
        self.margin_percent >= minimum_margin_percent
    }

    /// Boundary representation: amounts to 2 decimals, percentages to 1.
    pub fn rounded(&self) -> Self {
        MarginResult {
            sell_net: round_amount(self.sell_net),
            buy_net: round_amount(self.buy_net),
            profit: round_amount(self.profit),
            margin_percent: round_percent(self.margin_percent),
            markup_percent: round_percent(self.markup_percent),
        }
    }
}

/// Computes profit, margin and markup at full precision.
///
/// Non-positive inputs are tolerated and yield [`MarginResult::zero`], since
/// live input is frequently incomplete while a price is being typed in.
/// Amounts too large (or too small) for `Decimal` are an error, never a panic.
pub fn calculate(sell_net: Decimal, buy_net: Decimal) -> Result<MarginResult, PricingError> {
    if sell_net <= Decimal::ZERO || buy_net <= Decimal::ZERO {
        return Ok(MarginResult::zero());
    }

    let profit = sell_net
        .checked_sub(buy_net)
        .ok_or(PricingError::Overflow("profit"))?;
    Ok(MarginResult {
        sell_net,
        buy_net,
        profit,
        margin_percent: percent_of(profit, sell_net).ok_or(PricingError::Overflow("margin"))?,
        markup_percent: percent_of(profit, buy_net).ok_or(PricingError::Overflow("markup"))?,
    })
}

fn percent_of(part: Decimal, whole: Decimal) -> Option<Decimal> {
    part.checked_mul(Decimal::ONE_HUNDRED)?.checked_div(whole)
}
