//! Inverts a target margin into the sell price that achieves it

use crate::core::error::PricingError;
use crate::core::money::{round_amount, round_percent};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPriceResult {
    pub required_sell_net: Decimal,
    pub resolved_buy_net: Decimal,
    pub target_margin_percent: Decimal,
}

impl TargetPriceResult {
    pub fn rounded(&self) -> Self {
        TargetPriceResult {
            required_sell_net: round_amount(self.required_sell_net),
            resolved_buy_net: round_amount(self.resolved_buy_net),
            target_margin_percent: round_percent(self.target_margin_percent),
        }
    }
}

/// Rejects margins outside `[0, 100)`; 100% would need an infinite price.
pub fn check_margin(target_margin_percent: Decimal) -> Result<(), PricingError> {
    if target_margin_percent < Decimal::ZERO || target_margin_percent >= Decimal::ONE_HUNDRED {
        return Err(PricingError::InvalidMargin(target_margin_percent));
    }
    Ok(())
}

/// `buy / (1 - margin/100)`, computed as `buy * 100 / (100 - margin)`.
pub fn solve(buy_net: Decimal, target_margin_percent: Decimal) -> Result<TargetPriceResult, PricingError> {
    check_margin(target_margin_percent)?;
    if buy_net <= Decimal::ZERO {
        return Err(PricingError::InvalidCost(buy_net));
    }

    let required_sell_net = buy_net
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED - target_margin_percent))
        .ok_or(PricingError::Overflow("required sell price"))?;
    Ok(TargetPriceResult {
        required_sell_net,
        resolved_buy_net: buy_net,
        target_margin_percent,
    })
}
