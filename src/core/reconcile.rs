//! Compares the margin obtained from a captured cost with the one obtained
//! from a fresh ledger lookup.
//!
//! The report is diagnostic only. Drift between the two paths is surfaced as
//! [`ValidationStatus::DivergenceWarning`]; nothing is corrected.

use crate::core::error::PricingError;
use crate::core::margin::{MarginResult, calculate};
use crate::core::money::{round_amount, round_percent};
use crate::core::resolver::{CostKey, PriceResolver, ResolutionStrategy};
use crate::core::snapshot::CostSnapshot;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CostSource {
    Snapshot,
    Ledger,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarginEstimate {
    pub source: CostSource,
    pub cost_net: Option<Decimal>,
    pub margin: Option<MarginResult>,
    /// When the cost was observed.
    pub as_of: Option<DateTime<Utc>>,
}

impl MarginEstimate {
    pub fn from_cost(
        source: CostSource,
        sell_net: Decimal,
        cost_net: Option<Decimal>,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Self, PricingError> {
        Ok(MarginEstimate {
            source,
            cost_net,
            margin: cost_net.map(|cost| calculate(sell_net, cost)).transpose()?,
            as_of,
        })
    }

    pub fn margin_percent(&self) -> Option<Decimal> {
        self.margin.map(|m| m.margin_percent)
    }

    fn rounded(&self) -> Self {
        MarginEstimate {
            cost_net: self.cost_net.map(round_amount),
            margin: self.margin.map(|m| m.rounded()),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Consistent,
    DivergenceWarning,
    /// One of the two paths had no cost to compare.
    Incomplete,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub product_id: String,
    pub sell_net: Decimal,
    pub method_a: MarginEstimate,
    pub method_b: MarginEstimate,
    pub discrepancy: Option<Decimal>,
    pub tolerance: Decimal,
    pub within_tolerance: bool,
    pub status: ValidationStatus,
}

impl ValidationReport {
    pub fn rounded(&self) -> Self {
        ValidationReport {
            sell_net: round_amount(self.sell_net),
            method_a: self.method_a.rounded(),
            method_b: self.method_b.rounded(),
            discrepancy: self.discrepancy.map(round_percent),
            tolerance: round_percent(self.tolerance),
            ..self.clone()
        }
    }
}

/// Builds the report from two estimates. Divergence is measured in
/// percentage points of margin, at full precision.
pub fn reconcile(
    product_id: &str,
    sell_net: Decimal,
    method_a: MarginEstimate,
    method_b: MarginEstimate,
    tolerance: Decimal,
) -> ValidationReport {
    let discrepancy = match (method_a.margin_percent(), method_b.margin_percent()) {
        (Some(a), Some(b)) => Some((a - b).abs()),
        _ => None,
    };
    let within_tolerance = discrepancy.is_some_and(|d| d <= tolerance);
    let status = match discrepancy {
        None => ValidationStatus::Incomplete,
        Some(_) if within_tolerance => ValidationStatus::Consistent,
        Some(_) => ValidationStatus::DivergenceWarning,
    };

    match status {
        ValidationStatus::DivergenceWarning => warn!(
            product_id,
            discrepancy = ?discrepancy,
            %tolerance,
            "Margin divergence between captured and live cost"
        ),
        _ => debug!(product_id, ?status, "Margin validated"),
    }

    ValidationReport {
        product_id: product_id.to_string(),
        sell_net,
        method_a,
        method_b,
        discrepancy,
        tolerance,
        within_tolerance,
        status,
    }
}

pub struct ValidationReconciler<'a> {
    snapshot: &'a dyn CostSnapshot,
    resolver: &'a PriceResolver,
    strategy: ResolutionStrategy,
    timeframe_days: u32,
    tolerance: Decimal,
}

impl<'a> ValidationReconciler<'a> {
    pub fn new(
        snapshot: &'a dyn CostSnapshot,
        resolver: &'a PriceResolver,
        strategy: ResolutionStrategy,
        timeframe_days: u32,
        tolerance: Decimal,
    ) -> Self {
        Self {
            snapshot,
            resolver,
            strategy,
            timeframe_days,
            tolerance,
        }
    }

    /// Method A reads the captured cost, method B always asks the ledger.
    /// Both paths use the same `(product, warehouse)` scope.
    pub async fn validate(
        &self,
        product_id: &str,
        sell_net: Decimal,
        warehouse_id: Option<&str>,
    ) -> Result<ValidationReport, PricingError> {
        let key = CostKey::new(product_id, warehouse_id);

        let captured = self.snapshot.get(&key).await;
        let method_a = MarginEstimate::from_cost(
            CostSource::Snapshot,
            sell_net,
            captured.as_ref().map(|entry| entry.cost_net),
            captured.as_ref().map(|entry| entry.captured_at),
        )?;

        let now = Utc::now();
        let live = self
            .resolver
            .resolve_at(product_id, warehouse_id, self.strategy, self.timeframe_days, now)
            .await?;
        let method_b = MarginEstimate::from_cost(
            CostSource::Ledger,
            sell_net,
            live.found().map(|cost| cost.cost_net),
            Some(now),
        )?;

        Ok(reconcile(product_id, sell_net, method_a, method_b, self.tolerance))
    }
}
