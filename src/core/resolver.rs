//! Reduces purchase history to one authoritative cost

use crate::core::error::PricingError;
use crate::core::ledger::{LedgerQuery, PurchaseLedger, PurchaseRecord};
use crate::core::money::round_amount;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Rule for reducing several purchases to one cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    #[default]
    Latest,
    /// Unweighted mean: every purchase counts once, whatever its quantity.
    Average,
    Minimum,
    Maximum,
}

impl Display for ResolutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ResolutionStrategy::Latest => "latest",
                ResolutionStrategy::Average => "average",
                ResolutionStrategy::Minimum => "minimum",
                ResolutionStrategy::Maximum => "maximum",
            }
        )
    }
}

impl FromStr for ResolutionStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "latest" => Ok(ResolutionStrategy::Latest),
            "average" | "avg" => Ok(ResolutionStrategy::Average),
            "minimum" | "min" => Ok(ResolutionStrategy::Minimum),
            "maximum" | "max" => Ok(ResolutionStrategy::Maximum),
            _ => Err(anyhow::anyhow!("Invalid resolution strategy: {}", s)),
        }
    }
}

impl ResolutionStrategy {
    /// Applies the strategy; `Ok(None)` when there is nothing to reduce.
    ///
    /// `records` must be in ingestion order so that `Latest` breaks date
    /// ties in favour of the record ingested last.
    pub fn reduce(&self, records: &[&PurchaseRecord]) -> Result<Option<Decimal>, PricingError> {
        if records.is_empty() {
            return Ok(None);
        }
        let cost = match self {
            ResolutionStrategy::Latest => records
                .iter()
                .max_by_key(|r| r.transaction_date)
                .map(|r| r.unit_cost_net),
            ResolutionStrategy::Average => {
                let total = records
                    .iter()
                    .try_fold(Decimal::ZERO, |sum, r| sum.checked_add(r.unit_cost_net))
                    .ok_or(PricingError::Overflow("average cost"))?;
                Some(total / Decimal::from(records.len()))
            }
            ResolutionStrategy::Minimum => records.iter().map(|r| r.unit_cost_net).min(),
            ResolutionStrategy::Maximum => records.iter().map(|r| r.unit_cost_net).max(),
        };
        Ok(cost)
    }
}

/// Identifies a cost: a product, optionally scoped to one warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CostKey {
    pub product_id: String,
    pub warehouse_id: Option<String>,
}

impl CostKey {
    pub fn new(product_id: &str, warehouse_id: Option<&str>) -> Self {
        CostKey {
            product_id: product_id.to_string(),
            warehouse_id: warehouse_id.map(str::to_string),
        }
    }
}

impl Display for CostKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.warehouse_id {
            Some(warehouse) => write!(f, "{}@{}", self.product_id, warehouse),
            None => write!(f, "{}", self.product_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCost {
    pub product_id: String,
    pub warehouse_id: Option<String>,
    pub cost_net: Decimal,
    pub strategy_used: ResolutionStrategy,
    pub records_considered: usize,
    pub timeframe_days: u32,
}

impl ResolvedCost {
    pub fn rounded(&self) -> Self {
        ResolvedCost {
            cost_net: round_amount(self.cost_net),
            ..self.clone()
        }
    }
}

/// Outcome of a lookup that may legitimately find nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn found(&self) -> Option<&T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Lookup::NotFound)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::NotFound => Lookup::NotFound,
        }
    }
}

pub type Resolution = Lookup<ResolvedCost>;

/// Resolves costs against a [`PurchaseLedger`], bounding every query by a
/// timeout.
pub struct PriceResolver {
    ledger: Arc<dyn PurchaseLedger>,
    timeout: std::time::Duration,
}

impl PriceResolver {
    pub fn new(ledger: Arc<dyn PurchaseLedger>, timeout: std::time::Duration) -> Self {
        Self { ledger, timeout }
    }

    pub async fn resolve(
        &self,
        product_id: &str,
        warehouse_id: Option<&str>,
        strategy: ResolutionStrategy,
        timeframe_days: u32,
    ) -> Result<Resolution, PricingError> {
        self.resolve_at(product_id, warehouse_id, strategy, timeframe_days, Utc::now())
            .await
    }

    /// Same as [`resolve`](Self::resolve) with the window ending at `now`.
    pub async fn resolve_at(
        &self,
        product_id: &str,
        warehouse_id: Option<&str>,
        strategy: ResolutionStrategy,
        timeframe_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Resolution, PricingError> {
        let since = now
            .checked_sub_signed(Duration::days(i64::from(timeframe_days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let query = LedgerQuery {
            product_id: product_id.to_string(),
            warehouse_id: warehouse_id.map(str::to_string),
            since,
            until: now,
        };
        debug!(
            product_id,
            ?warehouse_id,
            %strategy,
            timeframe_days,
            "Querying purchase ledger"
        );

        let records =
            match tokio::time::timeout(self.timeout, self.ledger.purchase_records(&query)).await {
                Ok(Ok(records)) => records,
                Ok(Err(e)) => {
                    warn!(product_id, error = %e, "Purchase ledger query failed");
                    return Err(PricingError::Ledger {
                        product_id: product_id.to_string(),
                        message: format!("{e:#}"),
                    });
                }
                Err(_) => {
                    warn!(
                        product_id,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "Purchase ledger timed out"
                    );
                    return Err(PricingError::Timeout {
                        product_id: product_id.to_string(),
                        timeout_ms: self.timeout.as_millis() as u64,
                    });
                }
            };

        let eligible: Vec<&PurchaseRecord> = records.iter().filter(|r| query.matches(r)).collect();
        let Some(cost_net) = strategy.reduce(&eligible)? else {
            debug!(product_id, "No purchase history within timeframe");
            return Ok(Lookup::NotFound);
        };

        debug!(
            product_id,
            %cost_net,
            records = eligible.len(),
            "Resolved purchase cost"
        );
        Ok(Lookup::Found(ResolvedCost {
            product_id: product_id.to_string(),
            warehouse_id: query.warehouse_id,
            cost_net,
            strategy_used: strategy,
            records_considered: eligible.len(),
            timeframe_days,
        }))
    }
}
