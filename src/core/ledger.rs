//! Purchase ledger abstractions

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A purchase as booked by the ledger. Never mutated by this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub product_id: String,
    #[serde(default)]
    pub warehouse_id: Option<String>,
    #[serde(with = "rust_decimal::serde::str")]
    pub unit_cost_net: Decimal,
    pub transaction_date: DateTime<Utc>,
}

/// Records of one product booked within `[since, until]`, optionally
/// restricted to one warehouse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerQuery {
    pub product_id: String,
    pub warehouse_id: Option<String>,
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl LedgerQuery {
    pub fn matches(&self, record: &PurchaseRecord) -> bool {
        record.product_id == self.product_id
            && self
                .warehouse_id
                .as_ref()
                .is_none_or(|warehouse| record.warehouse_id.as_ref() == Some(warehouse))
            && record.transaction_date >= self.since
            && record.transaction_date <= self.until
    }
}

/// Read-only access to purchase history.
///
/// Implementations return records in ingestion order, oldest first.
#[async_trait]
pub trait PurchaseLedger: Send + Sync {
    async fn purchase_records(&self, query: &LedgerQuery) -> Result<Vec<PurchaseRecord>>;
}
