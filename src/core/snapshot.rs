//! Precomputed costs, captured ahead of time and read without touching the
//! ledger.

use crate::core::resolver::{CostKey, ResolutionStrategy};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    #[serde(with = "rust_decimal::serde::str")]
    pub cost_net: Decimal,
    pub strategy: ResolutionStrategy,
    pub timeframe_days: u32,
    pub captured_at: DateTime<Utc>,
}

/// Storage for captured costs. Lookups never fail: a store that cannot be
/// read behaves as if the entry was never captured. Writes report failure
/// so that a capture which was not persisted is not presented as done.
#[async_trait]
pub trait CostSnapshot: Send + Sync {
    async fn get(&self, key: &CostKey) -> Option<SnapshotEntry>;
    async fn put(&self, key: &CostKey, entry: SnapshotEntry) -> anyhow::Result<()>;
}
