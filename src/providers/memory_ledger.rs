use crate::core::{LedgerQuery, PurchaseLedger, PurchaseRecord};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

/// Purchase history held in memory, in ingestion order.
///
/// Loaded from a YAML (or JSON) list of records when the ledger service is
/// not reachable, e.g. for offline what-if pricing.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    records: Vec<PurchaseRecord>,
}

impl MemoryLedger {
    pub fn new(records: Vec<PurchaseRecord>) -> Self {
        Self { records }
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read purchase records: {}", path.as_ref().display())
        })?;
        let records: Vec<PurchaseRecord> = serde_yaml::from_str(&content).with_context(|| {
            format!("Failed to parse purchase records: {}", path.as_ref().display())
        })?;
        debug!("Loaded {} purchase records", records.len());
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl PurchaseLedger for MemoryLedger {
    async fn purchase_records(&self, query: &LedgerQuery) -> Result<Vec<PurchaseRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|record| query.matches(record))
            .cloned()
            .collect())
    }
}
