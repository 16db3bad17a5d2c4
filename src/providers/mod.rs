pub mod http_ledger;
pub mod memory_ledger;
pub mod util;

use crate::core::PurchaseLedger;
use crate::core::config::LedgerConfig;
use anyhow::{Result, bail};
use http_ledger::HttpLedger;
use memory_ledger::MemoryLedger;
use std::sync::Arc;
use tracing::debug;

/// Builds the configured purchase ledger. The HTTP ledger wins when both are
/// configured.
pub fn open_ledger(config: &LedgerConfig) -> Result<Arc<dyn PurchaseLedger>> {
    if let Some(http) = &config.http {
        debug!("Using HTTP purchase ledger at {}", http.base_url);
        return Ok(Arc::new(HttpLedger::new(&http.base_url)?));
    }
    if let Some(file) = &config.file {
        debug!("Using purchase records from {}", file.path);
        return Ok(Arc::new(MemoryLedger::load_from_path(&file.path)?));
    }
    bail!("No purchase ledger configured: set ledger.http.base_url or ledger.file.path")
}
