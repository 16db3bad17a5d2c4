pub mod disk;
pub mod memory;

use crate::core::CostSnapshot;
use crate::core::config::AppConfig;
use disk::DiskSnapshot;
use memory::MemorySnapshot;
use std::sync::Arc;
use tracing::{debug, warn};

/// Opens the persistent snapshot under the configured data directory.
///
/// Falls back to an in-memory snapshot when the directory cannot be used, so
/// captures still work for the lifetime of the process.
pub fn open_snapshot(config: &AppConfig) -> Arc<dyn CostSnapshot> {
    let opened = config
        .default_data_path()
        .and_then(|path| DiskSnapshot::open(&path));

    match opened {
        Ok(snapshot) => {
            debug!("Using persistent cost snapshot");
            Arc::new(snapshot)
        }
        Err(e) => {
            warn!("Cost snapshot is not persisted: {e:#}");
            Arc::new(MemorySnapshot::new())
        }
    }
}
