use crate::core::{CostKey, CostSnapshot, SnapshotEntry};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory snapshot, used when no data directory is available
#[derive(Clone, Default)]
pub struct MemorySnapshot {
    inner: Arc<Mutex<HashMap<CostKey, SnapshotEntry>>>,
}

impl MemorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CostSnapshot for MemorySnapshot {
    async fn get(&self, key: &CostKey) -> Option<SnapshotEntry> {
        let snapshot = self.inner.lock().await;
        let entry = snapshot.get(key).cloned();
        if entry.is_some() {
            debug!("Snapshot HIT for key: {}", key);
        } else {
            debug!("Snapshot MISS for key: {}", key);
        }
        entry
    }

    async fn put(&self, key: &CostKey, entry: SnapshotEntry) -> anyhow::Result<()> {
        let mut snapshot = self.inner.lock().await;
        debug!("Snapshot PUT for key: {}", key);
        snapshot.insert(key.clone(), entry);
        Ok(())
    }
}
