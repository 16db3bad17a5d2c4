use crate::core::{CostKey, CostSnapshot, SnapshotEntry};
use anyhow::{Context, Result};
use async_trait::async_trait;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use tracing::debug;

const PARTITION: &str = "cost_snapshot";

/// Snapshot persisted in a fjall partition, one JSON value per cost key.
pub struct DiskSnapshot {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl DiskSnapshot {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;

        let keyspace = fjall::Config::new(path.join("snapshot"))
            .open()
            .with_context(|| format!("Failed to open snapshot store in {}", path.display()))?;
        let partition = keyspace
            .open_partition(PARTITION, PartitionCreateOptions::default())
            .context("Failed to open snapshot partition")?;
        Ok(Self {
            keyspace,
            partition,
        })
    }

    fn storage_key(key: &CostKey) -> String {
        match &key.warehouse_id {
            Some(warehouse) => format!("{}\u{1f}{}", key.product_id, warehouse),
            None => key.product_id.clone(),
        }
    }

    fn read(&self, key: &CostKey) -> Result<Option<SnapshotEntry>> {
        let Some(value) = self.partition.get(Self::storage_key(key).as_bytes())? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&value)?))
    }

    fn write(&self, key: &CostKey, entry: &SnapshotEntry) -> Result<()> {
        let value = serde_json::to_vec(entry)?;
        self.partition
            .insert(Self::storage_key(key).as_bytes(), value)?;
        self.keyspace.persist(PersistMode::Buffer)?;
        Ok(())
    }
}

#[async_trait]
impl CostSnapshot for DiskSnapshot {
    async fn get(&self, key: &CostKey) -> Option<SnapshotEntry> {
        match self.read(key) {
            Ok(Some(entry)) => {
                debug!("Snapshot HIT for key: {}", key);
                Some(entry)
            }
            Ok(None) => {
                debug!("Snapshot MISS for key: {}", key);
                None
            }
            Err(e) => {
                debug!("DiskSnapshot get error for {}: {}", key, e);
                None
            }
        }
    }

    async fn put(&self, key: &CostKey, entry: SnapshotEntry) -> Result<()> {
        self.write(key, &entry)
            .with_context(|| format!("Failed to persist cost snapshot for {key}"))?;
        debug!("Snapshot PUT for key: {}", key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ResolutionStrategy;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn entry(cost: rust_decimal::Decimal) -> SnapshotEntry {
        SnapshotEntry {
            cost_net: cost,
            strategy: ResolutionStrategy::Average,
            timeframe_days: 30,
            captured_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_disk_snapshot_get_put() {
        let dir = tempdir().unwrap();
        let snapshot = DiskSnapshot::open(dir.path()).unwrap();
        let key = CostKey::new("SKU-1", None);

        assert!(snapshot.get(&key).await.is_none());

        let first = entry(dec!(4.10));
        snapshot.put(&key, first.clone()).await.unwrap();
        assert_eq!(snapshot.get(&key).await, Some(first));

        // Overwrites keep the latest capture
        let second = entry(dec!(4.35));
        snapshot.put(&key, second.clone()).await.unwrap();
        assert_eq!(snapshot.get(&key).await, Some(second));
    }

    #[tokio::test]
    async fn test_warehouse_keys_are_separate() {
        let dir = tempdir().unwrap();
        let snapshot = DiskSnapshot::open(dir.path()).unwrap();

        snapshot
            .put(&CostKey::new("SKU-1", Some("WH-1")), entry(dec!(1)))
            .await
            .unwrap();
        snapshot
            .put(&CostKey::new("SKU-1", Some("WH-2")), entry(dec!(2)))
            .await
            .unwrap();

        let wh1 = snapshot.get(&CostKey::new("SKU-1", Some("WH-1"))).await;
        assert_eq!(wh1.unwrap().cost_net, dec!(1));
        assert!(snapshot.get(&CostKey::new("SKU-1", None)).await.is_none());
    }
}
