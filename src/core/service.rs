//! The service handle exposing the pricing operations.
//!
//! Every operation computes at full precision and rounds once, on the value
//! it returns.

use crate::core::batch::{BatchEntry, BatchEvaluator, BatchResult};
use crate::core::config::PricingSettings;
use crate::core::error::PricingError;
use crate::core::ledger::PurchaseLedger;
use crate::core::margin::{MarginResult, calculate};
use crate::core::reconcile::{ValidationReconciler, ValidationReport};
use crate::core::resolver::{CostKey, Lookup, PriceResolver, Resolution, ResolutionStrategy, ResolvedCost};
use crate::core::snapshot::{CostSnapshot, SnapshotEntry};
use crate::core::target::{self, TargetPriceResult};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Margin of a product against its resolved cost.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarginQuote {
    pub margin: MarginResult,
    pub cost: ResolvedCost,
    pub meets_minimum: bool,
}

pub struct PricingService {
    resolver: PriceResolver,
    snapshot: Arc<dyn CostSnapshot>,
    settings: PricingSettings,
}

impl PricingService {
    pub fn new(
        ledger: Arc<dyn PurchaseLedger>,
        snapshot: Arc<dyn CostSnapshot>,
        settings: PricingSettings,
    ) -> Self {
        Self {
            resolver: PriceResolver::new(ledger, settings.ledger_timeout()),
            snapshot,
            settings,
        }
    }

    pub fn settings(&self) -> &PricingSettings {
        &self.settings
    }

    /// Local estimate from two known prices; never touches the ledger.
    pub fn compute_margin(
        &self,
        sell_net: Decimal,
        buy_net: Decimal,
    ) -> Result<MarginResult, PricingError> {
        Ok(calculate(sell_net, buy_net)?.rounded())
    }

    /// Whether the unrounded margin reaches the configured minimum.
    pub fn meets_minimum(&self, sell_net: Decimal, buy_net: Decimal) -> Result<bool, PricingError> {
        Ok(calculate(sell_net, buy_net)?
            .meets_minimum(self.settings.minimum_acceptable_margin_percent))
    }

    pub async fn resolve_product_margin(
        &self,
        product_id: &str,
        sell_net: Decimal,
        warehouse_id: Option<&str>,
        strategy: Option<ResolutionStrategy>,
    ) -> Result<Lookup<MarginQuote>, PricingError> {
        let strategy = strategy.unwrap_or(self.settings.default_strategy);
        let resolution = self
            .resolver
            .resolve(
                product_id,
                warehouse_id,
                strategy,
                self.settings.default_timeframe_days,
            )
            .await?;

        let cost = match resolution {
            Lookup::Found(cost) => cost,
            Lookup::NotFound => return Ok(Lookup::NotFound),
        };
        let margin = calculate(sell_net, cost.cost_net)?;
        Ok(Lookup::Found(MarginQuote {
            meets_minimum: margin.meets_minimum(self.settings.minimum_acceptable_margin_percent),
            margin: margin.rounded(),
            cost: cost.rounded(),
        }))
    }

    /// Authoritative cost from the ledger.
    pub async fn resolve_purchase_price(
        &self,
        product_id: &str,
        warehouse_id: Option<&str>,
        strategy: ResolutionStrategy,
        timeframe_days: u32,
    ) -> Result<Resolution, PricingError> {
        let resolution = self
            .resolver
            .resolve(product_id, warehouse_id, strategy, timeframe_days)
            .await?;
        Ok(resolution.map(|cost| cost.rounded()))
    }

    /// Sell price reaching `target_margin_percent` over a known cost.
    pub fn solve_target_price(
        &self,
        buy_net: Decimal,
        target_margin_percent: Decimal,
    ) -> Result<TargetPriceResult, PricingError> {
        Ok(target::solve(buy_net, target_margin_percent)?.rounded())
    }

    /// Sell price reaching `target_margin_percent` over the resolved cost.
    ///
    /// The margin is checked before the ledger is queried.
    pub async fn compute_target_price(
        &self,
        product_id: &str,
        target_margin_percent: Decimal,
        warehouse_id: Option<&str>,
    ) -> Result<Lookup<TargetPriceResult>, PricingError> {
        target::check_margin(target_margin_percent)?;

        let resolution = self
            .resolver
            .resolve(
                product_id,
                warehouse_id,
                self.settings.default_strategy,
                self.settings.default_timeframe_days,
            )
            .await?;

        match resolution {
            Lookup::Found(cost) => {
                let result = target::solve(cost.cost_net, target_margin_percent)?;
                Ok(Lookup::Found(result.rounded()))
            }
            Lookup::NotFound => Ok(Lookup::NotFound),
        }
    }

    pub async fn compute_batch_margins(
        &self,
        entries: &[BatchEntry],
        warehouse_id: Option<&str>,
        on_resolved: &(dyn Fn() + Sync),
    ) -> BatchResult {
        let evaluator = BatchEvaluator::new(
            &self.resolver,
            self.settings.default_strategy,
            self.settings.default_timeframe_days,
            self.settings.batch_concurrency,
            self.settings.minimum_acceptable_margin_percent,
        );
        evaluator
            .evaluate(entries, warehouse_id, Utc::now(), on_resolved)
            .await
            .rounded()
    }

    /// Compares captured and live margins within one `(product, warehouse)`
    /// scope; `None` covers all warehouses, as `capture_snapshot` does.
    pub async fn validate_margin(
        &self,
        product_id: &str,
        sell_net: Decimal,
        warehouse_id: Option<&str>,
    ) -> Result<ValidationReport, PricingError> {
        let reconciler = ValidationReconciler::new(
            self.snapshot.as_ref(),
            &self.resolver,
            self.settings.default_strategy,
            self.settings.default_timeframe_days,
            self.settings.discrepancy_tolerance_percent,
        );
        Ok(reconciler.validate(product_id, sell_net, warehouse_id).await?.rounded())
    }

    /// Resolves a product with the default strategy and stores the cost for
    /// later validation runs. Nothing is stored when no history exists.
    pub async fn capture_snapshot(
        &self,
        product_id: &str,
        warehouse_id: Option<&str>,
    ) -> Result<Resolution, PricingError> {
        let strategy = self.settings.default_strategy;
        let timeframe_days = self.settings.default_timeframe_days;
        let resolution = self
            .resolver
            .resolve(product_id, warehouse_id, strategy, timeframe_days)
            .await?;

        if let Lookup::Found(cost) = &resolution {
            let key = CostKey::new(product_id, warehouse_id);
            let entry = SnapshotEntry {
                cost_net: cost.cost_net,
                strategy,
                timeframe_days,
                captured_at: Utc::now(),
            };
            match self.snapshot.put(&key, entry).await {
                Ok(()) => info!(%key, cost_net = %cost.cost_net, "Captured cost snapshot"),
                Err(e) => {
                    warn!(%key, error = %format!("{e:#}"), "Cost snapshot was not persisted");
                    return Err(PricingError::Snapshot {
                        product_id: product_id.to_string(),
                        message: format!("{e:#}"),
                    });
                }
            }
        }
        Ok(resolution.map(|cost| cost.rounded()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::batch::BatchOutcome;
    use crate::core::ledger::{LedgerQuery, PurchaseRecord};
    use crate::core::reconcile::ValidationStatus;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    struct MockLedger {
        records: Mutex<Vec<PurchaseRecord>>,
    }

    #[async_trait]
    impl PurchaseLedger for MockLedger {
        async fn purchase_records(&self, query: &LedgerQuery) -> Result<Vec<PurchaseRecord>> {
            Ok(self
                .records
                .lock()
                .await
                .iter()
                .filter(|r| query.matches(r))
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct MockSnapshot {
        entries: Mutex<HashMap<CostKey, SnapshotEntry>>,
    }

    #[async_trait]
    impl CostSnapshot for MockSnapshot {
        async fn get(&self, key: &CostKey) -> Option<SnapshotEntry> {
            self.entries.lock().await.get(key).cloned()
        }

        async fn put(&self, key: &CostKey, entry: SnapshotEntry) -> Result<()> {
            self.entries.lock().await.insert(key.clone(), entry);
            Ok(())
        }
    }

    fn purchase(product_id: &str, days_ago: i64, cost: Decimal) -> PurchaseRecord {
        PurchaseRecord {
            product_id: product_id.to_string(),
            warehouse_id: Some("WH-1".to_string()),
            unit_cost_net: cost,
            transaction_date: Utc::now() - Duration::days(days_ago),
        }
    }

    fn service(records: Vec<PurchaseRecord>) -> (PricingService, Arc<MockLedger>) {
        let ledger = Arc::new(MockLedger {
            records: Mutex::new(records),
        });
        let service = PricingService::new(
            ledger.clone(),
            Arc::new(MockSnapshot::default()),
            PricingSettings::default(),
        );
        (service, ledger)
    }

    #[test]
    fn test_compute_margin_is_rounded() {
        let (service, _) = service(Vec::new());
        let margin = service.compute_margin(dec!(3), dec!(2)).unwrap();
        assert_eq!(margin.margin_percent.to_string(), "33.3");
        assert_eq!(margin.sell_net.to_string(), "3.00");
    }

    #[test]
    fn test_minimum_checked_before_rounding() {
        let (service, _) = service(Vec::new());
        // 14.96% is shown as 15.0% but stays below a 15% minimum
        let margin = service.compute_margin(dec!(100), dec!(85.04)).unwrap();
        assert_eq!(margin.margin_percent.to_string(), "15.0");
        assert!(!service.meets_minimum(dec!(100), dec!(85.04)).unwrap());
        assert!(service.meets_minimum(dec!(100), dec!(85)).unwrap());
    }

    #[test]
    fn test_compute_margin_out_of_range() {
        let (service, _) = service(Vec::new());
        assert_eq!(
            service.compute_margin(Decimal::MAX, dec!(1)),
            Err(PricingError::Overflow("margin"))
        );
    }

    #[tokio::test]
    async fn test_resolve_product_margin() {
        let (service, _) = service(vec![
            purchase("SKU-1", 10, dec!(5.00)),
            purchase("SKU-1", 2, dec!(6.00)),
        ]);

        let quote = service
            .resolve_product_margin("SKU-1", dec!(8), None, None)
            .await
            .unwrap();
        let quote = quote.found().unwrap();
        assert_eq!(quote.cost.cost_net, dec!(6.00));
        assert_eq!(quote.margin.margin_percent.to_string(), "25.0");
        assert!(quote.meets_minimum);

        let cheapest = service
            .resolve_product_margin("SKU-1", dec!(8), None, Some(ResolutionStrategy::Minimum))
            .await
            .unwrap();
        assert_eq!(cheapest.found().unwrap().cost.cost_net, dec!(5.00));

        let missing = service
            .resolve_product_margin("SKU-2", dec!(8), None, None)
            .await
            .unwrap();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn test_compute_target_price() {
        let (service, _) = service(vec![purchase("SKU-1", 1, dec!(80))]);

        let result = service
            .compute_target_price("SKU-1", dec!(20), None)
            .await
            .unwrap();
        let result = result.found().unwrap();
        assert_eq!(result.required_sell_net.to_string(), "100.00");
        assert_eq!(result.resolved_buy_net.to_string(), "80.00");

        assert_eq!(
            service.compute_target_price("SKU-1", dec!(100), None).await,
            Err(PricingError::InvalidMargin(dec!(100)))
        );
        assert!(
            service
                .compute_target_price("SKU-2", dec!(20), None)
                .await
                .unwrap()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_zero_cost_history_is_invalid_cost() {
        let (service, _) = service(vec![purchase("FREE", 1, dec!(0))]);
        assert_eq!(
            service.compute_target_price("FREE", dec!(20), None).await,
            Err(PricingError::InvalidCost(dec!(0)))
        );
    }

    #[tokio::test]
    async fn test_compute_batch_margins_flags_minimum() {
        let (service, _) = service(vec![
            purchase("A", 1, dec!(80)),
            purchase("B", 1, dec!(95)),
        ]);
        let entries = vec![
            BatchEntry {
                product_id: "A".to_string(),
                sell_net: dec!(100),
                warehouse_id: None,
            },
            BatchEntry {
                product_id: "B".to_string(),
                sell_net: dec!(100),
                warehouse_id: None,
            },
        ];

        let result = service.compute_batch_margins(&entries, None, &|| ()).await;
        let flags: Vec<bool> = result
            .slots
            .iter()
            .map(|slot| match &slot.outcome {
                BatchOutcome::Priced { meets_minimum, .. } => *meets_minimum,
                other => panic!("Expected a priced slot, got {other:?}"),
            })
            .collect();
        assert_eq!(flags, vec![true, false]);
    }

    #[tokio::test]
    async fn test_snapshot_then_validate_reports_drift() {
        let (service, ledger) = service(vec![purchase("SKU-1", 5, dec!(78))]);

        let captured = service.capture_snapshot("SKU-1", None).await.unwrap();
        assert_eq!(captured.found().unwrap().cost_net, dec!(78));

        let report = service.validate_margin("SKU-1", dec!(100), None).await.unwrap();
        assert_eq!(report.status, ValidationStatus::Consistent);

        // A newer purchase arrives after the snapshot was captured
        ledger
            .records
            .lock()
            .await
            .push(purchase("SKU-1", 0, dec!(82)));

        let report = service.validate_margin("SKU-1", dec!(100), None).await.unwrap();
        assert_eq!(report.status, ValidationStatus::DivergenceWarning);
        assert_eq!(report.discrepancy, Some(dec!(4.0)));
        assert!(!report.within_tolerance);
    }

    #[tokio::test]
    async fn test_warehouse_capture_is_validated_in_same_scope() {
        let (service, _) = service(vec![purchase("SKU-1", 5, dec!(78))]);

        let captured = service.capture_snapshot("SKU-1", Some("WH-1")).await.unwrap();
        assert!(captured.found().is_some());

        let report = service
            .validate_margin("SKU-1", dec!(100), Some("WH-1"))
            .await
            .unwrap();
        assert_eq!(report.method_a.cost_net, Some(dec!(78)));
        assert_eq!(report.status, ValidationStatus::Consistent);
    }

    struct ReadOnlySnapshot;

    #[async_trait]
    impl CostSnapshot for ReadOnlySnapshot {
        async fn get(&self, _key: &CostKey) -> Option<SnapshotEntry> {
            None
        }

        async fn put(&self, _key: &CostKey, _entry: SnapshotEntry) -> Result<()> {
            Err(anyhow::anyhow!("read-only file system"))
        }
    }

    #[tokio::test]
    async fn test_unpersisted_capture_is_reported() {
        let ledger = Arc::new(MockLedger {
            records: Mutex::new(vec![purchase("SKU-1", 1, dec!(4))]),
        });
        let service = PricingService::new(
            ledger,
            Arc::new(ReadOnlySnapshot),
            PricingSettings::default(),
        );

        let err = service.capture_snapshot("SKU-1", None).await.unwrap_err();
        assert!(matches!(
            err,
            PricingError::Snapshot { ref message, .. } if message.contains("read-only file system")
        ));

        // Nothing to store means nothing can fail
        assert!(
            service
                .capture_snapshot("SKU-2", None)
                .await
                .unwrap()
                .is_not_found()
        );
    }
}
