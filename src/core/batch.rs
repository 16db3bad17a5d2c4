//! Margin evaluation over many products at once.
//!
//! Every distinct `(product, warehouse)` pair is resolved once per call, with
//! at most `concurrency` ledger queries in flight. Results are placed by the
//! index of the request entry, so the order in which queries complete never
//! shows up in the output.

use crate::core::error::PricingError;
use crate::core::margin::{MarginResult, calculate};
use crate::core::resolver::{CostKey, Lookup, PriceResolver, ResolutionStrategy, ResolvedCost};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub product_id: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub sell_net: Decimal,
    /// Overrides the warehouse given for the whole batch.
    #[serde(default)]
    pub warehouse_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    Priced {
        margin: MarginResult,
        cost: ResolvedCost,
        meets_minimum: bool,
    },
    NotFound,
    Timeout {
        message: String,
    },
    Failed {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSlot {
    pub index: usize,
    pub product_id: String,
    pub warehouse_id: Option<String>,
    #[serde(flatten)]
    pub outcome: BatchOutcome,
}

/// One slot per request entry, in request order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult {
    pub slots: Vec<BatchSlot>,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn priced_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot.outcome, BatchOutcome::Priced { .. }))
            .count()
    }

    pub fn rounded(&self) -> Self {
        let slots = self
            .slots
            .iter()
            .map(|slot| {
                let outcome = match &slot.outcome {
                    BatchOutcome::Priced {
                        margin,
                        cost,
                        meets_minimum,
                    } => BatchOutcome::Priced {
                        margin: margin.rounded(),
                        cost: cost.rounded(),
                        meets_minimum: *meets_minimum,
                    },
                    other => other.clone(),
                };
                BatchSlot {
                    outcome,
                    ..slot.clone()
                }
            })
            .collect();
        BatchResult { slots }
    }
}

pub struct BatchEvaluator<'a> {
    resolver: &'a PriceResolver,
    strategy: ResolutionStrategy,
    timeframe_days: u32,
    concurrency: usize,
    minimum_margin_percent: Decimal,
}

impl<'a> BatchEvaluator<'a> {
    pub fn new(
        resolver: &'a PriceResolver,
        strategy: ResolutionStrategy,
        timeframe_days: u32,
        concurrency: usize,
        minimum_margin_percent: Decimal,
    ) -> Self {
        Self {
            resolver,
            strategy,
            timeframe_days,
            concurrency: concurrency.max(1),
            minimum_margin_percent,
        }
    }

    /// Evaluates `entries` against purchase history ending at `now`.
    ///
    /// `on_resolved` is invoked once per distinct cost lookup as it finishes.
    pub async fn evaluate(
        &self,
        entries: &[BatchEntry],
        warehouse_id: Option<&str>,
        now: DateTime<Utc>,
        on_resolved: &(dyn Fn() + Sync),
    ) -> BatchResult {
        let keys: Vec<CostKey> = entries
            .iter()
            .map(|entry| CostKey::new(&entry.product_id, entry.warehouse_id.as_deref().or(warehouse_id)))
            .collect();

        let mut seen = HashSet::new();
        let distinct: Vec<&CostKey> = keys.iter().filter(|key| seen.insert(*key)).collect();
        info!(
            entries = entries.len(),
            distinct = distinct.len(),
            concurrency = self.concurrency,
            "Evaluating batch"
        );

        let memo: HashMap<&CostKey, Result<Lookup<ResolvedCost>, PricingError>> =
            stream::iter(distinct)
                .map(|key| async move {
                    let resolution = self
                        .resolver
                        .resolve_at(
                            &key.product_id,
                            key.warehouse_id.as_deref(),
                            self.strategy,
                            self.timeframe_days,
                            now,
                        )
                        .await;
                    on_resolved();
                    (key, resolution)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let slots = entries
            .iter()
            .zip(&keys)
            .enumerate()
            .map(|(index, (entry, key))| BatchSlot {
                index,
                product_id: entry.product_id.clone(),
                warehouse_id: key.warehouse_id.clone(),
                outcome: self.outcome(entry, &memo[key]),
            })
            .collect();

        let result = BatchResult { slots };
        debug!(
            priced = result.priced_count(),
            total = result.len(),
            "Batch evaluated"
        );
        result
    }

    fn outcome(
        &self,
        entry: &BatchEntry,
        resolution: &Result<Lookup<ResolvedCost>, PricingError>,
    ) -> BatchOutcome {
        match resolution {
            Ok(Lookup::Found(cost)) => match calculate(entry.sell_net, cost.cost_net) {
                Ok(margin) => BatchOutcome::Priced {
                    meets_minimum: margin.meets_minimum(self.minimum_margin_percent),
                    margin,
                    cost: cost.clone(),
                },
                Err(e) => BatchOutcome::Failed {
                    message: e.to_string(),
                },
            },
            Ok(Lookup::NotFound) => BatchOutcome::NotFound,
            Err(e @ PricingError::Timeout { .. }) => BatchOutcome::Timeout {
                message: e.to_string(),
            },
            Err(e) => BatchOutcome::Failed {
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ledger::{LedgerQuery, PurchaseLedger, PurchaseRecord};
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers each product after a product-specific delay so that queries
    /// complete out of request order.
    struct MockLedger {
        records: Vec<PurchaseRecord>,
        delays_ms: HashMap<String, u64>,
        call_count: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MockLedger {
        fn new(records: Vec<PurchaseRecord>) -> Self {
            Self {
                records,
                delays_ms: HashMap::new(),
                call_count: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        fn with_delay(mut self, product_id: &str, delay_ms: u64) -> Self {
            self.delays_ms.insert(product_id.to_string(), delay_ms);
            self
        }
    }

    #[async_trait]
    impl PurchaseLedger for MockLedger {
        async fn purchase_records(&self, query: &LedgerQuery) -> Result<Vec<PurchaseRecord>> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);

            let delay = self.delays_ms.get(&query.product_id).copied().unwrap_or(0);
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if query.product_id == "BROKEN" {
                return Err(anyhow!("ledger shard offline"));
            }
            Ok(self
                .records
                .iter()
                .filter(|r| query.matches(r))
                .cloned()
                .collect())
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn purchase(product_id: &str, warehouse: &str, cost: Decimal) -> PurchaseRecord {
        PurchaseRecord {
            product_id: product_id.to_string(),
            warehouse_id: Some(warehouse.to_string()),
            unit_cost_net: cost,
            transaction_date: now() - Duration::days(3),
        }
    }

    fn entry(product_id: &str, sell: Decimal) -> BatchEntry {
        BatchEntry {
            product_id: product_id.to_string(),
            sell_net: sell,
            warehouse_id: None,
        }
    }

    fn resolver(ledger: Arc<MockLedger>, timeout_ms: u64) -> PriceResolver {
        PriceResolver::new(ledger, std::time::Duration::from_millis(timeout_ms))
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_preserved_with_not_found() {
        let ledger = Arc::new(
            MockLedger::new(vec![
                purchase("A", "WH-1", dec!(80)),
                purchase("C", "WH-1", dec!(40)),
            ])
            .with_delay("A", 300)
            .with_delay("B", 200)
            .with_delay("C", 10),
        );
        let resolver = resolver(Arc::clone(&ledger), 5_000);
        let evaluator =
            BatchEvaluator::new(&resolver, ResolutionStrategy::Latest, 30, 4, dec!(15));

        let request = vec![entry("A", dec!(100)), entry("B", dec!(10)), entry("C", dec!(50))];
        let result = evaluator.evaluate(&request, None, now(), &|| ()).await;

        assert_eq!(result.len(), 3);
        assert_eq!(result.priced_count(), 2);
        let ids: Vec<&str> = result.slots.iter().map(|s| s.product_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        let indexes: Vec<usize> = result.slots.iter().map(|s| s.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);

        match &result.slots[0].outcome {
            BatchOutcome::Priced {
                margin,
                meets_minimum,
                ..
            } => {
                assert_eq!(margin.margin_percent, dec!(20));
                assert!(*meets_minimum);
            }
            other => panic!("Expected a priced slot, got {other:?}"),
        }
        assert_eq!(result.slots[1].outcome, BatchOutcome::NotFound);
        match &result.slots[2].outcome {
            BatchOutcome::Priced { margin, .. } => assert_eq!(margin.profit, dec!(10)),
            other => panic!("Expected a priced slot, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_isolated_per_entry() {
        let ledger = Arc::new(
            MockLedger::new(vec![purchase("A", "WH-1", dec!(8))]).with_delay("SLOW", 10_000),
        );
        let resolver = resolver(Arc::clone(&ledger), 1_000);
        let evaluator =
            BatchEvaluator::new(&resolver, ResolutionStrategy::Latest, 30, 2, dec!(0));

        let request = vec![
            entry("SLOW", dec!(10)),
            entry("BROKEN", dec!(10)),
            entry("A", dec!(10)),
        ];
        let result = evaluator.evaluate(&request, None, now(), &|| ()).await;

        assert_eq!(result.len(), 3);
        assert!(matches!(result.slots[0].outcome, BatchOutcome::Timeout { .. }));
        match &result.slots[1].outcome {
            BatchOutcome::Failed { message } => assert!(message.contains("ledger shard offline")),
            other => panic!("Expected a failed slot, got {other:?}"),
        }
        assert!(matches!(result.slots[2].outcome, BatchOutcome::Priced { .. }));
    }

    #[tokio::test]
    async fn test_out_of_range_sell_price_fails_only_its_slot() {
        let ledger = Arc::new(MockLedger::new(vec![purchase("A", "WH-1", dec!(1))]));
        let resolver = resolver(ledger, 5_000);
        let evaluator =
            BatchEvaluator::new(&resolver, ResolutionStrategy::Latest, 30, 2, dec!(15));

        let request = vec![entry("A", Decimal::MAX), entry("A", dec!(2))];
        let result = evaluator.evaluate(&request, None, now(), &|| ()).await;

        match &result.slots[0].outcome {
            BatchOutcome::Failed { message } => assert!(message.contains("out of range")),
            other => panic!("Unexpected outcome: {other:?}"),
        }
        assert!(matches!(result.slots[1].outcome, BatchOutcome::Priced { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_products_hit_ledger_once() {
        let ledger = Arc::new(MockLedger::new(vec![
            purchase("A", "WH-1", dec!(5)),
            purchase("A", "WH-2", dec!(7)),
        ]));
        let resolver = resolver(Arc::clone(&ledger), 1_000);
        let evaluator =
            BatchEvaluator::new(&resolver, ResolutionStrategy::Minimum, 30, 4, dec!(0));
        let resolved = AtomicUsize::new(0);

        let mut scoped = entry("A", dec!(10));
        scoped.warehouse_id = Some("WH-2".to_string());
        let request = vec![entry("A", dec!(10)), entry("A", dec!(12)), scoped];
        let result = evaluator
            .evaluate(&request, None, now(), &|| {
                resolved.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        assert_eq!(ledger.call_count.load(Ordering::SeqCst), 2);
        assert_eq!(resolved.load(Ordering::SeqCst), 2);
        assert_eq!(result.len(), 3);
        match &result.slots[2].outcome {
            BatchOutcome::Priced { cost, .. } => {
                assert_eq!(cost.cost_net, dec!(7));
                assert_eq!(cost.warehouse_id.as_deref(), Some("WH-2"));
            }
            other => panic!("Expected a priced slot, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_cap_is_respected() {
        let mut ledger = MockLedger::new(Vec::new());
        let request: Vec<BatchEntry> = (0..10)
            .map(|i| {
                ledger.delays_ms.insert(format!("P{i}"), 50);
                entry(&format!("P{i}"), dec!(1))
            })
            .collect();
        let ledger = Arc::new(ledger);
        let resolver = resolver(Arc::clone(&ledger), 1_000);
        let evaluator =
            BatchEvaluator::new(&resolver, ResolutionStrategy::Latest, 30, 3, dec!(0));

        let result = evaluator.evaluate(&request, None, now(), &|| ()).await;

        assert_eq!(result.len(), 10);
        assert_eq!(ledger.call_count.load(Ordering::SeqCst), 10);
        assert!(ledger.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_warehouse_applies_to_entries_without_one() {
        let ledger = Arc::new(MockLedger::new(vec![
            purchase("A", "WH-1", dec!(5)),
            purchase("A", "WH-2", dec!(9)),
        ]));
        let resolver = resolver(Arc::clone(&ledger), 1_000);
        let evaluator =
            BatchEvaluator::new(&resolver, ResolutionStrategy::Latest, 30, 2, dec!(0));

        let result = evaluator
            .evaluate(&[entry("A", dec!(10))], Some("WH-1"), now(), &|| ())
            .await;
        assert_eq!(result.slots[0].warehouse_id.as_deref(), Some("WH-1"));
        match &result.slots[0].outcome {
            BatchOutcome::Priced { cost, .. } => assert_eq!(cost.cost_net, dec!(5)),
            other => panic!("Expected a priced slot, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_evaluation_is_byte_identical() {
        let ledger = Arc::new(
            MockLedger::new(vec![
                purchase("A", "WH-1", dec!(3.33)),
                purchase("B", "WH-1", dec!(1.10)),
            ])
            .with_delay("A", 40)
            .with_delay("B", 5),
        );
        let resolver = resolver(Arc::clone(&ledger), 1_000);
        let evaluator =
            BatchEvaluator::new(&resolver, ResolutionStrategy::Average, 30, 4, dec!(10));
        let request = vec![entry("A", dec!(4.99)), entry("X", dec!(1)), entry("B", dec!(1.25))];

        let first = evaluator.evaluate(&request, None, now(), &|| ()).await;
        let second = evaluator.evaluate(&request, None, now(), &|| ()).await;

        assert_eq!(
            serde_json::to_vec(&first.rounded()).unwrap(),
            serde_json::to_vec(&second.rounded()).unwrap()
        );
    }

    #[test]
    fn test_rounded_slot_serialization() {
        let result = BatchResult {
            slots: vec![
                BatchSlot {
                    index: 0,
                    product_id: "A".to_string(),
                    warehouse_id: None,
                    outcome: BatchOutcome::Priced {
                        margin: calculate(dec!(3), dec!(2)).unwrap(),
                        cost: ResolvedCost {
                            product_id: "A".to_string(),
                            warehouse_id: None,
                            cost_net: dec!(2),
                            strategy_used: ResolutionStrategy::Latest,
                            records_considered: 1,
                            timeframe_days: 30,
                        },
                        meets_minimum: true,
                    },
                },
                BatchSlot {
                    index: 1,
                    product_id: "B".to_string(),
                    warehouse_id: None,
                    outcome: BatchOutcome::NotFound,
                },
            ],
        };

        let json = serde_json::to_value(result.rounded()).unwrap();
        assert_eq!(json["slots"][0]["status"], "priced");
        assert_eq!(json["slots"][0]["margin"]["margin_percent"], "33.3");
        assert_eq!(json["slots"][0]["cost"]["cost_net"], "2.00");
        assert_eq!(json["slots"][1]["status"], "not_found");
        assert_eq!(json["slots"][1]["index"], 1);
    }

    #[test]
    fn test_entry_requires_decimal_strings() {
        let parsed: Vec<BatchEntry> =
            serde_yaml::from_str("- product_id: A\n  sell_net: \"12.30\"\n").unwrap();
        assert_eq!(parsed[0].sell_net, dec!(12.30));
        assert!(parsed[0].warehouse_id.is_none());
    }
}
