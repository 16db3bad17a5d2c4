//! Pricing domain: margin arithmetic, cost resolution and their compositions

pub mod batch;
pub mod config;
pub mod error;
pub mod ledger;
pub mod log;
pub mod margin;
pub mod money;
pub mod reconcile;
pub mod resolver;
pub mod service;
pub mod snapshot;
pub mod target;

// Re-export main types for cleaner imports
pub use error::PricingError;
pub use ledger::{LedgerQuery, PurchaseLedger, PurchaseRecord};
pub use margin::MarginResult;
pub use resolver::{CostKey, Lookup, Resolution, ResolutionStrategy, ResolvedCost};
pub use service::PricingService;
pub use snapshot::{CostSnapshot, SnapshotEntry};
