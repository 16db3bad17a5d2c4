pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::money::parse_amount;
use crate::core::{PricingService, ResolutionStrategy};
use crate::providers::memory_ledger::MemoryLedger;
use crate::store::memory::MemorySnapshot;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// A pricing command, with amounts still in their textual form.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Margin {
        sell: String,
        buy: String,
    },
    Quote {
        product: String,
        sell: String,
        warehouse: Option<String>,
        strategy: Option<ResolutionStrategy>,
    },
    Cost {
        product: String,
        warehouse: Option<String>,
        strategy: Option<ResolutionStrategy>,
        days: Option<u32>,
    },
    Target {
        product: Option<String>,
        margin: String,
        warehouse: Option<String>,
        cost: Option<String>,
    },
    Batch {
        file: String,
        warehouse: Option<String>,
    },
    Validate {
        product: String,
        sell: String,
        warehouse: Option<String>,
    },
    Snapshot {
        products: Vec<String>,
        warehouse: Option<String>,
    },
}

/// Builds the service handle from configuration: ledger adapter, snapshot
/// store and pricing settings.
pub fn build_service(config: &AppConfig) -> Result<PricingService> {
    let ledger = providers::open_ledger(&config.ledger)?;
    let snapshot = store::open_snapshot(config);
    Ok(PricingService::new(ledger, snapshot, config.pricing.clone()))
}

fn offline_service(config: &AppConfig) -> PricingService {
    PricingService::new(
        Arc::new(MemoryLedger::default()),
        Arc::new(MemorySnapshot::new()),
        config.pricing.clone(),
    )
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>, json: bool) -> Result<()> {
    info!("margo starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let service = || build_service(&config);
    match command {
        // Two known prices need no ledger at all
        AppCommand::Margin { sell, buy } => cli::margin::run_margin(
            &offline_service(&config),
            parse_amount("sell", &sell)?,
            parse_amount("buy", &buy)?,
            json,
        ),
        AppCommand::Quote {
            product,
            sell,
            warehouse,
            strategy,
        } => {
            cli::margin::run_quote(
                &service()?,
                &product,
                parse_amount("sell", &sell)?,
                warehouse.as_deref(),
                strategy,
                json,
            )
            .await
        }
        AppCommand::Cost {
            product,
            warehouse,
            strategy,
            days,
        } => {
            cli::cost::run_cost(&service()?, &product, warehouse.as_deref(), strategy, days, json)
                .await
        }
        AppCommand::Target {
            product,
            margin,
            warehouse,
            cost,
        } => {
            let buy_net = cost.map(|raw| parse_amount("cost", &raw)).transpose()?;
            let service = match buy_net {
                Some(_) => offline_service(&config),
                None => service()?,
            };
            cli::target::run(
                &service,
                product.as_deref(),
                parse_amount("margin", &margin)?,
                warehouse.as_deref(),
                buy_net,
                json,
            )
            .await
        }
        AppCommand::Batch { file, warehouse } => {
            cli::batch::run(&service()?, &file, warehouse.as_deref(), json).await
        }
        AppCommand::Validate {
            product,
            sell,
            warehouse,
        } => {
            cli::validate::run(
                &service()?,
                &product,
                parse_amount("sell", &sell)?,
                warehouse.as_deref(),
                json,
            )
            .await
        }
        AppCommand::Snapshot {
            products,
            warehouse,
        } => cli::cost::run_snapshot(&service()?, &products, warehouse.as_deref(), json).await,
    }
}
