use crate::core::resolver::ResolutionStrategy;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};
use tracing::debug;

/// Defaults and limits for the pricing operations.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PricingSettings {
    pub default_strategy: ResolutionStrategy,
    pub default_timeframe_days: u32,
    pub discrepancy_tolerance_percent: Decimal,
    pub minimum_acceptable_margin_percent: Decimal,
    /// Upper bound on ledger queries in flight during a batch.
    pub batch_concurrency: usize,
    pub ledger_timeout_ms: u64,
}

impl Default for PricingSettings {
    fn default() -> Self {
        PricingSettings {
            default_strategy: ResolutionStrategy::Latest,
            default_timeframe_days: 90,
            discrepancy_tolerance_percent: dec!(0.5),
            minimum_acceptable_margin_percent: dec!(15),
            batch_concurrency: 8,
            ledger_timeout_ms: 5_000,
        }
    }
}

impl PricingSettings {
    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_millis(self.ledger_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct HttpLedgerConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FileLedgerConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct LedgerConfig {
    pub http: Option<HttpLedgerConfig>,
    pub file: Option<FileLedgerConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub pricing: PricingSettings,
    #[serde(default)]
    pub ledger: LedgerConfig,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "margo", "margo")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    /// Directory holding the captured cost snapshot.
    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "margo", "margo")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
