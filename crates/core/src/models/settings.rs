use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::errors::CoreError;

use super::records::DAILY_TICK_SIZE;
use super::strategy::PortfolioCatalog;
use super::weights::AssetClass;

/// How often each simulated portfolio is brought back to its target weights.
///
/// Periods are in days. Zero or negative means buy-and-hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebalancePolicy {
    /// Rebalance period of each asset-class basket
    pub asset_classes: BTreeMap<AssetClass, i64>,

    /// Rebalance period of the strategies blending the classes
    pub strategy: i64,
}

impl RebalancePolicy {
    /// Period for a basket. Unlisted classes are held without rebalancing.
    pub fn period_for(&self, class: AssetClass) -> i64 {
        self.asset_classes.get(&class).copied().unwrap_or(0)
    }
}

impl Default for RebalancePolicy {
    fn default() -> Self {
        Self {
            asset_classes: BTreeMap::from([
                (AssetClass::LendingProtocols, 1),
                (AssetClass::BtcEth, 90),
                (AssetClass::AltCoins, 90),
            ]),
            strategy: 90,
        }
    }
}

/// Engine configuration, loaded from a JSON file. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Earliest date the price history should cover
    pub start_date: NaiveDate,

    /// Data on or after this date is held out when fitting the imputation model
    pub training_end_date: NaiveDate,

    /// Minimum number of training rows before a regression is attempted
    pub min_training_rows: usize,

    /// Trailing rolling-mean window applied to merged series (1 disables smoothing)
    pub rolling_window: usize,

    /// Coin tickers used as regressors when imputing young lending series
    pub reference_tickers: Vec<String>,

    /// Store ticker → ticker used in baskets
    pub ticker_aliases: HashMap<String, String>,

    pub rebalance: RebalancePolicy,

    /// Tick size written into persisted records
    pub tick_size: String,

    /// Directory receiving the output document and record tables
    pub output_dir: PathBuf,

    /// File name prefix of the output document
    pub document_prefix: String,

    /// Base URL of the asset metadata/price store
    pub store_url: String,

    pub request_timeout_secs: u64,

    pub catalog: PortfolioCatalog,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2018, 11, 26).unwrap_or_default(),
            training_end_date: NaiveDate::from_ymd_opt(2021, 6, 25).unwrap_or_default(),
            min_training_rows: 100,
            rolling_window: 7,
            reference_tickers: ["btc", "eth", "usdt", "usdc"]
                .into_iter()
                .map(String::from)
                .collect(),
            ticker_aliases: HashMap::from([
                ("c.r.e.a.m.-finance".to_string(), "cream".to_string()),
                ("compound".to_string(), "comp".to_string()),
            ]),
            rebalance: RebalancePolicy::default(),
            tick_size: DAILY_TICK_SIZE.to_string(),
            output_dir: PathBuf::from("output"),
            document_prefix: "portfolio_v2".to_string(),
            store_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 30,
            catalog: PortfolioCatalog::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, CoreError> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| CoreError::Config(format!("failed to parse configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.min_training_rows == 0 {
            return Err(CoreError::Config("min_training_rows must be positive".into()));
        }
        if self.rolling_window == 0 {
            return Err(CoreError::Config("rolling_window must be at least 1".into()));
        }
        if self.reference_tickers.is_empty() {
            return Err(CoreError::Config("reference_tickers must not be empty".into()));
        }
        if self.tick_size.is_empty() {
            return Err(CoreError::Config("tick_size must not be empty".into()));
        }
        if self.document_prefix.is_empty() {
            return Err(CoreError::Config("document_prefix must not be empty".into()));
        }
        self.catalog.validate()
    }
}
