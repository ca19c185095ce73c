use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::weights::AssetClass;

/// Output document: strategy name → report. Serialized as a flat JSON object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortfolioDocument {
    pub strategies: BTreeMap<String, StrategyReport>,
}

impl PortfolioDocument {
    pub fn get(&self, name: &str) -> Option<&StrategyReport> {
        self.strategies.get(name)
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

/// Everything the presentation layer shows for one strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyReport {
    pub fullname: String,

    pub description: String,

    /// One entry per class the strategy is exposed to. Zero-weight classes are absent.
    #[serde(flatten)]
    pub asset_classes: BTreeMap<AssetClass, AssetClassReport>,

    /// `"YYYY-MM-DD HH:MM:SS"` → ROI in percent of the initial investment
    pub historical_roi: BTreeMap<String, f64>,

    /// Annualized ROI in percent
    pub annual_roi: f64,

    /// `[annual_roi - 2σ, annual_roi + 2σ]` with σ the annualized volatility in percent
    pub annual_roi_range: [f64; 2],
}

/// One asset class inside a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetClassReport {
    /// Share of the strategy held in this class, in percent
    pub portfolio_percentage: f64,

    pub assets: Vec<AssetReport>,
}

/// Descriptive analytics for one asset of a class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetReport {
    pub ticker: String,

    pub fullname: String,

    pub asset_id: i64,

    /// Annualized ROI over the observed window, in percent
    pub annual_roi: f64,

    pub last_price: f64,

    #[serde(rename = "last24hPercentChange")]
    pub last_24h_percent_change: f64,

    /// Share of the asset inside its class, in percent
    pub portfolio_percentage: f64,
}
