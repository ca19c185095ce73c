use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// What kind of series the store delivers for an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    /// Coins and tokens. The price series holds daily closing prices.
    Coin,
    /// Lending protocols. The price series holds annual lending rates in percent;
    /// preprocessing turns them into a compounding return index.
    LendingProtocol,
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetType::Coin => write!(f, "coin"),
            AssetType::LendingProtocol => write!(f, "lending_protocol"),
        }
    }
}

/// One row of the asset metadata store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub asset_id: i64,

    /// Lowercase ticker used as the column key everywhere (e.g., "btc", "aave")
    #[serde(rename = "asset_ticker")]
    pub ticker: String,

    /// Display name (e.g., "Bitcoin", "Compound")
    #[serde(rename = "asset_name")]
    pub name: String,

    pub asset_type: AssetType,
}

impl AssetMetadata {
    pub fn new(
        asset_id: i64,
        ticker: impl Into<String>,
        name: impl Into<String>,
        asset_type: AssetType,
    ) -> Self {
        Self {
            asset_id,
            ticker: ticker.into().to_lowercase(),
            name: name.into(),
            asset_type,
        }
    }

    pub fn coin(asset_id: i64, ticker: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(asset_id, ticker, name, AssetType::Coin)
    }

    pub fn lending_protocol(
        asset_id: i64,
        ticker: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::new(asset_id, ticker, name, AssetType::LendingProtocol)
    }
}

/// Daily market metrics for one asset on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetricPoint {
    pub date: NaiveDate,
    pub market_cap: Option<f64>,
    pub trading_volume_24h: Option<f64>,
}
