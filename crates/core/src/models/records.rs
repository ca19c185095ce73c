use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Tick size of every record the daily pipeline produces.
pub const DAILY_TICK_SIZE: &str = "1d";

/// One row of the `asset_price` table, keyed by `(asset_id, tick_size, timestamp)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPriceRecord {
    pub asset_id: i64,
    pub asset_ticker: String,
    pub tick_size: String,
    pub timestamp: NaiveDate,
    pub closing_price: Option<f64>,
}

/// One row of the `asset_daily_metrics` table, keyed by `(asset_id, tick_size, timestamp)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetDailyMetricRecord {
    pub asset_id: i64,
    pub asset_ticker: String,
    pub tick_size: String,
    pub timestamp: NaiveDate,
    pub market_cap: Option<f64>,
    pub trading_volume_24h: Option<f64>,
}

/// Both record sets produced by one run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordSet {
    pub asset_prices: Vec<AssetPriceRecord>,
    pub daily_metrics: Vec<AssetDailyMetricRecord>,
}
