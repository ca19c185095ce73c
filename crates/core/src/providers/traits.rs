use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::errors::CoreError;
use crate::models::asset::{AssetMetadata, DailyMetricPoint};
use crate::models::price::PriceSeries;

/// Trait abstraction over the asset metadata/price store the engine reads from.
///
/// The production runner talks to the store over HTTP; tests and offline runs
/// use [`super::memory::InMemoryAssetStore`]. The engine only ever sees this trait.
#[async_trait]
pub trait AssetDataStore: Send + Sync {
    /// Human-readable name of this store (for logs/errors).
    fn name(&self) -> &str;

    /// Every asset the store knows about.
    async fn get_all_asset_metadata(&self) -> Result<Vec<AssetMetadata>, CoreError>;

    /// Daily series of an asset, sorted by date.
    ///
    /// Closing prices for coins, annual lending rates in percent for lending protocols.
    async fn get_asset_price(&self, ticker: &str) -> Result<PriceSeries, CoreError>;

    /// Daily market cap and 24h volume of an asset, sorted by date.
    async fn get_daily_metrics(&self, ticker: &str) -> Result<Vec<DailyMetricPoint>, CoreError>;
}

/// Daily metrics of several assets keyed by ticker.
pub type DailyMetrics = BTreeMap<String, Vec<DailyMetricPoint>>;
