use async_trait::async_trait;
use std::collections::HashMap;

use crate::errors::CoreError;
use crate::models::asset::{AssetMetadata, DailyMetricPoint};
use crate::models::price::PriceSeries;

use super::traits::AssetDataStore;

/// Store holding everything in memory. Used by tests and for replaying a
/// previously captured snapshot.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAssetStore {
    metadata: Vec<AssetMetadata>,
    prices: HashMap<String, PriceSeries>,
    daily_metrics: HashMap<String, Vec<DailyMetricPoint>>,
}

impl InMemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an asset and its daily series.
    pub fn with_asset(mut self, metadata: AssetMetadata, series: PriceSeries) -> Self {
        let series = series.renamed(metadata.ticker.clone());
        self.prices.insert(metadata.ticker.clone(), series);
        self.metadata.retain(|m| m.ticker != metadata.ticker);
        self.metadata.push(metadata);
        self
    }

    pub fn with_daily_metrics(
        mut self,
        ticker: impl Into<String>,
        points: Vec<DailyMetricPoint>,
    ) -> Self {
        self.daily_metrics.insert(ticker.into(), points);
        self
    }
}

#[async_trait]
impl AssetDataStore for InMemoryAssetStore {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn get_all_asset_metadata(&self) -> Result<Vec<AssetMetadata>, CoreError> {
        Ok(self.metadata.clone())
    }

    async fn get_asset_price(&self, ticker: &str) -> Result<PriceSeries, CoreError> {
        self.prices
            .get(ticker)
            .cloned()
            .ok_or_else(|| CoreError::UnknownAsset(ticker.to_string()))
    }

    /// Assets without recorded metrics yield an empty list.
    async fn get_daily_metrics(&self, ticker: &str) -> Result<Vec<DailyMetricPoint>, CoreError> {
        if !self.prices.contains_key(ticker) {
            return Err(CoreError::UnknownAsset(ticker.to_string()));
        }
        Ok(self.daily_metrics.get(ticker).cloned().unwrap_or_default())
    }
}
