use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::warn;

use crate::errors::CoreError;
use crate::models::asset::{AssetMetadata, DailyMetricPoint};
use crate::models::price::PriceMatrix;
use crate::models::records::{AssetDailyMetricRecord, AssetPriceRecord};
use crate::models::table::{LongTable, WideTable};
use crate::services::reshape_service::ReshapeService;

pub const ENTITY_COLUMN: &str = "asset_ticker";
pub const CLOSING_PRICE_COLUMN: &str = "closing_price";
pub const MARKET_CAP_COLUMN: &str = "market_cap";
pub const TRADING_VOLUME_COLUMN: &str = "trading_volume_24h";

/// Turns wide price and metric tables into the long record sets that are persisted.
pub struct RecordService {
    reshape_service: ReshapeService,
}

impl RecordService {
    pub fn new() -> Self {
        Self {
            reshape_service: ReshapeService::new(),
        }
    }

    /// One `asset_price` record per (date, ticker) of the matrix.
    ///
    /// Tickers without metadata have no asset id and are dropped with a warning.
    pub fn price_records(
        &self,
        prices: &PriceMatrix,
        metadata: &[AssetMetadata],
        tick_size: &str,
    ) -> Vec<AssetPriceRecord> {
        let ids = asset_ids(metadata);
        warn_unmatched(prices.tickers(), &ids);

        let long = self.reshape_service.to_long(
            &WideTable::from(prices),
            ENTITY_COLUMN,
            CLOSING_PRICE_COLUMN,
        );
        long.rows
            .into_iter()
            .filter_map(|row| {
                let asset_id = *ids.get(row.entity.as_str())?;
                Some(AssetPriceRecord {
                    asset_id,
                    asset_ticker: row.entity,
                    tick_size: tick_size.to_string(),
                    timestamp: row.timestamp,
                    closing_price: row.value,
                })
            })
            .collect()
    }

    /// One `asset_daily_metrics` record per (date, ticker) observed for any asset.
    ///
    /// Market cap and volume are reshaped separately and joined on
    /// `(timestamp, asset_ticker)`. Dates an asset has no data for are
    /// recorded with null metrics.
    pub fn daily_metric_records(
        &self,
        metrics: &BTreeMap<String, Vec<DailyMetricPoint>>,
        metadata: &[AssetMetadata],
        tick_size: &str,
    ) -> Result<Vec<AssetDailyMetricRecord>, CoreError> {
        let ids = asset_ids(metadata);
        warn_unmatched(metrics.keys().map(String::as_str), &ids);

        let market_cap = self.reshape_service.to_long(
            &metric_table(metrics, |p| p.market_cap)?,
            ENTITY_COLUMN,
            MARKET_CAP_COLUMN,
        );
        let volume = self.reshape_service.to_long(
            &metric_table(metrics, |p| p.trading_volume_24h)?,
            ENTITY_COLUMN,
            TRADING_VOLUME_COLUMN,
        );

        let volume_by_key: HashMap<(NaiveDate, &str), Option<f64>> = volume
            .rows
            .iter()
            .map(|r| ((r.timestamp, r.entity.as_str()), r.value))
            .collect();

        Ok(join_metrics(market_cap, &volume_by_key, &ids, tick_size))
    }
}

impl Default for RecordService {
    fn default() -> Self {
        Self::new()
    }
}

fn asset_ids(metadata: &[AssetMetadata]) -> HashMap<&str, i64> {
    metadata
        .iter()
        .map(|m| (m.ticker.as_str(), m.asset_id))
        .collect()
}

fn warn_unmatched<'a>(tickers: impl Iterator<Item = &'a str>, ids: &HashMap<&str, i64>) {
    let missing: HashSet<&str> = tickers.filter(|t| !ids.contains_key(t)).collect();
    if !missing.is_empty() {
        let mut missing: Vec<&str> = missing.into_iter().collect();
        missing.sort_unstable();
        warn!(?missing, "no asset metadata for tickers, records dropped");
    }
}

/// Wide table of one metric over the union of all observed dates.
fn metric_table(
    metrics: &BTreeMap<String, Vec<DailyMetricPoint>>,
    field: impl Fn(&DailyMetricPoint) -> Option<f64>,
) -> Result<WideTable, CoreError> {
    let index: Vec<NaiveDate> = metrics
        .values()
        .flatten()
        .map(|p| p.date)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut columns = BTreeMap::new();
    for (ticker, points) in metrics {
        let by_date: HashMap<NaiveDate, Option<f64>> =
            points.iter().map(|p| (p.date, field(p))).collect();
        let values = index
            .iter()
            .map(|d| by_date.get(d).copied().flatten())
            .collect();
        columns.insert(ticker.clone(), values);
    }
    WideTable::new(index, columns)
}

fn join_metrics(
    market_cap: LongTable,
    volume_by_key: &HashMap<(NaiveDate, &str), Option<f64>>,
    ids: &HashMap<&str, i64>,
    tick_size: &str,
) -> Vec<AssetDailyMetricRecord> {
    market_cap
        .rows
        .into_iter()
        .filter_map(|row| {
            let asset_id = *ids.get(row.entity.as_str())?;
            let trading_volume_24h = volume_by_key
                .get(&(row.timestamp, row.entity.as_str()))
                .copied()
                .flatten();
            Some(AssetDailyMetricRecord {
                asset_id,
                asset_ticker: row.entity,
                tick_size: tick_size.to_string(),
                timestamp: row.timestamp,
                market_cap: row.value,
                trading_volume_24h,
            })
        })
        .collect()
}
