use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

use crate::errors::CoreError;
use crate::models::asset::{AssetMetadata, AssetType};
use crate::models::price::{PriceMatrix, PriceSeries};
use crate::models::settings::EngineConfig;
use crate::services::imputation_service::SeriesImputer;
use crate::services::valuation_service::DAYS_PER_YEAR;

/// Builds the aligned price matrix the valuation engine runs on from the raw
/// series delivered by the store.
///
/// Coins are filtered to those covering the history window, merged and
/// smoothed. Lending rates are imputed back to the start of the window,
/// smoothed, and turned into a compounding return index. Both halves are
/// inner-joined on date.
pub struct PreprocessingService {
    imputer: SeriesImputer,
}

impl PreprocessingService {
    pub fn new(imputer: SeriesImputer) -> Self {
        Self { imputer }
    }

    pub fn build_price_matrix(
        &self,
        config: &EngineConfig,
        metadata: &[AssetMetadata],
        series: &[PriceSeries],
    ) -> Result<PriceMatrix, CoreError> {
        let types: HashMap<&str, AssetType> = metadata
            .iter()
            .map(|m| (m.ticker.as_str(), m.asset_type))
            .collect();

        let mut coins = Vec::new();
        let mut lending_rates = Vec::new();
        for s in series {
            match types.get(s.ticker()) {
                Some(AssetType::Coin) => coins.push(s),
                Some(AssetType::LendingProtocol) => lending_rates.push(s),
                None => warn!(ticker = s.ticker(), "no metadata for series, skipping"),
            }
        }

        let coins: Vec<PriceSeries> = coins
            .into_iter()
            .filter(|s| match s.first_date() {
                Some(first) if first <= config.start_date => true,
                Some(first) => {
                    warn!(
                        ticker = s.ticker(),
                        %first,
                        start_date = %config.start_date,
                        "coin history starts after the start date, skipping"
                    );
                    false
                }
                None => {
                    warn!(ticker = s.ticker(), "empty coin series, skipping");
                    false
                }
            })
            .cloned()
            .collect();

        if coins.is_empty() {
            return Err(CoreError::InsufficientData(format!(
                "no coin has price history starting on or before {}",
                config.start_date
            )));
        }
        let coin_prices = merge_series(&coins, config.rolling_window)?;
        info!(
            coins = coin_prices.columns().len(),
            days = coin_prices.len(),
            "merged coin prices"
        );

        let mut prices = if lending_rates.is_empty() {
            coin_prices
        } else {
            let lending_returns = self.lending_returns(config, &coin_prices, &lending_rates)?;
            coin_prices.join(&lending_returns)?
        };
        prices = prices.rename(&config.ticker_aliases)?;

        if prices.is_empty() {
            return Err(CoreError::InsufficientData(
                "coin prices and lending returns share no dates".into(),
            ));
        }
        info!(
            assets = prices.columns().len(),
            days = prices.len(),
            "built price matrix"
        );
        Ok(prices)
    }

    /// Impute, merge and compound lending rates into return indices.
    fn lending_returns(
        &self,
        config: &EngineConfig,
        coin_prices: &PriceMatrix,
        lending_rates: &[&PriceSeries],
    ) -> Result<PriceMatrix, CoreError> {
        let reference_tickers: Vec<&str> =
            config.reference_tickers.iter().map(String::as_str).collect();
        let reference = coin_prices.select(&reference_tickers)?;

        let mut imputed = Vec::with_capacity(lending_rates.len());
        for rates in lending_rates {
            if rates.is_empty() {
                warn!(ticker = rates.ticker(), "empty lending rate series, skipping");
                continue;
            }
            let result = self.imputer.impute(
                &reference,
                rates,
                config.start_date,
                config.training_end_date,
            )?;
            if result.is_imputed() {
                info!(
                    ticker = rates.ticker(),
                    imputed_days = result.imputed_days,
                    "imputed lending rates"
                );
            }
            imputed.push(result.series);
        }

        let rates = merge_series(&imputed, config.rolling_window)?;
        rates_to_returns(&rates)
    }
}

impl Default for PreprocessingService {
    fn default() -> Self {
        Self::new(SeriesImputer::default())
    }
}

/// Inner-join series on date, then apply a trailing rolling mean of `window` rows.
pub fn merge_series(series: &[PriceSeries], window: usize) -> Result<PriceMatrix, CoreError> {
    Ok(PriceMatrix::align(series)?.rolling_mean(window))
}

/// Compound annual lending rates (percent) into a return index starting at 1.0.
///
/// The rate on day `i` earns `(1 + rate/100)^(1/365) - 1` until day `i + 1`.
pub fn rates_to_returns(rates: &PriceMatrix) -> Result<PriceMatrix, CoreError> {
    let mut columns = BTreeMap::new();
    for (ticker, values) in rates.columns() {
        if let Some(idx) = values.iter().position(|r| !(r.is_finite() && *r > -100.0)) {
            return Err(CoreError::InvalidSeries(format!(
                "{ticker}: lending rate {} on {} is not a valid annual rate",
                values[idx],
                rates.dates()[idx]
            )));
        }

        let mut current = 1.0;
        let index: Vec<f64> = values
            .iter()
            .map(|rate| {
                let value = current;
                current *= (1.0 + rate / 100.0).powf(1.0 / DAYS_PER_YEAR);
                value
            })
            .collect();
        columns.insert(ticker.clone(), index);
    }
    PriceMatrix::new(rates.dates().to_vec(), columns)
}
