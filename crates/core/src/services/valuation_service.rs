use tracing::debug;

use crate::errors::CoreError;
use crate::models::price::{PriceMatrix, PriceSeries};
use crate::models::valuation::{ValuationResult, INITIAL_INVESTMENT};
use crate::models::weights::AssetWeights;

/// Days per year used for every annualization. Calendar days, not trading days.
pub const DAYS_PER_YEAR: f64 = 365.0;

/// Simulates the daily value of a weighted portfolio under periodic rebalancing.
///
/// Pure computation over an immutable price matrix, no I/O.
pub struct ValuationService;

impl ValuationService {
    pub fn new() -> Self {
        Self
    }

    /// Simulate a portfolio of `weights` over every date of `prices`.
    ///
    /// Starts with [`INITIAL_INVESTMENT`] split by weight. Each day every
    /// allocation drifts with its asset's price ratio. When
    /// `rebalance_period > 0` and the day index is a multiple of it, the
    /// allocations are reset to the target weights of that day's total.
    /// A period of zero or less is buy-and-hold.
    ///
    /// Fails with `ZeroPrice` if any weighted asset has a non-positive or
    /// non-finite price anywhere in the window.
    pub fn simulate(
        &self,
        weights: &AssetWeights,
        prices: &PriceMatrix,
        rebalance_period: i64,
    ) -> Result<ValuationResult, CoreError> {
        if prices.is_empty() {
            return Err(CoreError::InsufficientData(
                "cannot value a portfolio over an empty price matrix".into(),
            ));
        }

        let mut legs: Vec<(f64, &[f64])> = Vec::with_capacity(weights.len());
        for (ticker, weight) in weights.iter() {
            let column = prices
                .column(ticker)
                .ok_or_else(|| CoreError::UnknownAsset(ticker.to_string()))?;
            ensure_positive(ticker, prices, column)?;
            legs.push((weight, column));
        }

        let mut allocation: Vec<f64> = legs.iter().map(|(w, _)| INITIAL_INVESTMENT * w).collect();
        let mut values = Vec::with_capacity(prices.len());
        values.push(INITIAL_INVESTMENT);

        for day in 1..prices.len() {
            for (alloc, (_, column)) in allocation.iter_mut().zip(&legs) {
                *alloc *= column[day] / column[day - 1];
            }
            let total: f64 = allocation.iter().sum();
            values.push(total);

            if rebalance_period > 0 && day as i64 % rebalance_period == 0 {
                for (alloc, (weight, _)) in allocation.iter_mut().zip(&legs) {
                    *alloc = total * weight;
                }
            }
        }

        let result = ValuationResult {
            dates: prices.dates().to_vec(),
            values,
        };
        debug!(
            assets = legs.len(),
            days = result.len(),
            rebalance_period,
            final_value = result.final_value().unwrap_or(INITIAL_INVESTMENT),
            "simulated portfolio"
        );
        Ok(result)
    }
}

impl Default for ValuationService {
    fn default() -> Self {
        Self::new()
    }
}

/// Annualize a ROI (percent) observed over `num_days` days.
///
/// `((1 + roi/100)^(365/num_days) - 1) * 100`, compounding per calendar day.
pub fn annualize_roi(roi_pct: f64, num_days: usize) -> Result<f64, CoreError> {
    if num_days == 0 {
        return Err(CoreError::InsufficientData(
            "cannot annualize a return observed over zero days".into(),
        ));
    }
    let num_years = num_days as f64 / DAYS_PER_YEAR;
    let growth = 1.0 + roi_pct / 100.0;
    Ok((growth.powf(1.0 / num_years) - 1.0) * 100.0)
}

/// Standard deviation of daily log returns, scaled by `sqrt(365)`.
///
/// Population standard deviation. Fewer than two points yield `0.0`.
pub fn annualized_volatility(series: &PriceSeries) -> Result<f64, CoreError> {
    check_series_positive(series)?;
    let prices = series.prices();
    if prices.len() < 2 {
        return Ok(0.0);
    }

    let log_returns: Vec<f64> = prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
    let n = log_returns.len() as f64;
    let mean = log_returns.iter().sum::<f64>() / n;
    let variance = log_returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    Ok(variance.sqrt() * DAYS_PER_YEAR.sqrt())
}

/// Percent change between the last two prices. `0.0` with fewer than two points.
pub fn last_24h_change(series: &PriceSeries) -> Result<f64, CoreError> {
    let points = series.points();
    if points.len() < 2 {
        return Ok(0.0);
    }
    let today = &points[points.len() - 1];
    let previous = &points[points.len() - 2];
    if !(previous.price > 0.0 && previous.price.is_finite()) {
        return Err(CoreError::ZeroPrice {
            ticker: series.ticker().to_string(),
            date: previous.date,
        });
    }
    Ok((today.price - previous.price) / previous.price * 100.0)
}

/// Annualized ROI of holding the asset from the first to the last point.
pub fn annual_roi_from_prices(series: &PriceSeries) -> Result<f64, CoreError> {
    check_series_positive(series)?;
    let (Some(first), Some(last)) = (series.points().first(), series.points().last()) else {
        return Err(CoreError::InsufficientData(format!(
            "no prices for {}",
            series.ticker()
        )));
    };
    let roi = (last.price / first.price - 1.0) * 100.0;
    annualize_roi(roi, series.len())
}

fn ensure_positive(ticker: &str, prices: &PriceMatrix, column: &[f64]) -> Result<(), CoreError> {
    match column.iter().position(|p| !(*p > 0.0 && p.is_finite())) {
        Some(idx) => Err(CoreError::ZeroPrice {
            ticker: ticker.to_string(),
            date: prices.dates()[idx],
        }),
        None => Ok(()),
    }
}

fn check_series_positive(series: &PriceSeries) -> Result<(), CoreError> {
    match series
        .points()
        .iter()
        .find(|p| !(p.price > 0.0 && p.price.is_finite()))
    {
        Some(p) => Err(CoreError::ZeroPrice {
            ticker: series.ticker().to_string(),
            date: p.date,
        }),
        None => Ok(()),
    }
}
