use chrono::NaiveTime;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

use crate::errors::CoreError;
use crate::models::asset::AssetMetadata;
use crate::models::price::{PriceMatrix, PricePoint, PriceSeries};
use crate::models::report::{AssetClassReport, AssetReport, PortfolioDocument, StrategyReport};
use crate::models::settings::RebalancePolicy;
use crate::models::strategy::{PortfolioCatalog, StrategyDefinition};
use crate::models::valuation::ValuationResult;
use crate::models::weights::{AssetClass, AssetWeights};
use crate::services::valuation_service::{
    annual_roi_from_prices, annualize_roi, annualized_volatility, last_24h_change,
    ValuationService,
};

/// Timestamp format of `historicalRoi` keys.
pub const ROI_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Composes asset-class sub-portfolios into the user-facing strategies.
///
/// Each class basket is valued on the asset price matrix. The class value
/// series then act as "assets" of a second valuation, one per strategy.
pub struct AssemblyService {
    valuation_service: ValuationService,
}

impl AssemblyService {
    pub fn new() -> Self {
        Self {
            valuation_service: ValuationService::new(),
        }
    }

    /// Value every class basket and collect the results into a class-level
    /// matrix keyed by [`AssetClass::key`].
    pub fn class_values(
        &self,
        catalog: &PortfolioCatalog,
        prices: &PriceMatrix,
        policy: &RebalancePolicy,
    ) -> Result<PriceMatrix, CoreError> {
        let mut columns = BTreeMap::new();
        for (class, weights) in &catalog.asset_classes {
            let result =
                self.valuation_service
                    .simulate(weights, prices, policy.period_for(*class))?;
            columns.insert(class.key().to_string(), result.values);
        }
        PriceMatrix::new(prices.dates().to_vec(), columns)
    }

    /// Build the full output document for every strategy of the catalog.
    pub fn assemble(
        &self,
        catalog: &PortfolioCatalog,
        prices: &PriceMatrix,
        metadata: &[AssetMetadata],
        policy: &RebalancePolicy,
    ) -> Result<PortfolioDocument, CoreError> {
        let class_values = self.class_values(catalog, prices, policy)?;
        self.assemble_with_class_values(catalog, prices, &class_values, metadata, policy)
    }

    /// Same as [`Self::assemble`] over class values computed beforehand.
    pub fn assemble_with_class_values(
        &self,
        catalog: &PortfolioCatalog,
        prices: &PriceMatrix,
        class_values: &PriceMatrix,
        metadata: &[AssetMetadata],
        policy: &RebalancePolicy,
    ) -> Result<PortfolioDocument, CoreError> {
        let metadata: HashMap<&str, &AssetMetadata> =
            metadata.iter().map(|m| (m.ticker.as_str(), m)).collect();

        let mut strategies = BTreeMap::new();
        for strategy in &catalog.strategies {
            let report = self.strategy_report(
                strategy,
                catalog,
                prices,
                class_values,
                &metadata,
                policy.strategy,
            )?;
            info!(
                strategy = %strategy.name,
                annual_roi = report.annual_roi,
                "assembled strategy"
            );
            strategies.insert(strategy.name.clone(), report);
        }
        Ok(PortfolioDocument { strategies })
    }

    fn strategy_report(
        &self,
        strategy: &StrategyDefinition,
        catalog: &PortfolioCatalog,
        prices: &PriceMatrix,
        class_values: &PriceMatrix,
        metadata: &HashMap<&str, &AssetMetadata>,
        rebalance_period: i64,
    ) -> Result<StrategyReport, CoreError> {
        let valuation = self.valuation_service.simulate(
            &strategy.weights.as_asset_weights(),
            class_values,
            rebalance_period,
        )?;

        let final_roi = valuation.final_roi().unwrap_or(0.0);
        let annual_roi = annualize_roi(final_roi, valuation.len())?;
        let values = value_series(&strategy.name, &valuation)?;
        let volatility_pct = annualized_volatility(&values)? * 100.0;

        let historical_roi = valuation
            .dates
            .iter()
            .zip(valuation.roi())
            .map(|(date, r)| {
                let ts = date.and_time(NaiveTime::MIN).format(ROI_TIMESTAMP_FORMAT);
                (ts.to_string(), r)
            })
            .collect();

        let mut asset_classes = BTreeMap::new();
        for class in strategy.weights.active_classes() {
            let weights = catalog.asset_classes.get(&class).ok_or_else(|| {
                CoreError::Config(format!(
                    "strategy {} uses asset class {class} which has no basket",
                    strategy.name
                ))
            })?;
            let report = AssetClassReport {
                portfolio_percentage: strategy.weights.get(class) * 100.0,
                assets: asset_reports(class, weights, prices, metadata)?,
            };
            asset_classes.insert(class, report);
        }

        Ok(StrategyReport {
            fullname: strategy.full_name.clone(),
            description: strategy.description.clone(),
            asset_classes,
            historical_roi,
            annual_roi,
            annual_roi_range: [
                annual_roi - 2.0 * volatility_pct,
                annual_roi + 2.0 * volatility_pct,
            ],
        })
    }
}

impl Default for AssemblyService {
    fn default() -> Self {
        Self::new()
    }
}

fn asset_reports(
    class: AssetClass,
    weights: &AssetWeights,
    prices: &PriceMatrix,
    metadata: &HashMap<&str, &AssetMetadata>,
) -> Result<Vec<AssetReport>, CoreError> {
    weights
        .iter()
        .map(|(ticker, weight)| {
            let meta = metadata.get(ticker).ok_or_else(|| {
                CoreError::UnknownAsset(format!("{ticker} ({class}) has no metadata"))
            })?;
            let series = prices.series(ticker)?;
            let last_price = series.points().last().map(|p| p.price).ok_or_else(|| {
                CoreError::InsufficientData(format!("no prices for {ticker}"))
            })?;

            Ok(AssetReport {
                ticker: ticker.to_string(),
                fullname: meta.name.clone(),
                asset_id: meta.asset_id,
                annual_roi: annual_roi_from_prices(&series)?,
                last_price,
                last_24h_percent_change: last_24h_change(&series)?,
                portfolio_percentage: weight * 100.0,
            })
        })
        .collect()
}

fn value_series(name: &str, valuation: &ValuationResult) -> Result<PriceSeries, CoreError> {
    let points = valuation
        .dates
        .iter()
        .zip(&valuation.values)
        .map(|(&date, &price)| PricePoint { date, price })
        .collect();
    PriceSeries::new(name, points)
}
