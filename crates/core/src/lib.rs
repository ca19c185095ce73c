pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

use errors::CoreError;
use models::{
    asset::{AssetMetadata, AssetType},
    price::{PriceMatrix, PriceSeries},
    records::RecordSet,
    report::PortfolioDocument,
    settings::EngineConfig,
};
use providers::traits::{AssetDataStore, DailyMetrics};
use services::{
    assembly_service::AssemblyService, imputation_service::SeriesImputer,
    preprocessing_service::PreprocessingService, record_service::RecordService,
};
use storage::manager::{SavedOutputs, StorageManager};

/// Everything pulled from the store for one run. Never mutated once loaded.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub metadata: Vec<AssetMetadata>,

    /// Raw daily series as delivered: prices for coins, annual rates for lending protocols
    pub prices: Vec<PriceSeries>,

    /// Daily market metrics of coins, keyed by store ticker
    pub daily_metrics: DailyMetrics,
}

/// Inputs of one run: configuration plus the loaded snapshot.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: EngineConfig,
    pub snapshot: Snapshot,
}

/// Everything one run computes. Nothing is persisted yet.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Aligned asset prices (lending protocols as return indices), aliased tickers
    pub price_matrix: PriceMatrix,

    /// Daily value of each asset-class basket
    pub class_values: PriceMatrix,

    pub document: PortfolioDocument,

    pub records: RecordSet,
}

/// Compute the output document and record sets from a snapshot.
///
/// Pure computation: no I/O, no shared state. Any error aborts the whole run.
pub fn run(ctx: &RunContext) -> Result<RunOutput, CoreError> {
    let config = &ctx.config;
    let snapshot = &ctx.snapshot;

    let preprocessing =
        PreprocessingService::new(SeriesImputer::new(config.min_training_rows));
    let price_matrix =
        preprocessing.build_price_matrix(config, &snapshot.metadata, &snapshot.prices)?;

    let metadata = alias_metadata(&snapshot.metadata, &config.ticker_aliases);
    // Metrics are kept only for coins that made it into the price matrix.
    let daily_metrics: DailyMetrics = snapshot
        .daily_metrics
        .iter()
        .map(|(ticker, points)| (alias(ticker, &config.ticker_aliases), points))
        .filter(|(ticker, _)| price_matrix.column(ticker).is_some())
        .map(|(ticker, points)| (ticker, points.clone()))
        .collect();

    let assembly = AssemblyService::new();
    let class_values =
        assembly.class_values(&config.catalog, &price_matrix, &config.rebalance)?;
    let document = assembly.assemble_with_class_values(
        &config.catalog,
        &price_matrix,
        &class_values,
        &metadata,
        &config.rebalance,
    )?;

    let record_service = RecordService::new();
    let records = RecordSet {
        asset_prices: record_service.price_records(&price_matrix, &metadata, &config.tick_size),
        daily_metrics: record_service.daily_metric_records(
            &daily_metrics,
            &metadata,
            &config.tick_size,
        )?,
    };

    info!(
        strategies = document.len(),
        days = price_matrix.len(),
        price_records = records.asset_prices.len(),
        metric_records = records.daily_metrics.len(),
        "run complete"
    );

    Ok(RunOutput {
        price_matrix,
        class_values,
        document,
        records,
    })
}

fn alias(ticker: &str, aliases: &HashMap<String, String>) -> String {
    aliases.get(ticker).cloned().unwrap_or_else(|| ticker.to_string())
}

fn alias_metadata(
    metadata: &[AssetMetadata],
    aliases: &HashMap<String, String>,
) -> Vec<AssetMetadata> {
    metadata
        .iter()
        .map(|m| AssetMetadata {
            ticker: alias(&m.ticker, aliases),
            ..m.clone()
        })
        .collect()
}

/// Main entry point for the portfolio returns engine.
/// Holds the configuration and wires store, computation and persistence together.
#[must_use]
pub struct ReturnsEngine {
    config: EngineConfig,
    storage: StorageManager,
}

impl std::fmt::Debug for ReturnsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReturnsEngine")
            .field("start_date", &self.config.start_date)
            .field("strategies", &self.config.catalog.strategies.len())
            .field("output_dir", &self.storage.output_dir())
            .finish()
    }
}

impl ReturnsEngine {
    /// Validate the configuration and build an engine around it.
    pub fn new(config: EngineConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let storage = StorageManager::from_config(&config);
        Ok(Self { config, storage })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    /// Pull metadata, series and coin metrics from the store.
    ///
    /// Assets whose series is empty are skipped with a warning. Any store
    /// error aborts the load.
    pub async fn load_snapshot(&self, store: &dyn AssetDataStore) -> Result<Snapshot, CoreError> {
        let metadata = store.get_all_asset_metadata().await?;
        info!(store = store.name(), assets = metadata.len(), "loaded asset metadata");

        let mut prices = Vec::with_capacity(metadata.len());
        let mut daily_metrics = BTreeMap::new();
        for asset in &metadata {
            let series = store.get_asset_price(&asset.ticker).await?;
            if series.is_empty() {
                warn!(ticker = %asset.ticker, "store returned an empty series, skipping");
                continue;
            }
            if asset.asset_type == AssetType::Coin {
                let metrics = store.get_daily_metrics(&asset.ticker).await?;
                daily_metrics.insert(asset.ticker.clone(), metrics);
            }
            prices.push(series);
        }

        Ok(Snapshot {
            metadata,
            prices,
            daily_metrics,
        })
    }

    /// Compute a run over an already loaded snapshot.
    pub fn run(&self, snapshot: Snapshot) -> Result<RunOutput, CoreError> {
        run(&RunContext {
            config: self.config.clone(),
            snapshot,
        })
    }

    /// Write the document and record tables of a successful run.
    pub fn persist(&self, output: &RunOutput) -> Result<SavedOutputs, CoreError> {
        self.storage.save(&output.document, &output.records)
    }

    /// Load, compute and persist. Nothing is written if any step fails.
    pub async fn run_once(
        &self,
        store: &dyn AssetDataStore,
    ) -> Result<(RunOutput, SavedOutputs), CoreError> {
        let snapshot = self.load_snapshot(store).await?;
        let output = self.run(snapshot)?;
        let saved = self.persist(&output)?;
        Ok((output, saved))
    }
}
