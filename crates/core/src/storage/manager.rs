use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::errors::CoreError;
use crate::models::records::{AssetDailyMetricRecord, AssetPriceRecord, RecordSet};
use crate::models::report::PortfolioDocument;
use crate::models::settings::EngineConfig;

use super::format;

/// Paths written by one successful [`StorageManager::save_outputs`].
#[derive(Debug, Clone, PartialEq)]
pub struct SavedOutputs {
    pub latest_document: PathBuf,
    pub snapshot_document: PathBuf,
    pub asset_prices: PathBuf,
    pub daily_metrics: PathBuf,
}

/// File-based persistence of the output document and record tables.
///
/// Every output is serialized before anything touches the disk, staged as a
/// temp file, and renamed into place once all staging writes succeeded.
/// Record tables are replaced wholesale on every run.
pub struct StorageManager {
    output_dir: PathBuf,
    document_prefix: String,
}

impl StorageManager {
    pub fn new(output_dir: impl Into<PathBuf>, document_prefix: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            document_prefix: document_prefix.into(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.output_dir.clone(), config.document_prefix.clone())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Persist a run stamped with the current time.
    pub fn save(
        &self,
        document: &PortfolioDocument,
        records: &RecordSet,
    ) -> Result<SavedOutputs, CoreError> {
        self.save_outputs(document, records, Utc::now())
    }

    /// Persist the document (latest + snapshot) and both record tables.
    ///
    /// Flow: serialize all → stage temp files → rename each into place.
    /// Record tables are moved first and the two documents last, so a new
    /// document is never published next to stale records. Any failure
    /// removes the temp files that were not moved yet.
    pub fn save_outputs(
        &self,
        document: &PortfolioDocument,
        records: &RecordSet,
        run_time: DateTime<Utc>,
    ) -> Result<SavedOutputs, CoreError> {
        let document_bytes = format::to_json_bytes(document, "portfolio document")?;
        let price_bytes = format::to_json_bytes(&records.asset_prices, "asset price records")?;
        let metric_bytes =
            format::to_json_bytes(&records.daily_metrics, "daily metric records")?;

        let saved = SavedOutputs {
            latest_document: self
                .output_dir
                .join(format::latest_document_name(&self.document_prefix)),
            snapshot_document: self.output_dir.join(format::snapshot_document_name(
                &self.document_prefix,
                run_time.timestamp(),
            )),
            asset_prices: self.output_dir.join(format::ASSET_PRICE_FILE),
            daily_metrics: self.output_dir.join(format::ASSET_DAILY_METRICS_FILE),
        };
        let writes: [(&Path, &[u8]); 4] = [
            (saved.asset_prices.as_path(), price_bytes.as_slice()),
            (saved.daily_metrics.as_path(), metric_bytes.as_slice()),
            (saved.snapshot_document.as_path(), document_bytes.as_slice()),
            (saved.latest_document.as_path(), document_bytes.as_slice()),
        ];

        std::fs::create_dir_all(&self.output_dir)?;

        let mut staged = Vec::with_capacity(writes.len());
        for (target, bytes) in writes {
            let temp = temp_path(target);
            if let Err(e) = std::fs::write(&temp, bytes) {
                remove_staged(&staged);
                let _ = std::fs::remove_file(&temp);
                return Err(CoreError::FileIO(format!(
                    "Failed to write {}: {e}",
                    temp.display()
                )));
            }
            staged.push((temp, target));
        }

        for (i, (temp, target)) in staged.iter().enumerate() {
            if let Err(e) = std::fs::rename(temp, target) {
                remove_staged(&staged[i..]);
                return Err(CoreError::FileIO(format!(
                    "Failed to move {} into place: {e}",
                    target.display()
                )));
            }
        }

        info!(
            dir = %self.output_dir.display(),
            price_records = records.asset_prices.len(),
            metric_records = records.daily_metrics.len(),
            "saved run outputs"
        );
        Ok(saved)
    }

    /// The document written by the most recent run.
    pub fn load_latest_document(&self) -> Result<PortfolioDocument, CoreError> {
        self.load_json(&format::latest_document_name(&self.document_prefix))
    }

    pub fn load_price_records(&self) -> Result<Vec<AssetPriceRecord>, CoreError> {
        self.load_json(format::ASSET_PRICE_FILE)
    }

    pub fn load_daily_metric_records(&self) -> Result<Vec<AssetDailyMetricRecord>, CoreError> {
        self.load_json(format::ASSET_DAILY_METRICS_FILE)
    }

    fn load_json<T: DeserializeOwned>(&self, file_name: &str) -> Result<T, CoreError> {
        let bytes = std::fs::read(self.output_dir.join(file_name))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            CoreError::Deserialization(format!("Failed to parse {file_name}: {e}"))
        })
    }
}

fn temp_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format::temp_name(&name))
}

fn remove_staged(staged: &[(PathBuf, &Path)]) {
    for (temp, _) in staged {
        if let Err(e) = std::fs::remove_file(temp) {
            warn!(path = %temp.display(), error = %e, "could not remove staged file");
        }
    }
}
