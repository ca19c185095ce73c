use serde::Serialize;

use crate::errors::CoreError;

/// File holding the long `asset_price` record table.
pub const ASSET_PRICE_FILE: &str = "asset_price.json";

/// File holding the long `asset_daily_metrics` record table.
pub const ASSET_DAILY_METRICS_FILE: &str = "asset_daily_metrics.json";

/// Suffix of files staged before being renamed into place.
pub const TEMP_SUFFIX: &str = ".tmp";

/// `<prefix>_latest.json`, overwritten on every run.
pub fn latest_document_name(prefix: &str) -> String {
    format!("{prefix}_latest.json")
}

/// `<prefix>_<unix-seconds>.json`, one per run.
pub fn snapshot_document_name(prefix: &str, unix_seconds: i64) -> String {
    format!("{prefix}_{unix_seconds}.json")
}

pub fn temp_name(file_name: &str) -> String {
    format!("{file_name}{TEMP_SUFFIX}")
}

/// Pretty-printed JSON bytes of `value`. `what` names the value in errors.
pub fn to_json_bytes<T: Serialize + ?Sized>(value: &T, what: &str) -> Result<Vec<u8>, CoreError> {
    serde_json::to_vec_pretty(value)
        .map_err(|e| CoreError::Serialization(format!("Failed to serialize {what}: {e}")))
}
