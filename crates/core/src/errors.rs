use chrono::NaiveDate;
use thiserror::Error;

/// Unified error type for the entire portfolio-returns-core library.
/// Every public function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Data quality ────────────────────────────────────────────────
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Date range error: {0}")]
    DateRange(String),

    #[error("Invalid price series: {0}")]
    InvalidSeries(String),

    #[error("Duplicate key ({timestamp}, {entity}) in long table")]
    DuplicateKey {
        timestamp: NaiveDate,
        entity: String,
    },

    // ── Numeric integrity ───────────────────────────────────────────
    #[error("Non-positive price for {ticker} on {date}")]
    ZeroPrice { ticker: String, date: NaiveDate },

    #[error("Invalid weights: {0}")]
    InvalidWeights(String),

    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    #[error("Regression failed: {0}")]
    Regression(String),

    // ── Upstream / Network ──────────────────────────────────────────
    #[error("Upstream store unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("API error ({provider}): {message}")]
    Api { provider: String, message: String },

    // ── Configuration / Storage ─────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("File I/O error: {0}")]
    FileIO(String),
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::FileIO(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        // Store URLs may carry tokens in the query string.
        let msg = e.to_string();
        let sanitized = if let Some(idx) = msg.find('?') {
            format!("{}?<query redacted>", &msg[..idx])
        } else {
            msg
        };
        CoreError::UpstreamUnavailable(sanitized)
    }
}
