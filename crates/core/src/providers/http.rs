use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::errors::CoreError;
use crate::models::asset::{AssetMetadata, DailyMetricPoint};
use crate::models::price::{PricePoint, PriceSeries};

use super::traits::AssetDataStore;

const PROVIDER_NAME: &str = "asset-store";

/// HTTP/JSON client for the asset store.
///
/// - `GET {base}/assets/metadata` → `[{asset_id, asset_ticker, asset_name, asset_type}]`
/// - `GET {base}/assets/{ticker}/prices` → `[{date, price}]`
/// - `GET {base}/assets/{ticker}/daily-metrics` → `[{date, market_cap, trading_volume_24h}]`
pub struct HttpAssetStore {
    client: Client,
    base_url: String,
}

impl HttpAssetStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CoreError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if Url::parse(&base_url).map_or(true, |u| u.cannot_be_a_base()) {
            return Err(CoreError::Config(format!(
                "asset store URL is not a valid base URL: {base_url}"
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/assets/{segments...}`, each segment percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, CoreError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| CoreError::Config(format!("invalid asset store URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| CoreError::Config(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .push("assets")
            .extend(segments);
        Ok(url)
    }

    /// GET a JSON payload. A 404 on a per-asset path means the ticker is unknown.
    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        ticker: Option<&str>,
    ) -> Result<T, CoreError> {
        let url = self.endpoint(segments)?;
        let path = url.path().to_string();
        debug!(%url, "requesting");

        let resp = self.client.get(url).send().await?;
        if let (StatusCode::NOT_FOUND, Some(ticker)) = (resp.status(), ticker) {
            return Err(CoreError::UnknownAsset(ticker.to_string()));
        }
        resp.error_for_status()?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: PROVIDER_NAME.into(),
                message: format!("Failed to parse response from {path}: {e}"),
            })
    }
}

#[async_trait]
impl AssetDataStore for HttpAssetStore {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn get_all_asset_metadata(&self) -> Result<Vec<AssetMetadata>, CoreError> {
        let metadata: Vec<AssetMetadata> = self.get_json(&["metadata"], None).await?;
        Ok(metadata
            .into_iter()
            .map(|m| AssetMetadata::new(m.asset_id, m.ticker, m.name, m.asset_type))
            .collect())
    }

    async fn get_asset_price(&self, ticker: &str) -> Result<PriceSeries, CoreError> {
        let points: Vec<PricePoint> = self
            .get_json(&[ticker, "prices"], Some(ticker))
            .await?;
        PriceSeries::from_unsorted(ticker, points)
    }

    async fn get_daily_metrics(&self, ticker: &str) -> Result<Vec<DailyMetricPoint>, CoreError> {
        let mut points: Vec<DailyMetricPoint> = self
            .get_json(&[ticker, "daily-metrics"], Some(ticker))
            .await?;
        points.sort_by_key(|p| p.date);
        Ok(points)
    }
}
