//! District reference data, fetched once and cached.

use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::{fmt::Debug, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::{
    Config,
    cache::TtlCache,
    clock::Clock,
    error::ForecastError,
    model::District,
    provider::truncate_body,
};

pub const DISTRICTS_CACHE_KEY: &str = "districts_data";

pub type DistrictSnapshot = Arc<Vec<District>>;

#[async_trait]
pub trait DistrictDirectory: Send + Sync + Debug {
    async fn fetch_districts(&self) -> Result<DistrictSnapshot, ForecastError>;
}

#[derive(Debug, Deserialize)]
struct DirectoryResponse {
    #[serde(default)]
    districts: Vec<District>,
}

/// Directory backed by a JSON document served over HTTP.
#[derive(Debug)]
pub struct HttpDistrictDirectory {
    url: String,
    http: Client,
    cache: TtlCache<DistrictSnapshot>,
    ttl: Duration,
    refresh: Mutex<()>,
}

impl HttpDistrictDirectory {
    pub fn new(
        url: &str,
        http: Client,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> anyhow::Result<Self> {
        if url.trim().is_empty() {
            bail!("URL is required to fetch districts");
        }

        Ok(Self {
            url: url.to_string(),
            http,
            cache: TtlCache::new(clock),
            ttl,
            refresh: Mutex::new(()),
        })
    }

    pub fn from_config(config: &Config, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(config.weather.timeout())
            .build()
            .context("Failed to build HTTP client for the district directory")?;

        Self::new(&config.directory.url, http, clock, config.directory.cache_ttl())
    }

    /// Drops the cached snapshot so the next call refetches.
    pub fn invalidate(&self) {
        self.cache.remove(DISTRICTS_CACHE_KEY);
    }

    async fn download(&self) -> Result<Vec<District>, ForecastError> {
        let res = self.http.get(&self.url).send().await.map_err(|e| {
            ForecastError::upstream(format!("Couldn't fetch data for districts API: {e}"))
        })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| {
            ForecastError::upstream(format!("Couldn't fetch data for districts API: {e}"))
        })?;

        if !status.is_success() {
            return Err(ForecastError::upstream(format!(
                "Couldn't fetch data for districts API (status {}): {}",
                status,
                truncate_body(&body),
            )));
        }

        let parsed: DirectoryResponse = serde_json::from_str(&body)
            .map_err(|e| ForecastError::malformed(format!("Failed to parse districts JSON: {e}")))?;

        Ok(parsed.districts)
    }
}

#[async_trait]
impl DistrictDirectory for HttpDistrictDirectory {
    #[instrument(name = "fetch_districts", skip(self), fields(url = %self.url))]
    async fn fetch_districts(&self) -> Result<DistrictSnapshot, ForecastError> {
        if let Some(cached) = self.cache.get(DISTRICTS_CACHE_KEY) {
            return Ok(cached);
        }

        // One refresh at a time; whoever waited re-checks before fetching.
        let _guard = self.refresh.lock().await;
        if let Some(cached) = self.cache.get(DISTRICTS_CACHE_KEY) {
            return Ok(cached);
        }

        let districts = Arc::new(self.download().await?);
        tracing::info!(count = districts.len(), "fetched district directory");

        self.cache
            .insert(DISTRICTS_CACHE_KEY, Arc::clone(&districts), self.ttl);
        Ok(districts)
    }
}

/// Directory over a fixed, in-memory district list.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    districts: DistrictSnapshot,
}

impl StaticDirectory {
    pub fn new(districts: Vec<District>) -> Self {
        Self {
            districts: Arc::new(districts),
        }
    }
}

#[async_trait]
impl DistrictDirectory for StaticDirectory {
    async fn fetch_districts(&self) -> Result<DistrictSnapshot, ForecastError> {
        Ok(Arc::clone(&self.districts))
    }
}
