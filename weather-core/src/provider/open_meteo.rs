use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::instrument;

use super::{ForecastRequest, PayloadFormat, WeatherProvider, truncate_body};
use crate::error::ForecastError;

/// Open-Meteo forecast API client.
#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    base_url: String,
    timezone: String,
    http: Client,
}

impl OpenMeteoProvider {
    pub fn new(base_url: &str, timezone: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for Open-Meteo")?;

        Ok(Self::with_client(base_url, timezone, http))
    }

    pub fn with_client(base_url: &str, timezone: &str, http: Client) -> Self {
        Self {
            base_url: base_url.to_string(),
            timezone: timezone.to_string(),
            http,
        }
    }

    fn query(&self, request: &ForecastRequest) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("latitude", request.latitude.to_string()),
            ("longitude", request.longitude.to_string()),
            ("start_date", request.start_date.format("%Y-%m-%d").to_string()),
            ("end_date", request.end_date.format("%Y-%m-%d").to_string()),
            ("hourly", "temperature_2m".to_string()),
            ("timezone", self.timezone.clone()),
        ];
        if request.format == PayloadFormat::Csv {
            query.push(("format", "csv".to_string()));
        }
        query
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    #[instrument(
        name = "open_meteo_request",
        level = "debug",
        skip(self),
        fields(lat = request.latitude, lon = request.longitude, format = request.format.as_str())
    )]
    async fn hourly_temperatures(
        &self,
        request: &ForecastRequest,
    ) -> Result<String, ForecastError> {
        let res = self
            .http
            .get(&self.base_url)
            .query(&self.query(request))
            .send()
            .await
            .map_err(|e| ForecastError::upstream(format!("Open-Meteo request failed: {e}")))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| ForecastError::upstream(format!("Failed to read Open-Meteo body: {e}")))?;

        if !status.is_success() {
            return Err(ForecastError::upstream(format!(
                "Open-Meteo request failed with status {}: {}",
                status,
                truncate_body(&body),
            )));
        }

        tracing::debug!(bytes = body.len(), "received forecast payload");
        Ok(body)
    }
}
