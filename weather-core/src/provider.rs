use crate::{Config, error::ForecastError, provider::open_meteo::OpenMeteoProvider};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::{fmt::Debug, sync::Arc};

pub mod open_meteo;

/// Payload format asked of the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadFormat {
    Csv,
    Json,
}

impl PayloadFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadFormat::Csv => "csv",
            PayloadFormat::Json => "json",
        }
    }
}

/// Hourly temperature series for one point over an inclusive date range.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub format: PayloadFormat,
}

#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Returns the raw payload in the requested format.
    async fn hourly_temperatures(&self, request: &ForecastRequest) -> Result<String, ForecastError>;
}

/// Construct the provider described by the `[weather]` section.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let provider = OpenMeteoProvider::new(
        &config.weather.base_url,
        &config.weather.timezone,
        config.weather.timeout(),
    )?;

    Ok(Arc::new(provider))
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
