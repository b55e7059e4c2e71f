use thiserror::Error;

use crate::model::DistrictId;

/// Failures surfaced by the forecast and travel-decision operations.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// The district directory or weather provider could not be reached,
    /// or answered with a non-success status.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A payload arrived but did not have the expected shape.
    #[error("malformed forecast data: {0}")]
    MalformedForecastData(String),

    /// The caller supplied missing or malformed input.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("district {0} not found")]
    DistrictNotFound(DistrictId),
}

impl ForecastError {
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedForecastData(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Stable, machine-readable code for the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            ForecastError::UpstreamUnavailable(_) => "upstream_unavailable",
            ForecastError::MalformedForecastData(_) => "malformed_forecast_data",
            ForecastError::InvalidRequest(_) => "invalid_request",
            ForecastError::DistrictNotFound(_) => "district_not_found",
        }
    }
}
