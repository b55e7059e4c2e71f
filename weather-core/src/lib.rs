//! Core library for the district weather service.
//!
//! This crate defines:
//! - Configuration handling
//! - The district directory and weather provider collaborators
//! - Forecast fetching, ranking of the coolest districts and travel decisions
//! - Shared domain models and the error taxonomy
//!
//! It is used by `district-weather-cli`, which serves it over HTTP.

pub mod aggregate;
pub mod cache;
pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod forecast;
pub mod model;
pub mod provider;
pub mod service;
pub mod travel;

#[cfg(test)]
pub(crate) mod test_support;

pub use aggregate::AggregationEngine;
pub use cache::TtlCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use directory::{DistrictDirectory, HttpDistrictDirectory, StaticDirectory};
pub use error::ForecastError;
pub use forecast::{FetchSettings, ForecastFetcher, ForecastMode};
pub use model::{
    Decision, District, DistrictId, ForecastResult, Ranking, TravelDecision, TravelQuery,
    TravelQueryInput,
};
pub use provider::{ForecastRequest, PayloadFormat, WeatherProvider};
pub use service::ForecastService;
pub use travel::TravelDecisionEngine;
