use std::sync::Arc;

use anyhow::anyhow;
use chrono::{FixedOffset, NaiveDate};

use crate::{
    Config,
    aggregate::AggregationEngine,
    clock::{Clock, SystemClock},
    directory::{DistrictDirectory, DistrictSnapshot, HttpDistrictDirectory},
    error::ForecastError,
    forecast::FetchSettings,
    model::{Ranking, TravelDecision, TravelQuery},
    provider::{WeatherProvider, provider_from_config},
    travel::TravelDecisionEngine,
};

/// Entry point used by the HTTP handlers and the CLI.
#[derive(Debug, Clone)]
pub struct ForecastService {
    directory: Arc<dyn DistrictDirectory>,
    aggregation: AggregationEngine,
    travel: TravelDecisionEngine,
    clock: Arc<dyn Clock>,
    utc_offset: FixedOffset,
    top_n: usize,
    tolerate_failures: bool,
}

impl ForecastService {
    pub fn new(
        directory: Arc<dyn DistrictDirectory>,
        provider: Arc<dyn WeatherProvider>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> anyhow::Result<Self> {
        let utc_offset = FixedOffset::east_opt(config.weather.utc_offset_seconds).ok_or_else(|| {
            anyhow!(
                "weather.utc_offset_seconds {} is out of range",
                config.weather.utc_offset_seconds
            )
        })?;
        let settings = FetchSettings::from(&config.ranking);

        Ok(Self {
            directory,
            aggregation: AggregationEngine::new(Arc::clone(&provider))
                .with_chunk_size(config.ranking.chunk_size)
                .with_settings(settings),
            travel: TravelDecisionEngine::new(provider).with_settings(settings),
            clock,
            utc_offset,
            top_n: config.ranking.top_n,
            tolerate_failures: config.ranking.tolerate_failures,
        })
    }

    /// Wires the HTTP directory and the configured weather provider.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let directory = HttpDistrictDirectory::from_config(config, Arc::clone(&clock))?;
        let provider = provider_from_config(config)?;

        Self::new(Arc::new(directory), provider, clock, config)
    }

    /// Today's date in the provider's local time.
    pub fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&self.utc_offset).date_naive()
    }

    pub async fn districts(&self) -> Result<DistrictSnapshot, ForecastError> {
        self.directory.fetch_districts().await
    }

    /// The coolest districts over the forecast window starting today.
    pub async fn top_districts(&self) -> Result<Ranking, ForecastError> {
        let districts = self.districts().await?;
        let today = self.today();

        if self.tolerate_failures {
            Ok(self
                .aggregation
                .rank_coolest_districts_best_effort(&districts, self.top_n, today)
                .await)
        } else {
            let ranked = self
                .aggregation
                .rank_coolest_districts(&districts, self.top_n, today)
                .await?;
            Ok(Ranking {
                districts: ranked,
                failed: 0,
            })
        }
    }

    pub async fn travel_decision(
        &self,
        query: &TravelQuery,
    ) -> Result<TravelDecision, ForecastError> {
        let districts = self.districts().await?;
        self.travel.decide(query, &districts).await
    }
}
