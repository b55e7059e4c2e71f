//! Ranks districts by their forecast window average.
//!
//! Forecasts are fetched in fixed-size chunks: every district of a chunk is
//! requested concurrently and the whole chunk is awaited before the next one
//! starts, so at most `chunk_size` requests are ever in flight.

use std::sync::Arc;

use chrono::NaiveDate;
use futures::future::{join_all, try_join_all};
use tracing::instrument;

use crate::{
    error::ForecastError,
    forecast::{FetchSettings, ForecastFetcher},
    model::{District, ForecastResult, Ranking},
    provider::WeatherProvider,
};

pub const DEFAULT_CHUNK_SIZE: usize = 4;

/// Number of chunks `len` items split into.
pub fn chunk_count(len: usize, chunk_size: usize) -> usize {
    len.div_ceil(chunk_size.max(1))
}

#[derive(Debug, Clone)]
pub struct AggregationEngine {
    provider: Arc<dyn WeatherProvider>,
    chunk_size: usize,
    settings: FetchSettings,
}

impl AggregationEngine {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self {
            provider,
            chunk_size: DEFAULT_CHUNK_SIZE,
            settings: FetchSettings::default(),
        }
    }

    /// A zero chunk size is treated as one.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_settings(mut self, settings: FetchSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn fetcher<'a>(&self, district: &'a District, start: NaiveDate) -> ForecastFetcher<'a> {
        ForecastFetcher::average_week(district, start).with_settings(self.settings)
    }

    /// The `top_n` coolest districts, ascending by average temperature.
    ///
    /// Any failed forecast fails the whole ranking; the rest of its chunk is
    /// dropped and no further chunks are started.
    #[instrument(
        skip(self, districts),
        fields(count = districts.len(), chunk_size = self.chunk_size)
    )]
    pub async fn rank_coolest_districts(
        &self,
        districts: &[District],
        top_n: usize,
        start: NaiveDate,
    ) -> Result<Vec<ForecastResult>, ForecastError> {
        let mut results = Vec::with_capacity(districts.len());

        for (i, chunk) in districts.chunks(self.chunk_size).enumerate() {
            tracing::debug!(chunk = i, size = chunk.len(), "fetching chunk");
            let provider = self.provider.as_ref();
            let chunk_results = try_join_all(chunk.iter().map(|district| async move {
                self.fetcher(district, start).fetch_result(provider).await
            }))
            .await?;
            results.extend(chunk_results);
        }

        Ok(coolest(results, top_n))
    }

    /// Like [`rank_coolest_districts`](Self::rank_coolest_districts), but a
    /// failed district is logged and counted instead of failing the batch.
    #[instrument(
        skip(self, districts),
        fields(count = districts.len(), chunk_size = self.chunk_size)
    )]
    pub async fn rank_coolest_districts_best_effort(
        &self,
        districts: &[District],
        top_n: usize,
        start: NaiveDate,
    ) -> Ranking {
        let mut results = Vec::with_capacity(districts.len());
        let mut failed = 0;

        for (i, chunk) in districts.chunks(self.chunk_size).enumerate() {
            tracing::debug!(chunk = i, size = chunk.len(), "fetching chunk");
            let provider = self.provider.as_ref();
            let outcomes = join_all(chunk.iter().map(|district| async move {
                (district, self.fetcher(district, start).fetch_result(provider).await)
            }))
            .await;

            for (district, outcome) in outcomes {
                match outcome {
                    Ok(result) => results.push(result),
                    Err(err) => {
                        failed += 1;
                        tracing::warn!(
                            district = %district.name,
                            error = %err,
                            "forecast failed, skipping district"
                        );
                    }
                }
            }
        }

        if failed > 0 {
            tracing::warn!(
                failed,
                succeeded = results.len(),
                "ranking built from partial results"
            );
        }

        Ranking {
            districts: coolest(results, top_n),
            failed,
        }
    }
}

/// Stable ascending sort by temperature, truncated to `top_n`.
fn coolest(mut results: Vec<ForecastResult>, top_n: usize) -> Vec<ForecastResult> {
    results.sort_by(|a, b| a.average_temperature.total_cmp(&b.average_temperature));
    results.truncate(top_n);
    results
}
