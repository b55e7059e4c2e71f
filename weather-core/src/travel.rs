use std::sync::Arc;

use tracing::instrument;

use crate::{
    error::ForecastError,
    forecast::{FetchSettings, ForecastFetcher},
    model::{Decision, District, DistrictId, TravelDecision, TravelQuery},
    provider::WeatherProvider,
};

/// Finds a district by id using binary search over a copy sorted by id.
pub fn find_district(districts: &[District], id: DistrictId) -> Option<&District> {
    let mut sorted: Vec<&District> = districts.iter().collect();
    sorted.sort_by_key(|d| d.id);
    sorted
        .binary_search_by_key(&id, |d| d.id)
        .ok()
        .map(|idx| sorted[idx])
}

/// A destination strictly warmer than the current district is not worth
/// the trip; equal temperatures favour visiting.
pub fn compare_temperatures(current: f64, destination: f64) -> Decision {
    if destination > current {
        Decision::ShouldNotVisit
    } else {
        Decision::CanVisit
    }
}

#[derive(Debug, Clone)]
pub struct TravelDecisionEngine {
    provider: Arc<dyn WeatherProvider>,
    settings: FetchSettings,
}

impl TravelDecisionEngine {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self {
            provider,
            settings: FetchSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: FetchSettings) -> Self {
        self.settings = settings;
        self
    }

    async fn temperature_on(
        &self,
        district: &District,
        query: &TravelQuery,
    ) -> Result<f64, ForecastError> {
        ForecastFetcher::single_date(district, query.travel_date)
            .with_settings(self.settings)
            .fetch_temperature(self.provider.as_ref())
            .await
    }

    #[instrument(
        skip(self, districts),
        fields(
            current = %query.current_district_id,
            destination = %query.destination_district_id,
            date = %query.travel_date
        )
    )]
    pub async fn decide(
        &self,
        query: &TravelQuery,
        districts: &[District],
    ) -> Result<TravelDecision, ForecastError> {
        let current = find_district(districts, query.current_district_id)
            .ok_or(ForecastError::DistrictNotFound(query.current_district_id))?;
        let destination = find_district(districts, query.destination_district_id)
            .ok_or(ForecastError::DistrictNotFound(query.destination_district_id))?;

        let destination_temp = self.temperature_on(destination, query).await?;
        let current_temp = self.temperature_on(current, query).await?;

        let decision = compare_temperatures(current_temp, destination_temp);
        tracing::info!(current_temp, destination_temp, %decision, "travel decision made");

        Ok(TravelDecision {
            travel_date: query.travel_date,
            decision,
        })
    }
}
