//! Per-district forecast retrieval.
//!
//! A [`ForecastFetcher`] wraps one district and a [`ForecastMode`]. The mode
//! decides both what is asked of the weather provider and how the payload is
//! reduced to a single temperature:
//!
//! - [`ForecastMode::AverageWeek`] downloads CSV for the forecast window and
//!   averages the first `window_days` samples taken at the target hour.
//! - [`ForecastMode::SingleDate`] downloads JSON for one day and returns the
//!   sample at the target hour.

use chrono::{Days, NaiveDate, NaiveDateTime, Timelike};
use serde::Deserialize;
use tracing::instrument;

use crate::{
    config::RankingConfig,
    error::ForecastError,
    model::{District, ForecastResult},
    provider::{ForecastRequest, PayloadFormat, WeatherProvider},
};

const TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSettings {
    pub target_hour: u32,
    pub window_days: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            target_hour: 14,
            window_days: 7,
        }
    }
}

impl From<&RankingConfig> for FetchSettings {
    fn from(cfg: &RankingConfig) -> Self {
        Self {
            target_hour: cfg.target_hour,
            window_days: cfg.window_days,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastMode {
    /// Mean of the daily target-hour samples starting at `start`.
    AverageWeek { start: NaiveDate },
    /// The target-hour sample of exactly this date.
    SingleDate(NaiveDate),
}

impl ForecastMode {
    fn request(&self, district: &District, settings: &FetchSettings) -> ForecastRequest {
        let (start_date, end_date, format) = match *self {
            ForecastMode::AverageWeek { start } => {
                let end = start
                    .checked_add_days(Days::new(settings.window_days as u64))
                    .unwrap_or(NaiveDate::MAX);
                (start, end, PayloadFormat::Csv)
            }
            ForecastMode::SingleDate(date) => (date, date, PayloadFormat::Json),
        };

        ForecastRequest {
            latitude: district.latitude,
            longitude: district.longitude,
            start_date,
            end_date,
            format,
        }
    }
}

/// One timestamped temperature reading in provider-local time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourlySample {
    pub time: NaiveDateTime,
    pub temperature: f64,
}

#[derive(Debug, Clone)]
pub struct ForecastFetcher<'a> {
    district: &'a District,
    mode: ForecastMode,
    settings: FetchSettings,
}

impl<'a> ForecastFetcher<'a> {
    pub fn new(district: &'a District, mode: ForecastMode) -> Self {
        Self {
            district,
            mode,
            settings: FetchSettings::default(),
        }
    }

    pub fn average_week(district: &'a District, start: NaiveDate) -> Self {
        Self::new(district, ForecastMode::AverageWeek { start })
    }

    pub fn single_date(district: &'a District, date: NaiveDate) -> Self {
        Self::new(district, ForecastMode::SingleDate(date))
    }

    pub fn with_settings(mut self, settings: FetchSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn district(&self) -> &District {
        self.district
    }

    pub fn mode(&self) -> ForecastMode {
        self.mode
    }

    #[instrument(
        name = "fetch_forecast",
        level = "debug",
        skip(self, provider),
        fields(district = %self.district.name, mode = ?self.mode)
    )]
    pub async fn fetch_temperature(
        &self,
        provider: &dyn WeatherProvider,
    ) -> Result<f64, ForecastError> {
        let request = self.mode.request(self.district, &self.settings);
        let payload = provider.hourly_temperatures(&request).await?;

        match self.mode {
            ForecastMode::AverageWeek { .. } => {
                let samples = parse_csv_series(&payload)?;
                average_at_hour(&samples, self.settings.target_hour, self.settings.window_days)
            }
            ForecastMode::SingleDate(date) => {
                let samples = parse_json_series(&payload)?;
                temperature_at(&samples, date, self.settings.target_hour)
            }
        }
    }

    pub async fn fetch_result(
        &self,
        provider: &dyn WeatherProvider,
    ) -> Result<ForecastResult, ForecastError> {
        let average_temperature = self.fetch_temperature(provider).await?;
        Ok(ForecastResult {
            district_name: self.district.name.clone(),
            average_temperature,
        })
    }
}

fn parse_time(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

/// Parses Open-Meteo CSV output.
///
/// Metadata lines before the `time,...` header are skipped; the temperature
/// column is the first one whose name starts with `temperature_2m`.
pub fn parse_csv_series(payload: &str) -> Result<Vec<HourlySample>, ForecastError> {
    let mut lines = payload.lines();

    let header = lines
        .by_ref()
        .map(|l| l.trim_start_matches('\u{feff}').trim())
        .find(|l| l.split(',').next().map(str::trim) == Some("time"))
        .ok_or_else(|| ForecastError::malformed("CSV payload has no 'time' header"))?;

    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    let time_idx = columns.iter().position(|c| *c == "time").unwrap_or(0);
    let temp_idx = columns
        .iter()
        .position(|c| c.starts_with("temperature_2m"))
        .ok_or_else(|| ForecastError::malformed("CSV payload has no temperature_2m column"))?;

    let mut samples = Vec::new();
    for (n, line) in lines.enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(',').collect();
        let (Some(time), Some(temp)) = (fields.get(time_idx), fields.get(temp_idx)) else {
            return Err(ForecastError::malformed(format!(
                "CSV row {} has {} fields, expected at least {}",
                n + 1,
                fields.len(),
                time_idx.max(temp_idx) + 1
            )));
        };

        let time = parse_time(time).ok_or_else(|| {
            ForecastError::malformed(format!("CSV row {} has unreadable time '{time}'", n + 1))
        })?;
        let temperature = temp
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|t| t.is_finite())
            .ok_or_else(|| {
                ForecastError::malformed(format!(
                    "CSV row {} has unreadable temperature '{temp}'",
                    n + 1
                ))
            })?;

        samples.push(HourlySample { time, temperature });
    }

    Ok(samples)
}

#[derive(Debug, Deserialize)]
struct JsonForecast {
    hourly: JsonHourly,
}

#[derive(Debug, Deserialize)]
struct JsonHourly {
    time: Vec<String>,
    temperature_2m: Vec<Option<f64>>,
}

/// Parses Open-Meteo JSON output. Hours with a `null` temperature are dropped.
pub fn parse_json_series(payload: &str) -> Result<Vec<HourlySample>, ForecastError> {
    let parsed: JsonForecast = serde_json::from_str(payload)
        .map_err(|e| ForecastError::malformed(format!("Failed to parse forecast JSON: {e}")))?;

    let JsonHourly { time, temperature_2m } = parsed.hourly;
    if time.len() != temperature_2m.len() {
        return Err(ForecastError::malformed(format!(
            "hourly series length mismatch: {} times, {} temperatures",
            time.len(),
            temperature_2m.len()
        )));
    }

    time.iter()
        .zip(temperature_2m)
        .filter_map(|(t, temp)| temp.map(|temperature| (t, temperature)))
        .map(|(t, temperature)| {
            if !temperature.is_finite() {
                return Err(ForecastError::malformed(format!(
                    "non-finite temperature {temperature} at '{t}'"
                )));
            }
            parse_time(t)
                .map(|time| HourlySample { time, temperature })
                .ok_or_else(|| ForecastError::malformed(format!("unreadable time '{t}'")))
        })
        .collect()
}

/// Mean of the first `days` samples at `hour`, rounded to two decimals.
pub fn average_at_hour(
    samples: &[HourlySample],
    hour: u32,
    days: usize,
) -> Result<f64, ForecastError> {
    let mut at_hour: Vec<&HourlySample> =
        samples.iter().filter(|s| s.time.hour() == hour).collect();
    at_hour.sort_by_key(|s| s.time);

    if days == 0 || at_hour.len() < days {
        return Err(ForecastError::malformed(format!(
            "expected {days} rows at {hour:02}:00, found {}",
            at_hour.len()
        )));
    }

    let sum: f64 = at_hour.iter().take(days).map(|s| s.temperature).sum();
    Ok(round2(sum / days as f64))
}

pub fn temperature_at(
    samples: &[HourlySample],
    date: NaiveDate,
    hour: u32,
) -> Result<f64, ForecastError> {
    samples
        .iter()
        .find(|s| s.time.date() == date && s.time.hour() == hour)
        .map(|s| s.temperature)
        .ok_or_else(|| ForecastError::malformed(format!("no temperature for {date} {hour:02}:00")))
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DistrictId;
    use crate::test_support::StubProvider;

    const WEEK: [f64; 7] = [30.0, 32.0, 31.0, 33.0, 34.0, 35.0, 36.0];

    fn district() -> District {
        District {
            id: DistrictId::new(1),
            name: "Mock District".into(),
            latitude: 23.8103,
            longitude: 90.4125,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Full Open-Meteo style CSV: metadata, blank line, header, 24 rows per day.
    fn open_meteo_csv(start: NaiveDate, temps_at_two: &[f64]) -> String {
        let mut csv = String::from(
            "latitude,longitude,elevation,utc_offset_seconds,timezone,timezone_abbreviation\n\
             23.8,90.4,9.0,21600,Asia/Dhaka,+06\n\
             \n\
             time,temperature_2m (°C)\n",
        );
        for (i, temp) in temps_at_two.iter().enumerate() {
            let day = start + Days::new(i as u64);
            for hour in 0..24 {
                let value = if hour == 14 { *temp } else { 20.0 };
                csv.push_str(&format!("{}T{hour:02}:00,{value}\n", day.format("%Y-%m-%d")));
            }
        }
        csv
    }

    #[test]
    fn averages_first_seven_two_pm_rows() {
        let mut temps = WEEK.to_vec();
        temps.push(99.0); // eighth day is outside the average
        let samples = parse_csv_series(&open_meteo_csv(date(2024, 6, 1), &temps)).unwrap();

        assert_eq!(samples.len(), 8 * 24);
        assert_eq!(average_at_hour(&samples, 14, 7).unwrap(), 31.57);
    }

    #[test]
    fn accepts_plain_csv_without_metadata() {
        let mut csv = String::from("time,temperature_2m (Â°C)\n");
        for (i, temp) in WEEK.iter().enumerate() {
            csv.push_str(&format!("2024-06-{:02} 14:00:00,{temp}\n", i + 1));
        }

        let samples = parse_csv_series(&csv).unwrap();
        assert_eq!(average_at_hour(&samples, 14, 7).unwrap(), 31.57);
    }

    #[test]
    fn too_few_rows_is_malformed() {
        let samples = parse_csv_series(&open_meteo_csv(date(2024, 6, 1), &WEEK[..5])).unwrap();
        let err = average_at_hour(&samples, 14, 7).unwrap_err();
        assert!(matches!(err, ForecastError::MalformedForecastData(_)));
        assert!(err.to_string().contains("found 5"));
    }

    #[test]
    fn csv_without_header_or_column_is_malformed() {
        assert!(matches!(
            parse_csv_series("a,b\n1,2\n"),
            Err(ForecastError::MalformedForecastData(_))
        ));
        assert!(matches!(
            parse_csv_series("time,humidity\n2024-06-01T14:00,80\n"),
            Err(ForecastError::MalformedForecastData(_))
        ));
        assert!(matches!(
            parse_csv_series("time,temperature_2m (°C)\n2024-06-01T14:00,\n"),
            Err(ForecastError::MalformedForecastData(_))
        ));
    }

    #[test]
    fn non_finite_csv_temperature_is_malformed() {
        for bad in ["NaN", "inf", "-infinity"] {
            let mut temps = WEEK.map(|t| t.to_string()).to_vec();
            temps[3] = bad.to_string();

            let mut csv = String::from("time,temperature_2m (°C)\n");
            for (i, temp) in temps.iter().enumerate() {
                csv.push_str(&format!("2024-06-{:02}T14:00,{temp}\n", i + 1));
            }

            let err = parse_csv_series(&csv).unwrap_err();
            assert!(matches!(err, ForecastError::MalformedForecastData(_)), "{bad}");
            assert!(err.to_string().contains(bad));
        }
    }

    #[test]
    fn json_series_picks_requested_hour() {
        let payload = r#"{
            "latitude": 23.8,
            "hourly": {
                "time": ["2024-06-10T13:00", "2024-06-10T14:00", "2024-06-10T15:00"],
                "temperature_2m": [29.1, 31.4, null]
            }
        }"#;

        let samples = parse_json_series(payload).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(temperature_at(&samples, date(2024, 6, 10), 14).unwrap(), 31.4);
        assert!(temperature_at(&samples, date(2024, 6, 10), 15).is_err());
        assert!(temperature_at(&samples, date(2024, 6, 11), 14).is_err());
    }

    #[test]
    fn json_length_mismatch_is_malformed() {
        let payload = r#"{"hourly": {"time": ["2024-06-10T14:00"], "temperature_2m": []}}"#;
        assert!(matches!(
            parse_json_series(payload),
            Err(ForecastError::MalformedForecastData(_))
        ));
        assert!(parse_json_series("not json").is_err());
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round2(31.571_428), 31.57);
        assert_eq!(round2(25.005_1), 25.01);
        assert_eq!(round2(-3.456), -3.46);
    }

    #[tokio::test]
    async fn average_week_requests_eight_day_csv_window() {
        let district = district();
        let start = date(2024, 6, 1);
        let provider = StubProvider::with_payload(open_meteo_csv(start, &WEEK));

        let result = ForecastFetcher::average_week(&district, start)
            .fetch_result(&provider)
            .await
            .unwrap();

        assert_eq!(result.district_name, "Mock District");
        assert_eq!(result.average_temperature, 31.57);

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].start_date, start);
        assert_eq!(requests[0].end_date, date(2024, 6, 8));
        assert_eq!(requests[0].format, PayloadFormat::Csv);
        assert_eq!(requests[0].latitude, district.latitude);
    }

    #[tokio::test]
    async fn single_date_requests_one_json_day() {
        let district = district();
        let day = date(2024, 6, 10);
        let provider = StubProvider::with_payload(
            r#"{"hourly": {"time": ["2024-06-10T14:00"], "temperature_2m": [28.25]}}"#.to_string(),
        );

        let temp = ForecastFetcher::single_date(&district, day)
            .fetch_temperature(&provider)
            .await
            .unwrap();
        assert_eq!(temp, 28.25);

        let requests = provider.requests();
        assert_eq!(requests[0].start_date, day);
        assert_eq!(requests[0].end_date, day);
        assert_eq!(requests[0].format, PayloadFormat::Json);
    }

    #[tokio::test]
    async fn custom_settings_change_hour_and_window() {
        let district = district();
        let start = date(2024, 6, 1);
        let mut csv = String::from("time,temperature_2m (°C)\n");
        for day in 0..3 {
            csv.push_str(&format!("2024-06-0{}T09:00,{}\n", day + 1, 10 + day));
        }
        let provider = StubProvider::with_payload(csv);

        let fetcher = ForecastFetcher::average_week(&district, start).with_settings(FetchSettings {
            target_hour: 9,
            window_days: 3,
        });
        assert_eq!(fetcher.fetch_temperature(&provider).await.unwrap(), 11.0);
        assert_eq!(provider.requests()[0].end_date, date(2024, 6, 4));
    }

    #[tokio::test]
    async fn provider_errors_propagate() {
        let district = district();
        let provider = StubProvider::failing();

        let err = ForecastFetcher::average_week(&district, date(2024, 6, 1))
            .fetch_result(&provider)
            .await
            .unwrap_err();
        assert!(matches!(err, ForecastError::UpstreamUnavailable(_)));
    }
}
