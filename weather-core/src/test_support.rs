use std::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use parking_lot::Mutex;

use crate::{
    error::ForecastError,
    model::{District, DistrictId},
    provider::{ForecastRequest, PayloadFormat, WeatherProvider},
};

type Responder = Box<dyn Fn(&ForecastRequest) -> Result<String, ForecastError> + Send + Sync>;

/// Scriptable weather provider that records every request and how many were
/// in flight at once.
pub(crate) struct StubProvider {
    respond: Responder,
    requests: Mutex<Vec<ForecastRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl fmt::Debug for StubProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StubProvider")
            .field("requests", &self.requests.lock().len())
            .finish()
    }
}

impl StubProvider {
    pub fn new(
        respond: impl Fn(&ForecastRequest) -> Result<String, ForecastError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_payload(payload: String) -> Self {
        Self::new(move |_| Ok(payload.clone()))
    }

    pub fn failing() -> Self {
        Self::new(|_| Err(ForecastError::upstream("stub provider is down")))
    }

    /// Every hour of every requested day reports the district's latitude as
    /// its temperature.
    pub fn latitude_as_temperature() -> Self {
        Self::new(|req| Ok(constant_series(req, req.latitude)))
    }

    pub fn requests(&self) -> Vec<ForecastRequest> {
        self.requests.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherProvider for StubProvider {
    async fn hourly_temperatures(
        &self,
        request: &ForecastRequest,
    ) -> Result<String, ForecastError> {
        self.requests.lock().push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::task::yield_now().await;
        let result = (self.respond)(request);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// A payload in the requested format where every hour reads `temperature`.
pub(crate) fn constant_series(request: &ForecastRequest, temperature: f64) -> String {
    let mut days = Vec::new();
    let mut day = request.start_date;
    while day <= request.end_date {
        days.push(day);
        day = day + Days::new(1);
    }

    let times: Vec<String> = days
        .iter()
        .flat_map(|d| (0..24).map(move |h| format!("{}T{h:02}:00", d.format("%Y-%m-%d"))))
        .collect();

    match request.format {
        PayloadFormat::Csv => {
            let mut csv = String::from("time,temperature_2m (°C)\n");
            for t in &times {
                csv.push_str(&format!("{t},{temperature}\n"));
            }
            csv
        }
        PayloadFormat::Json => serde_json::json!({
            "hourly": {
                "time": times,
                "temperature_2m": vec![temperature; times.len()],
            }
        })
        .to_string(),
    }
}

/// `count` districts with ids `1..=count`; district `i` sits at latitude `base + i`.
pub(crate) fn districts(count: usize, base: f64) -> Vec<District> {
    (0..count)
        .map(|i| District {
            id: DistrictId::new(i as u64 + 1),
            name: format!("District {i}"),
            latitude: base + i as f64,
            longitude: 90.0 + i as f64,
        })
        .collect()
}

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
}
