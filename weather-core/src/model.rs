use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;

use crate::error::ForecastError;

/// Numeric identifier of a district, as published by the directory.
///
/// The directory serves ids as strings (`"2"`), clients send them as
/// integers (`2`); both deserialize to the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DistrictId(u64);

impl DistrictId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DistrictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DistrictId {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(DistrictId)
            .map_err(|_| ForecastError::invalid(format!("'{s}' is not a valid district id")))
    }
}

impl TryFrom<&Value> for DistrictId {
    type Error = ForecastError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Number(n) => n
                .as_u64()
                .map(DistrictId)
                .ok_or_else(|| ForecastError::invalid(format!("'{n}' is not a valid district id"))),
            Value::String(s) => s.parse(),
            other => Err(ForecastError::invalid(format!(
                "expected an integer district id, got {other}"
            ))),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText<N> {
    Number(N),
    Text(String),
}

impl<'de> Deserialize<'de> for DistrictId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match NumberOrText::<u64>::deserialize(deserializer)? {
            NumberOrText::Number(id) => Ok(DistrictId(id)),
            NumberOrText::Text(text) => text.parse().map_err(de::Error::custom),
        }
    }
}

fn coordinate<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match NumberOrText::<f64>::deserialize(deserializer)? {
        NumberOrText::Number(v) => Ok(v),
        NumberOrText::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("'{text}' is not a valid coordinate"))),
    }
}

/// A named region with coordinates, the unit of forecasting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct District {
    pub id: DistrictId,
    pub name: String,
    #[serde(rename = "lat", deserialize_with = "coordinate")]
    pub latitude: f64,
    #[serde(rename = "long", deserialize_with = "coordinate")]
    pub longitude: f64,
}

/// Average 14:00 temperature of one district over the forecast window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    #[serde(rename = "district")]
    pub district_name: String,
    pub average_temperature: f64,
}

/// Ranked districts plus the number of districts whose forecast failed.
///
/// `failed` is always zero unless failures are tolerated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ranking {
    pub districts: Vec<ForecastResult>,
    pub failed: usize,
}

/// Raw travel-decision request as it arrives over the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TravelQueryInput {
    #[serde(default)]
    pub current_district_id: Option<Value>,
    #[serde(default)]
    pub dest_district_id: Option<Value>,
    #[serde(default)]
    pub travel_date: Option<Value>,
}

/// A validated travel-decision request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TravelQuery {
    pub current_district_id: DistrictId,
    pub destination_district_id: DistrictId,
    pub travel_date: NaiveDate,
}

impl TravelQuery {
    pub fn new(current: DistrictId, destination: DistrictId, travel_date: NaiveDate) -> Self {
        Self {
            current_district_id: current,
            destination_district_id: destination,
            travel_date,
        }
    }
}

fn required<'a>(field: &str, value: &'a Option<Value>) -> Result<&'a Value, ForecastError> {
    match value {
        None | Some(Value::Null) => Err(ForecastError::invalid(format!("{field} is required"))),
        Some(v) => Ok(v),
    }
}

pub fn parse_travel_date(text: &str) -> Result<NaiveDate, ForecastError> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").map_err(|_| {
        ForecastError::invalid(format!("travel_date '{text}' is not a valid YYYY-MM-DD date"))
    })
}

impl TryFrom<TravelQueryInput> for TravelQuery {
    type Error = ForecastError;

    fn try_from(input: TravelQueryInput) -> Result<Self, Self::Error> {
        let current =
            DistrictId::try_from(required("current_district_id", &input.current_district_id)?)?;
        let destination =
            DistrictId::try_from(required("dest_district_id", &input.dest_district_id)?)?;

        let travel_date = match required("travel_date", &input.travel_date)? {
            Value::String(s) => parse_travel_date(s)?,
            other => {
                return Err(ForecastError::invalid(format!(
                    "travel_date must be a YYYY-MM-DD string, got {other}"
                )));
            }
        };

        Ok(TravelQuery::new(current, destination, travel_date))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    #[serde(rename = "Can Visit")]
    CanVisit,
    #[serde(rename = "Shouldn't visit")]
    ShouldNotVisit,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::CanVisit => "Can Visit",
            Decision::ShouldNotVisit => "Shouldn't visit",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelDecision {
    pub travel_date: NaiveDate,
    pub decision: Decision,
}
