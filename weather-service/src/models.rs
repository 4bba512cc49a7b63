use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Normalized search input, as produced by request validation. Exactly one
/// key form: a 5-digit ZIP, or a city plus an uppercased 2-letter state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchRequest {
    Zip(String),
    CityState { city: String, state: String },
}

/// One derived daily forecast summary. Recomputed on demand from the raw
/// 3-hour forecast payload; never persisted in this form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ForecastSummary {
    pub date: NaiveDate,
    pub temp_min: f64,
    pub temp_max: f64,
    pub icon: String,
    pub description: String,
    /// Chance of precipitation, 0.0 to 1.0.
    pub precipitation_probability: f64,
}

/// Uniform result envelope returned for every lookup, success or failure.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LookupResult {
    /// Raw current-weather document from the upstream API (or the cache).
    #[schema(value_type = Option<Object>)]
    pub weather: Option<serde_json::Value>,
    pub error: Option<String>,
    pub cached: bool,
    pub cached_at: Option<DateTime<Utc>>,
    pub forecast: Vec<ForecastSummary>,
}

impl LookupResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            weather: None,
            error: Some(message.into()),
            cached: false,
            cached_at: None,
            forecast: Vec::new(),
        }
    }
}
