use std::sync::Arc;

use chrono::Utc;
use common::errors::AppError;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::api::WeatherApiService;
use crate::cache::{LocationKey, LocationStore};
use crate::forecast::five_day_summaries;
use crate::models::{ForecastSummary, LookupResult, SearchRequest};

/// Per-request orchestration: serve a fresh cached entry, or fetch from
/// upstream, persist, and summarize the forecast.
pub struct WeatherLookup {
    service: WeatherApiService,
    store: Arc<dyn LocationStore>,
}

impl WeatherLookup {
    pub fn new(service: WeatherApiService, store: Arc<dyn LocationStore>) -> Self {
        Self { service, store }
    }

    /// Always yields the uniform envelope; every internal failure collapses
    /// into `{weather: None, error: <message>}` with `cached = false`.
    #[instrument(skip(self))]
    pub async fn lookup(&self, request: &SearchRequest) -> LookupResult {
        match self.run(request).await {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, "lookup failed");
                LookupResult::failure(err.to_string())
            }
        }
    }

    async fn run(&self, request: &SearchRequest) -> Result<LookupResult, AppError> {
        let key = LocationKey::from(request);
        let now = Utc::now();

        // Cache read failures degrade to a miss rather than failing the lookup.
        let cached = match self.store.find_fresh(&key, now).await {
            Ok(entry) => entry,
            Err(err) => {
                warn!(key = %key.canonical(), error = %err, "cache read failed");
                None
            }
        };

        // A fresh entry without coordinates is treated as a miss: the
        // forecast step could never run against it.
        if let Some(entry) = cached
            && entry.has_coords()
        {
            info!(key = %key.canonical(), "cache hit");
            let forecast = entry
                .forecast
                .as_ref()
                .map(|doc| five_day_summaries(doc))
                .unwrap_or_default();
            return Ok(LookupResult {
                weather: Some(entry.weather),
                error: None,
                cached: true,
                cached_at: entry.cached_at,
                forecast,
            });
        }

        info!(key = %key.canonical(), "cache miss, fetching from upstream");
        let weather = match self.fetch_current(request).await {
            Ok(doc) => doc,
            Err(err) => return Ok(LookupResult::failure(err.to_string())),
        };

        // The upsert must be attempted before the forecast step, which reads
        // the just-persisted coordinates back out of the store.
        let fetched_at = Utc::now();
        if let Some((lat, lon)) = extract_coords(&weather) {
            if let Err(err) = self
                .store
                .upsert_weather(&key, Some(lat), Some(lon), &weather, fetched_at)
                .await
            {
                warn!(key = %key.canonical(), error = %err, "failed to persist weather payload");
            }
        }

        let forecast = self.fetch_forecast(&key).await;

        Ok(LookupResult {
            weather: Some(weather),
            error: None,
            cached: false,
            cached_at: None,
            forecast,
        })
    }

    async fn fetch_current(&self, request: &SearchRequest) -> Result<Value, AppError> {
        match request {
            SearchRequest::Zip(zip) => self.service.current_by_zip(zip).await,
            SearchRequest::CityState { city, state } => {
                self.service.current_by_city_state(city, state).await
            }
        }
    }

    /// Best-effort forecast refresh: any failure here, from the store or
    /// upstream, degrades to an empty summary list without touching the
    /// weather result.
    async fn fetch_forecast(&self, key: &LocationKey) -> Vec<ForecastSummary> {
        let entry = match self.store.find(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(key = %key.canonical(), error = %err, "cache read failed before forecast fetch");
                return Vec::new();
            }
        };

        let (Some(lat), Some(lon)) = (entry.latitude, entry.longitude) else {
            return Vec::new();
        };

        match self.service.forecast_by_coords(lat, lon).await {
            Ok(doc) => {
                if let Err(err) = self.store.update_forecast(key, &doc, Utc::now()).await {
                    warn!(key = %key.canonical(), error = %err, "failed to persist forecast payload");
                }
                five_day_summaries(&doc)
            }
            Err(err) => {
                warn!(key = %key.canonical(), error = %err, "forecast fetch failed");
                Vec::new()
            }
        }
    }
}

fn extract_coords(weather: &Value) -> Option<(f64, f64)> {
    let lat = weather.pointer("/coord/lat").and_then(Value::as_f64)?;
    let lon = weather.pointer("/coord/lon").and_then(Value::as_f64)?;
    Some((lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coords_require_both_fields() {
        let both = json!({ "coord": { "lat": 42.1, "lon": -71.1 } });
        assert_eq!(extract_coords(&both), Some((42.1, -71.1)));

        assert_eq!(extract_coords(&json!({ "coord": { "lat": 42.1 } })), None);
        assert_eq!(extract_coords(&json!({ "coord": { "lon": -71.1 } })), None);
        assert_eq!(extract_coords(&json!({ "name": "Cambridge" })), None);
        assert_eq!(
            extract_coords(&json!({ "coord": { "lat": "42", "lon": -71.1 } })),
            None
        );
    }
}
