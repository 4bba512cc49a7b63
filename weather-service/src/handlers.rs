use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::Json,
};
use common::errors::AppError;
use serde::Deserialize;
use tracing::info;

use crate::lookup::WeatherLookup;
use crate::models::{LookupResult, SearchRequest};

#[derive(Clone)]
pub struct AppState {
    pub lookup: Arc<WeatherLookup>,
}

#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    pub zip: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service health check")
    )
)]
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "service": "weather-service" }))
}

#[utoipa::path(
    get,
    path = "/api/weather",
    params(
        ("zip" = Option<String>, Query, description = "5-digit US ZIP code"),
        ("city" = Option<String>, Query, description = "City name (requires state)"),
        ("state" = Option<String>, Query, description = "2-letter US state code"),
    ),
    responses(
        (status = 200, description = "Lookup result envelope", body = LookupResult),
        (status = 400, description = "Invalid search parameters"),
    ),
    tag = "weather"
)]
pub async fn get_weather(
    State(state): State<AppState>,
    Query(query): Query<WeatherQuery>,
) -> Result<Json<LookupResult>, AppError> {
    let request = parse_search(&query)?;
    info!(?request, "Weather request received");

    Ok(Json(state.lookup.lookup(&request).await))
}

/// Validate the raw query into a normalized [`SearchRequest`]: a 5-digit
/// ZIP, or a city plus 2-letter state (uppercased). ZIP wins when both are
/// supplied.
fn parse_search(query: &WeatherQuery) -> Result<SearchRequest, AppError> {
    let zip = query.zip.as_deref().unwrap_or("").trim();
    let city = query.city.as_deref().unwrap_or("").trim();
    let state = query.state.as_deref().unwrap_or("").trim();

    if !zip.is_empty() {
        if zip.len() != 5 || !zip.chars().all(|c| c.is_ascii_digit()) {
            return Err(AppError::validation("ZIP code must be 5 digits (US only)."));
        }
        return Ok(SearchRequest::Zip(zip.to_string()));
    }

    if city.is_empty() && state.is_empty() {
        return Err(AppError::validation(
            "Provide a ZIP code, or a city and state.",
        ));
    }
    if city.is_empty() || state.is_empty() {
        return Err(AppError::validation(
            "Both city and state are required when searching by city/state.",
        ));
    }
    if state.len() != 2 || !state.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::validation(
            "State must be the 2-letter US state code (e.g. MA, NY).",
        ));
    }

    Ok(SearchRequest::CityState {
        city: city.to_string(),
        state: state.to_uppercase(),
    })
}
