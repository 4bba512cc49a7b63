use common::errors::AppError;
use common::http_client::RetryingHttpClient;
use serde_json::Value;
use tracing::{info, instrument};

const DEFAULT_COUNTRY: &str = "us";

/// Query building and response parsing for the OpenWeatherMap API.
///
/// Holds two preconfigured clients, one per endpoint; injecting them keeps
/// construction free of any test-mode branching. Payloads stay opaque
/// (`serde_json::Value`) — callers pull out the fields they need.
#[derive(Debug)]
pub struct WeatherApiService {
    api_key: String,
    current: RetryingHttpClient,
    forecast: RetryingHttpClient,
}

impl WeatherApiService {
    pub fn new(
        api_key: impl Into<String>,
        current: RetryingHttpClient,
        forecast: RetryingHttpClient,
    ) -> Result<Self, AppError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AppError::configuration(
                "OpenWeather API key not configured. Set OPENWEATHER_API_KEY",
            ));
        }

        Ok(Self {
            api_key,
            current,
            forecast,
        })
    }

    #[instrument(skip(self))]
    pub async fn current_by_zip(&self, zip: &str) -> Result<Value, AppError> {
        let location = ("zip", format!("{zip},{DEFAULT_COUNTRY}"));
        self.request(&self.current, location).await
    }

    #[instrument(skip(self))]
    pub async fn current_by_city_state(&self, city: &str, state: &str) -> Result<Value, AppError> {
        let location = ("q", format!("{city},{state},{DEFAULT_COUNTRY}"));
        self.request(&self.current, location).await
    }

    #[instrument(skip(self))]
    pub async fn current_by_coords(&self, lat: f64, lon: f64) -> Result<Value, AppError> {
        let response = self
            .current
            .get(&self.coord_params(lat, lon))
            .await?;
        Self::parse(response)
    }

    #[instrument(skip(self))]
    pub async fn forecast_by_coords(&self, lat: f64, lon: f64) -> Result<Value, AppError> {
        let response = self
            .forecast
            .get(&self.coord_params(lat, lon))
            .await?;
        Self::parse(response)
    }

    async fn request(
        &self,
        client: &RetryingHttpClient,
        location: (&str, String),
    ) -> Result<Value, AppError> {
        let params = [
            location,
            ("appid", self.api_key.clone()),
            ("units", "imperial".to_string()),
        ];
        let response = client.get(&params).await?;
        Self::parse(response)
    }

    fn coord_params(&self, lat: f64, lon: f64) -> [(&'static str, String); 4] {
        [
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("appid", self.api_key.clone()),
            ("units", "imperial".to_string()),
        ]
    }

    /// 2xx bodies must parse as JSON; anything else becomes an upstream
    /// error carrying the API's `message` field when one is present, the
    /// HTTP reason phrase otherwise.
    fn parse(response: common::http_client::ApiResponse) -> Result<Value, AppError> {
        if response.is_success() {
            return serde_json::from_str(&response.body)
                .map_err(|e| AppError::malformed(e.to_string()));
        }

        let message = serde_json::from_str::<Value>(&response.body)
            .ok()
            .and_then(|body| {
                body.get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| response.reason.clone());

        info!(status = response.status, message = %message, "upstream returned an error");
        Err(AppError::upstream(response.status, message))
    }
}
