use std::env;

pub struct Config {
    pub port: u16,
    pub api_key: Option<String>,
    pub weather_api_url: String,
    pub forecast_api_url: String,
    pub database_url: String,
    pub cache_ttl_seconds: i64,
    pub http_timeout_seconds: u64,
    pub http_connect_timeout_seconds: u64,
    pub http_max_retries: u32,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            api_key: env::var("OPENWEATHER_API_KEY").ok(),
            weather_api_url: env::var("WEATHER_API_URL").unwrap_or_else(|_| {
                "https://api.openweathermap.org/data/2.5/weather".to_string()
            }),
            forecast_api_url: env::var("FORECAST_API_URL").unwrap_or_else(|_| {
                "https://api.openweathermap.org/data/2.5/forecast".to_string()
            }),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            cache_ttl_seconds: env::var("CACHE_TTL_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1800), // 30 minutes default
            http_timeout_seconds: env::var("HTTP_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            http_connect_timeout_seconds: env::var("HTTP_CONNECT_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            http_max_retries: env::var("HTTP_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        }
    }
}
