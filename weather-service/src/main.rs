use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, routing::get};
use common::http_client::{RetryPolicy, RetryingHttpClient};
use common::tracing::init_tracing_pretty;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use weather_service::api::WeatherApiService;
use weather_service::cache::{self, PgLocationStore};
use weather_service::config::Config;
use weather_service::handlers;
use weather_service::lookup::WeatherLookup;
use weather_service::openapi;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing_pretty();

    let config = Config::from_env();

    let pool = cache::create_pool(&config.database_url).await?;
    let store = Arc::new(PgLocationStore::new(
        pool,
        chrono::Duration::seconds(config.cache_ttl_seconds),
    ));

    let policy = RetryPolicy {
        max_retries: config.http_max_retries,
        ..RetryPolicy::default()
    };
    let connect_timeout = Duration::from_secs(config.http_connect_timeout_seconds);
    let timeout = Duration::from_secs(config.http_timeout_seconds);

    let current_client = RetryingHttpClient::with_timeouts(
        config.weather_api_url.clone(),
        connect_timeout,
        timeout,
        policy.clone(),
    )?;
    let forecast_client = RetryingHttpClient::with_timeouts(
        config.forecast_api_url.clone(),
        connect_timeout,
        timeout,
        policy,
    )?;

    let service = WeatherApiService::new(
        config.api_key.clone().unwrap_or_default(),
        current_client,
        forecast_client,
    )?;

    let state = handlers::AppState {
        lookup: Arc::new(WeatherLookup::new(service, store)),
    };

    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/weather", get(handlers::get_weather))
        .merge(openapi::swagger_ui())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Weather service starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Weather service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
