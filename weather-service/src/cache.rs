use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::errors::AppError;
use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::models::SearchRequest;

/// Unique cache key: a ZIP code or a normalized (city, state) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationKey {
    Zip(String),
    CityState { city: String, state: String },
}

impl LocationKey {
    /// Canonical text form backing the store's unique constraint.
    pub fn canonical(&self) -> String {
        match self {
            Self::Zip(zip) => format!("zip:{}", zip.trim()),
            Self::CityState { city, state } => format!(
                "city:{},{}",
                city.trim().to_lowercase(),
                state.trim().to_uppercase()
            ),
        }
    }

    fn zip(&self) -> Option<String> {
        match self {
            Self::Zip(zip) => Some(zip.trim().to_string()),
            Self::CityState { .. } => None,
        }
    }

    fn city_state(&self) -> (Option<String>, Option<String>) {
        match self {
            Self::Zip(_) => (None, None),
            Self::CityState { city, state } => (
                Some(city.trim().to_string()),
                Some(state.trim().to_uppercase()),
            ),
        }
    }
}

impl From<&SearchRequest> for LocationKey {
    fn from(request: &SearchRequest) -> Self {
        match request {
            SearchRequest::Zip(zip) => Self::Zip(zip.clone()),
            SearchRequest::CityState { city, state } => Self::CityState {
                city: city.clone(),
                state: state.clone(),
            },
        }
    }
}

/// One persisted entry per location key.
///
/// `cached_at` is the time of the last successful weather fetch and governs
/// freshness for both payloads; it never moves backwards for a key.
#[derive(Debug, Clone)]
pub struct LocationRecord {
    pub key: LocationKey,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub weather: Value,
    pub forecast: Option<Value>,
    pub cached_at: Option<DateTime<Utc>>,
}

impl LocationRecord {
    pub fn has_coords(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.cached_at.is_some_and(|at| now - at < ttl)
    }
}

/// Freshness-bounded location cache. Entries are created by the first
/// successful fetch, updated in place afterwards, and never deleted here;
/// staleness is purely a query-time predicate.
#[async_trait]
pub trait LocationStore: Send + Sync {
    /// Exact key match regardless of freshness.
    async fn find(&self, key: &LocationKey) -> Result<Option<LocationRecord>, AppError>;

    /// Entry only when `cached_at` is set and within the TTL of `now`.
    async fn find_fresh(
        &self,
        key: &LocationKey,
        now: DateTime<Utc>,
    ) -> Result<Option<LocationRecord>, AppError>;

    /// Atomic create-or-update of coordinates plus weather payload. A call
    /// without both coordinates is silently skipped.
    async fn upsert_weather(
        &self,
        key: &LocationKey,
        lat: Option<f64>,
        lon: Option<f64>,
        weather: &Value,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Store a forecast payload and refresh `cached_at` on an existing entry.
    async fn update_forecast(
        &self,
        key: &LocationKey,
        forecast: &Value,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;
}

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPool::connect(database_url).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS location_lookups (
            location_key TEXT PRIMARY KEY,
            zip VARCHAR(10),
            city VARCHAR(255),
            state VARCHAR(2),
            latitude DOUBLE PRECISION,
            longitude DOUBLE PRECISION,
            weather JSONB,
            forecast JSONB,
            cached_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    info!("Database migrations completed successfully");
    Ok(())
}

#[derive(sqlx::FromRow)]
struct LocationRow {
    latitude: Option<f64>,
    longitude: Option<f64>,
    weather: Option<Value>,
    forecast: Option<Value>,
    cached_at: Option<DateTime<Utc>>,
}

impl LocationRow {
    fn into_record(self, key: &LocationKey) -> LocationRecord {
        LocationRecord {
            key: key.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            weather: self.weather.unwrap_or(Value::Null),
            forecast: self.forecast,
            cached_at: self.cached_at,
        }
    }
}

/// Postgres-backed store. The upsert is a single
/// `INSERT ... ON CONFLICT DO UPDATE` on the canonical key, so concurrent
/// same-key lookups cannot create duplicates or lose updates.
pub struct PgLocationStore {
    pool: PgPool,
    ttl: Duration,
}

impl PgLocationStore {
    pub fn new(pool: PgPool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }
}

#[async_trait]
impl LocationStore for PgLocationStore {
    async fn find(&self, key: &LocationKey) -> Result<Option<LocationRecord>, AppError> {
        let row = sqlx::query_as::<_, LocationRow>(
            r#"
            SELECT latitude, longitude, weather, forecast, cached_at
            FROM location_lookups
            WHERE location_key = $1
            "#,
        )
        .bind(key.canonical())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_record(key)))
    }

    async fn find_fresh(
        &self,
        key: &LocationKey,
        now: DateTime<Utc>,
    ) -> Result<Option<LocationRecord>, AppError> {
        let row = sqlx::query_as::<_, LocationRow>(
            r#"
            SELECT latitude, longitude, weather, forecast, cached_at
            FROM location_lookups
            WHERE location_key = $1
              AND cached_at IS NOT NULL
              AND cached_at > $2
            "#,
        )
        .bind(key.canonical())
        .bind(now - self.ttl)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_record(key)))
    }

    async fn upsert_weather(
        &self,
        key: &LocationKey,
        lat: Option<f64>,
        lon: Option<f64>,
        weather: &Value,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let (Some(lat), Some(lon)) = (lat, lon) else {
            debug!(key = %key.canonical(), "no coordinates on payload, skipping upsert");
            return Ok(());
        };

        let (city, state) = key.city_state();
        sqlx::query(
            r#"
            INSERT INTO location_lookups
                (location_key, zip, city, state, latitude, longitude, weather, cached_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (location_key) DO UPDATE SET
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                weather = EXCLUDED.weather,
                cached_at = GREATEST(location_lookups.cached_at, EXCLUDED.cached_at),
                updated_at = NOW()
            "#,
        )
        .bind(key.canonical())
        .bind(key.zip())
        .bind(city)
        .bind(state)
        .bind(lat)
        .bind(lon)
        .bind(weather)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_forecast(
        &self,
        key: &LocationKey,
        forecast: &Value,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE location_lookups
            SET forecast = $2,
                cached_at = GREATEST(cached_at, $3),
                updated_at = NOW()
            WHERE location_key = $1
            "#,
        )
        .bind(key.canonical())
        .bind(forecast)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// In-memory store behind the same trait; used by tests and local runs
/// without a database. Writers serialize through the lock, which gives the
/// same atomic-upsert guarantee the SQL statement provides.
pub struct MemoryLocationStore {
    entries: RwLock<HashMap<String, LocationRecord>>,
    ttl: Duration,
}

impl MemoryLocationStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }
}

#[async_trait]
impl LocationStore for MemoryLocationStore {
    async fn find(&self, key: &LocationKey) -> Result<Option<LocationRecord>, AppError> {
        Ok(self.entries.read().await.get(&key.canonical()).cloned())
    }

    async fn find_fresh(
        &self,
        key: &LocationKey,
        now: DateTime<Utc>,
    ) -> Result<Option<LocationRecord>, AppError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&key.canonical())
            .filter(|record| record.is_fresh(now, self.ttl))
            .cloned())
    }

    async fn upsert_weather(
        &self,
        key: &LocationKey,
        lat: Option<f64>,
        lon: Option<f64>,
        weather: &Value,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let (Some(lat), Some(lon)) = (lat, lon) else {
            debug!(key = %key.canonical(), "no coordinates on payload, skipping upsert");
            return Ok(());
        };

        let mut entries = self.entries.write().await;
        entries
            .entry(key.canonical())
            .and_modify(|record| {
                record.latitude = Some(lat);
                record.longitude = Some(lon);
                record.weather = weather.clone();
                record.cached_at = Some(record.cached_at.map_or(now, |at| at.max(now)));
            })
            .or_insert_with(|| LocationRecord {
                key: key.clone(),
                latitude: Some(lat),
                longitude: Some(lon),
                weather: weather.clone(),
                forecast: None,
                cached_at: Some(now),
            });

        Ok(())
    }

    async fn update_forecast(
        &self,
        key: &LocationKey,
        forecast: &Value,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut entries = self.entries.write().await;
        if let Some(record) = entries.get_mut(&key.canonical()) {
            record.forecast = Some(forecast.clone());
            record.cached_at = Some(record.cached_at.map_or(now, |at| at.max(now)));
        }
        Ok(())
    }
}
