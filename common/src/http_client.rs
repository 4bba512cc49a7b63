use crate::errors::AppError;
use rand::Rng;
use reqwest::Client;
use std::time::Duration;
use tracing::{error, instrument, warn};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Retry configuration for a [`RetryingHttpClient`].
///
/// Immutable once constructed; a client owns its own copy so there is no
/// shared mutable retry state between instances.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Additional attempts after the first one. Total attempts = max_retries + 1.
    pub max_retries: u32,
    pub base_interval: Duration,
    /// Jitter fraction: the delay is scaled by `1 + interval_randomness * U`
    /// with `U` drawn uniformly from `[0, 1)`.
    pub interval_randomness: f64,
    pub backoff_factor: f64,
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_interval: Duration::from_millis(500),
            interval_randomness: 0.5,
            backoff_factor: 2.0,
            retryable_statuses: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    /// Policy that performs exactly one attempt and never sleeps.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_interval: Duration::ZERO,
            interval_randomness: 0.0,
            backoff_factor: 1.0,
            retryable_statuses: Vec::new(),
        }
    }

    pub fn retries_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// Backoff delay before retry `attempt` (1-indexed: the first retry is
    /// attempt 1). `unit` is the uniform jitter draw in `[0, 1)`, taken as a
    /// parameter so tests can pin it.
    pub fn delay(&self, attempt: u32, unit: f64) -> Duration {
        let base =
            self.base_interval.as_secs_f64() * self.backoff_factor.powi(attempt as i32 - 1);
        Duration::from_secs_f64(base * (1.0 + self.interval_randomness * unit))
    }
}

/// A completed upstream response. Non-2xx statuses are normal values here;
/// only transport failures surface as errors.
#[derive(Debug)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
    pub reason: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client bound to one base endpoint, with retry and exponential
/// backoff plus jitter for retryable statuses and transient transport
/// failures.
#[derive(Debug)]
pub struct RetryingHttpClient {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
}

impl RetryingHttpClient {
    pub fn new(base_url: impl Into<String>, policy: RetryPolicy) -> Result<Self, AppError> {
        Self::with_timeouts(base_url, DEFAULT_CONNECT_TIMEOUT, DEFAULT_TIMEOUT, policy)
    }

    pub fn with_timeouts(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            policy,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue a GET with the given query parameters, retrying per the policy.
    ///
    /// A response with a non-retryable non-2xx status is returned as-is;
    /// interpreting it is the caller's concern. A retryable status or a
    /// transient transport failure is re-attempted until retries exhaust,
    /// after which the last response is returned (statuses) or the failure
    /// propagates (transport).
    #[instrument(skip(self, params), fields(url = %self.base_url))]
    pub async fn get(&self, params: &[(&str, String)]) -> Result<ApiResponse, AppError> {
        let mut attempt: u32 = 0;

        loop {
            match self.attempt_get(params).await {
                Ok(response) => {
                    if self.policy.retries_status(response.status)
                        && attempt < self.policy.max_retries
                    {
                        attempt += 1;
                        self.backoff(attempt, &format!("status {}", response.status))
                            .await;
                        continue;
                    }
                    return Ok(response);
                }
                Err(err) if err.is_transient() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    self.backoff(attempt, &err.to_string()).await;
                }
                Err(err) => {
                    error!(attempts = attempt + 1, error = %err, "request failed, retries exhausted");
                    return Err(err);
                }
            }
        }
    }

    async fn attempt_get(&self, params: &[(&str, String)]) -> Result<ApiResponse, AppError> {
        let response = self.client.get(&self.base_url).query(params).send().await?;

        let status = response.status();
        let reason = status.canonical_reason().unwrap_or_default().to_string();
        let body = response.text().await?;

        Ok(ApiResponse {
            status: status.as_u16(),
            body,
            reason,
        })
    }

    async fn backoff(&self, attempt: u32, cause: &str) {
        let delay = self.policy.delay(attempt, rand::rng().random::<f64>());
        warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            cause,
            "retrying after backoff"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially_without_jitter() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1, 0.0), Duration::from_millis(500));
        assert_eq!(policy.delay(2, 0.0), Duration::from_millis(1000));
        assert_eq!(policy.delay(3, 0.0), Duration::from_millis(2000));
    }

    #[test]
    fn delay_stays_within_jitter_bounds() {
        let policy = RetryPolicy::default();
        for attempt in 1..=4u32 {
            let base = 0.5 * 2.0f64.powi(attempt as i32 - 1);
            for unit in [0.0, 0.25, 0.75, 0.999_999] {
                let d = policy.delay(attempt, unit).as_secs_f64();
                assert!(d >= base, "attempt {attempt} unit {unit}: {d} < {base}");
                assert!(
                    d <= base * 1.5,
                    "attempt {attempt} unit {unit}: {d} > {}",
                    base * 1.5
                );
            }
        }
    }

    #[test]
    fn zero_retry_policy_retries_nothing() {
        let policy = RetryPolicy::none();
        assert_eq!(policy.max_retries, 0);
        assert!(!policy.retries_status(500));
        assert!(!policy.retries_status(429));
    }

    #[test]
    fn default_policy_matches_retryable_statuses() {
        let policy = RetryPolicy::default();
        for status in [429, 500, 502, 503, 504] {
            assert!(policy.retries_status(status));
        }
        for status in [200, 301, 400, 401, 404, 501] {
            assert!(!policy.retries_status(status));
        }
    }
}
