//! Outbound HTTP boundary shared by every network adapter.

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use super::FetchError;
use crate::config::HttpConfig;

/// Token bucket shared by all workers of a run.
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Minimal web surface the adapters need
#[async_trait]
pub trait WebClient: Send + Sync {
    /// GET `url` and return the body as text
    async fn get_text(&self, url: &str) -> Result<String, FetchError>;

    /// POST a JSON body and decode the JSON reply
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, FetchError>;

    /// Wait for a politeness permit before outbound work that does not go
    /// through this client (spawned tools, browsers)
    async fn pace(&self);
}

/// Time between sustained requests at `requests_per_second`.
pub fn request_period(requests_per_second: f64) -> anyhow::Result<Duration> {
    if !(requests_per_second.is_finite() && requests_per_second > 0.0) {
        anyhow::bail!("requests_per_second must be positive, got {}", requests_per_second);
    }
    Duration::try_from_secs_f64(1.0 / requests_per_second)
        .map_err(|_| anyhow::anyhow!("requests_per_second {} is too small", requests_per_second))
}

/// Build the shared limiter: `requests_per_second` sustained, `burst` at once.
pub fn build_limiter(requests_per_second: f64, burst: u32) -> anyhow::Result<Arc<Limiter>> {
    let period = request_period(requests_per_second)?;
    let burst = NonZeroU32::new(burst.max(1))
        .ok_or_else(|| anyhow::anyhow!("burst must be non-zero"))?;
    let quota = Quota::with_period(period)
        .ok_or_else(|| anyhow::anyhow!("rate limit period must be non-zero"))?
        .allow_burst(burst);

    Ok(Arc::new(RateLimiter::direct(quota)))
}

/// reqwest-backed client with fixed headers, a per-call timeout and the
/// shared rate limiter in front of every request.
pub struct HttpClient {
    client: Client,
    limiter: Arc<Limiter>,
}

impl HttpClient {
    pub fn new(config: &HttpConfig, limiter: Arc<Limiter>) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(&config.user_agent)?);
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_str(&config.accept_language)?);
        headers.insert(ACCEPT, HeaderValue::from_str(&config.accept)?);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, limiter })
    }

    fn check_status(status: StatusCode, url: &str) -> Result<(), FetchError> {
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(FetchError::Transient(format!("HTTP {} from {}", status, url)));
        }
        Err(FetchError::NotFound(format!("HTTP {} from {}", status, url)))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FetchError::Parse(e.to_string())
        } else if let Some(status) = e.status().filter(|s| s.is_client_error()) {
            if status == StatusCode::TOO_MANY_REQUESTS {
                FetchError::Transient(e.to_string())
            } else {
                FetchError::NotFound(e.to_string())
            }
        } else {
            // timeouts, connect failures, resets mid-body
            FetchError::Transient(e.to_string())
        }
    }
}

#[async_trait]
impl WebClient for HttpClient {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.limiter.until_ready().await;
        tracing::debug!("GET {}", url);

        let response = self.client.get(url).send().await?;
        Self::check_status(response.status(), url)?;
        Ok(response.text().await?)
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, FetchError> {
        self.limiter.until_ready().await;
        tracing::debug!("POST {}", url);

        let response = self.client.post(url).json(body).send().await?;
        Self::check_status(response.status(), url)?;
        Ok(response.json::<Value>().await?)
    }

    async fn pace(&self) {
        self.limiter.until_ready().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(HttpClient::check_status(StatusCode::OK, "u").is_ok());
        assert!(HttpClient::check_status(StatusCode::TOO_MANY_REQUESTS, "u")
            .unwrap_err()
            .is_transient());
        assert!(HttpClient::check_status(StatusCode::BAD_GATEWAY, "u")
            .unwrap_err()
            .is_transient());
        assert!(matches!(
            HttpClient::check_status(StatusCode::NOT_FOUND, "u"),
            Err(FetchError::NotFound(_))
        ));
    }

    #[test]
    fn test_build_limiter_rejects_bad_rates() {
        assert!(build_limiter(0.0, 1).is_err());
        assert!(build_limiter(f64::NAN, 1).is_err());
        assert!(build_limiter(1e-30, 1).is_err());
        assert!(build_limiter(2.0, 0).is_ok());
        assert_eq!(request_period(4.0).unwrap(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_limiter_allows_burst_immediately() {
        let limiter = build_limiter(1.0, 3).unwrap();
        for _ in 0..3 {
            assert!(limiter.check().is_ok());
        }
        assert!(limiter.check().is_err());
    }
}
