//! Fetch capability: one outbound HTTP request with a per-call retry policy.
//!
//! Any HTTP status is a response, not an error. Transport failures (refused
//! connection, DNS, timeout) also come back as an unsuccessful response with
//! no status, since an unreachable site is down. Only a request that cannot
//! be issued at all is a [`FetchError`].

use std::time::Duration;

use async_trait::async_trait;
use http::{Method, StatusCode};
use tracing::instrument;

use crate::config::{
    DEFAULT_RETRY_FACTOR, DEFAULT_RETRY_MAX_ATTEMPTS, DEFAULT_RETRY_MAX_DELAY_MS,
    DEFAULT_RETRY_MIN_DELAY_MS, USER_AGENT,
};

/// A request that could not be issued at all
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Invalid request for '{url}': {message}")]
    InvalidRequest { url: String, message: String },

    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

/// Retry behavior for a single fetch call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub enabled: bool,
    /// Total attempts including the first
    pub max_attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            min_delay: Duration::from_millis(DEFAULT_RETRY_MIN_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
            factor: DEFAULT_RETRY_FACTOR,
        }
    }
}

impl RetryPolicy {
    /// Exactly one attempt
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Total attempts this policy allows
    pub fn attempts(&self) -> u32 {
        if self.enabled {
            self.max_attempts.max(1)
        } else {
            1
        }
    }

    /// Delay before retry number `retry` (0-based), capped at `max_delay`
    pub fn delay_for(&self, retry: u32) -> Duration {
        let scaled = self.min_delay.as_secs_f64() * self.factor.powi(retry as i32);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }
}

/// One outbound request with its retry policy
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: String,
    pub retry: RetryPolicy,
}

impl FetchRequest {
    /// GET `url` with the default retry policy
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Outcome of a fetch. `status` is `None` when no HTTP response arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: Option<u16>,
    pub ok: bool,
}

impl FetchResponse {
    /// Successful only for 2xx
    pub fn from_status(status: StatusCode) -> Self {
        Self {
            status: Some(status.as_u16()),
            ok: status.is_success(),
        }
    }

    /// No HTTP response arrived
    pub fn unreachable() -> Self {
        Self {
            status: None,
            ok: false,
        }
    }

    fn is_retryable(&self) -> bool {
        match self.status {
            None => true,
            Some(code) => code >= 500 || code == StatusCode::TOO_MANY_REQUESTS.as_u16(),
        }
    }
}

/// Capability to execute an HTTP request
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError>;
}

/// `reqwest`-backed fetcher
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Client with a per-request `timeout`
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    async fn attempt(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let result = self
            .client
            .request(request.method.clone(), &request.url)
            .send()
            .await;

        match result {
            Ok(response) => Ok(FetchResponse::from_status(response.status())),
            Err(e) if e.is_builder() => Err(FetchError::InvalidRequest {
                url: request.url.clone(),
                message: e.to_string(),
            }),
            Err(e) => {
                tracing::warn!(error = %e, timeout = e.is_timeout(), "Request failed");
                Ok(FetchResponse::unreachable())
            }
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(
        name = "fetch",
        skip(self, request),
        fields(method = %request.method, url = %request.url, retry = request.retry.enabled)
    )]
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let attempts = request.retry.attempts();
        let mut attempt = 1;

        loop {
            let response = self.attempt(request).await?;
            tracing::debug!(attempt, status = ?response.status, ok = response.ok, "Fetch attempt");

            if response.ok || !response.is_retryable() || attempt >= attempts {
                return Ok(response);
            }

            let delay = request.retry.delay_for(attempt - 1);
            tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "Retrying fetch");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            enabled: true,
            max_attempts,
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            factor: 2.0,
        }
    }

    #[test]
    fn test_disabled_policy_makes_one_attempt() {
        let policy = RetryPolicy {
            max_attempts: 10,
            ..RetryPolicy::disabled()
        };
        assert_eq!(policy.attempts(), 1);
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(10), Duration::from_secs(10));
    }

    #[test]
    fn test_fetch_response_ok_only_for_2xx() {
        assert!(FetchResponse::from_status(StatusCode::OK).ok);
        assert!(FetchResponse::from_status(StatusCode::NO_CONTENT).ok);
        assert!(!FetchResponse::from_status(StatusCode::MOVED_PERMANENTLY).ok);
        assert!(!FetchResponse::from_status(StatusCode::NOT_FOUND).ok);
        assert!(!FetchResponse::from_status(StatusCode::SERVICE_UNAVAILABLE).ok);
        assert!(!FetchResponse::unreachable().ok);
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let request = FetchRequest::get(server.uri()).with_retry(RetryPolicy::disabled());
        let response = fetcher.fetch(&request).await.unwrap();

        assert_eq!(response, FetchResponse { status: Some(200), ok: true });
    }

    #[tokio::test]
    async fn test_fetch_disabled_retry_hits_server_once_on_503() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let request = FetchRequest::get(server.uri()).with_retry(RetryPolicy::disabled());
        let response = fetcher.fetch(&request).await.unwrap();

        assert_eq!(response.status, Some(503));
        assert!(!response.ok);
    }

    #[tokio::test]
    async fn test_fetch_enabled_retry_retries_5xx() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let request = FetchRequest::get(server.uri()).with_retry(fast_retry(3));
        let response = fetcher.fetch(&request).await.unwrap();

        assert_eq!(response.status, Some(502));
    }

    #[tokio::test]
    async fn test_fetch_enabled_retry_skips_4xx() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let request = FetchRequest::get(server.uri()).with_retry(fast_retry(3));
        let response = fetcher.fetch(&request).await.unwrap();

        assert_eq!(response.status, Some(404));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_is_unsuccessful_response() {
        // Bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = HttpFetcher::new(Duration::from_secs(2)).unwrap();
        let request =
            FetchRequest::get(format!("http://{}/", addr)).with_retry(RetryPolicy::disabled());
        let response = fetcher.fetch(&request).await.unwrap();

        assert_eq!(response, FetchResponse::unreachable());
    }

    #[tokio::test]
    async fn test_fetch_invalid_url_is_error() {
        let fetcher = HttpFetcher::new(Duration::from_secs(2)).unwrap();
        let request = FetchRequest::get("not a url").with_retry(RetryPolicy::disabled());
        assert!(matches!(
            fetcher.fetch(&request).await,
            Err(FetchError::InvalidRequest { .. })
        ));
    }
}
