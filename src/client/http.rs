//! HTTP Client
//!
//! JSON REST client with admission control, per-attempt timeouts,
//! exponential backoff on transport failures and `429` handling.

use crate::client::rate_limiter::RateLimiter;
use crate::client::retry::{backoff_delay, retry_after};
use crate::client::transport::{
    HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError,
};
use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT,
};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Per-call additions to a request
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Headers merged on top of the client defaults
    pub headers: HashMap<String, String>,
    /// Query parameters, in order
    pub query: Vec<(String, String)>,
    /// JSON body
    pub body: Option<Value>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or override a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set the JSON body
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// What follows an attempt
enum Outcome {
    Done(HttpResponse),
    Retry(Duration),
    Fail(ApiError),
}

/// REST client with rate limiting and retries
pub struct ApiClient {
    /// Base URL without trailing slash
    base_url: String,

    /// Content-Type, User-Agent, Authorization and configured defaults
    default_headers: HeaderMap,

    limiter: Arc<RateLimiter>,
    transport: Arc<dyn Transport>,

    max_retries: u32,
    retry_delay: Duration,
    timeout: Duration,
    retry_on_server_error: bool,
}

impl ApiClient {
    /// Create a client talking HTTP through `reqwest`
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::new().map_err(|e| {
            ApiError::Config(format!("Failed to create HTTP client: {}", e))
        })?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a client over a custom transport, with its own limiter
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let limiter = RateLimiter::new(config.rate_limit, config.rate_period_duration())?;
        Self::with_parts(config, transport, Arc::new(limiter))
    }

    /// Create a client from explicit collaborators. Clients built with the
    /// same limiter share one request budget.
    pub fn with_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self> {
        config.validate()?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| ApiError::Config(format!("Invalid user agent: {}", e)))?,
        );
        if let Some(key) = config.resolve_api_key() {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| ApiError::Config(format!("Invalid API key format: {}", e)))?;
            value.set_sensitive(true);
            default_headers.insert(AUTHORIZATION, value);
        }
        merge_headers(&mut default_headers, &config.headers).map_err(ApiError::Config)?;

        Ok(Self {
            base_url: config.normalized_base_url().to_string(),
            default_headers,
            limiter,
            transport,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay_duration(),
            timeout: config.timeout_duration(),
            retry_on_server_error: config.retry_on_server_error,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// GET request
    pub async fn get(&self, endpoint: &str) -> Result<Value> {
        self.request(Method::GET, endpoint, RequestOptions::default())
            .await
    }

    /// POST request with a JSON body
    pub async fn post(&self, endpoint: &str, body: &impl Serialize) -> Result<Value> {
        self.request(Method::POST, endpoint, json_options(body)?)
            .await
    }

    /// PUT request with a JSON body
    pub async fn put(&self, endpoint: &str, body: &impl Serialize) -> Result<Value> {
        self.request(Method::PUT, endpoint, json_options(body)?)
            .await
    }

    /// DELETE request
    pub async fn delete(&self, endpoint: &str) -> Result<Value> {
        self.request(Method::DELETE, endpoint, RequestOptions::default())
            .await
    }

    /// Request returning the decoded JSON body
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Value> {
        self.request_as(method, endpoint, options).await
    }

    /// Request decoding the body into `R`. An empty body decodes as JSON `null`.
    pub async fn request_as<R>(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let response = self.execute(method, endpoint, options).await?;

        if response.body.iter().all(u8::is_ascii_whitespace) {
            return serde_json::from_value(Value::Null).map_err(|e| {
                ApiError::Decode(format!("Empty response body: {}", e))
            });
        }

        serde_json::from_slice(&response.body).map_err(|e| {
            let body = response.text();
            ApiError::Decode(format!(
                "Failed to parse response: {}. Body: {}",
                e,
                truncate(&body, 500)
            ))
        })
    }

    /// Run the attempt loop and return the first successful response
    #[tracing::instrument(skip(self, options), fields(url = %self.url(endpoint)))]
    pub async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse> {
        let mut headers = self.default_headers.clone();
        merge_headers(&mut headers, &options.headers).map_err(ApiError::InvalidRequest)?;

        let request = HttpRequest {
            method,
            url: self.url(endpoint),
            headers,
            query: options.query,
            body: options.body,
        };

        let mut attempt = 0;
        loop {
            self.limiter.acquire().await;

            debug!(attempt, "sending request");
            let send = self.transport.send(request.clone());
            let result = match tokio::time::timeout(self.timeout, send).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::timeout(self.timeout)),
            };

            match self.classify(result, attempt) {
                Outcome::Done(response) => return Ok(response),
                Outcome::Retry(delay) => {
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Outcome::Fail(err) => return Err(err),
            }
        }
    }

    /// Decide what follows attempt `attempt` (0-based)
    fn classify(
        &self,
        result: std::result::Result<HttpResponse, TransportError>,
        attempt: u32,
    ) -> Outcome {
        let attempts_left = attempt < self.max_retries;

        let response = match result {
            Ok(response) => response,
            Err(e) if !e.is_retryable() => return Outcome::Fail(ApiError::Transport(e)),
            Err(e) if attempts_left => {
                let delay = backoff_delay(self.retry_delay, attempt);
                warn!(
                    error = %e,
                    attempt = attempt + 1,
                    max_retries = self.max_retries,
                    delay_ms = millis(delay),
                    "request failed, retrying"
                );
                return Outcome::Retry(delay);
            }
            Err(e) => {
                error!(error = %e, attempts = attempt + 1, "request failed, giving up");
                return Outcome::Fail(ApiError::TransportExhausted {
                    attempts: attempt + 1,
                    source: e,
                });
            }
        };

        let status = response.status;
        if status.is_success() {
            return Outcome::Done(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let hinted = retry_after(&response.headers);
            if attempts_left {
                let delay = hinted.unwrap_or(self.retry_delay);
                warn!(
                    attempt = attempt + 1,
                    delay_ms = millis(delay),
                    "rate limited, waiting"
                );
                return Outcome::Retry(delay);
            }
            error!(attempts = attempt + 1, "rate limited, out of retries");
            return Outcome::Fail(ApiError::RateLimited {
                retry_after: hinted,
                body: response.text(),
            });
        }

        if status.is_server_error() && self.retry_on_server_error && attempts_left {
            let delay = backoff_delay(self.retry_delay, attempt);
            warn!(
                status = status.as_u16(),
                attempt = attempt + 1,
                delay_ms = millis(delay),
                "server error, retrying"
            );
            return Outcome::Retry(delay);
        }

        debug!(status = status.as_u16(), "request failed with error status");
        Outcome::Fail(ApiError::HttpStatus {
            status,
            body: response.text(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }
}

fn json_options(body: &impl Serialize) -> Result<RequestOptions> {
    let body = serde_json::to_value(body)
        .map_err(|e| ApiError::InvalidRequest(format!("Failed to serialize body: {}", e)))?;
    Ok(RequestOptions::default().json(body))
}

/// Insert `extra` into `headers`, replacing same-named entries
fn merge_headers(
    headers: &mut HeaderMap,
    extra: &HashMap<String, String>,
) -> std::result::Result<(), String> {
    for (key, value) in extra {
        let name = HeaderName::try_from(key.as_str())
            .map_err(|e| format!("Invalid header name {:?}: {}", key, e))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| format!("Invalid value for header {:?}: {}", key, e))?;
        headers.insert(name, value);
    }
    Ok(())
}

fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
