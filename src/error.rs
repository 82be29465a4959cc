//! Restkit Error Types
//!
//! Error handling for the rate-limited REST client.

use crate::client::transport::TransportError;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Main error type for restkit operations
#[derive(Debug, Error)]
pub enum ApiError {
    /// Configuration errors (zero rate limit, malformed header, bad base URL, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Per-call options that cannot be turned into a request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Every attempt failed with a connection, timeout or I/O error
    #[error("Request failed after {attempts} attempts: {source}")]
    TransportExhausted {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// A transport failure that is not worth retrying
    #[error("Transport error: {0}")]
    Transport(#[source] TransportError),

    /// Non-success response other than 429
    #[error("Request failed with status {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },

    /// 429 response with no attempts left
    #[error("{}", rate_limited_message(.retry_after))]
    RateLimited {
        retry_after: Option<Duration>,
        body: String,
    },

    /// Response body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// IO error while reading configuration
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn rate_limited_message(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(wait) => format!(
            "Rate limited, retry after {:.1} seconds",
            wait.as_secs_f64()
        ),
        None => "Rate limited and out of retries".to_string(),
    }
}

impl ApiError {
    /// HTTP status carried by the error, if the server answered at all
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::HttpStatus { status, .. } => Some(*status),
            ApiError::RateLimited { .. } => Some(StatusCode::TOO_MANY_REQUESTS),
            _ => None,
        }
    }

    /// Whether issuing the same call again later could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::TransportExhausted { .. } | ApiError::RateLimited { .. } => true,
            ApiError::Transport(e) => e.is_retryable(),
            ApiError::HttpStatus { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(format!("JSON parsing error: {}", err))
    }
}

/// Result type alias for restkit operations
pub type Result<T> = std::result::Result<T, ApiError>;
