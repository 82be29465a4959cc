//! restkit - Rate-limited JSON REST client
//!
//! An async HTTP client for JSON APIs that admits at most a fixed number of
//! requests per sliding window, retries connection failures with exponential
//! backoff and honours `429 Too Many Requests` with the server's
//! `Retry-After` hint.
//!
//! ```no_run
//! use restkit::{ApiClient, ClientConfig};
//!
//! # async fn run() -> restkit::Result<()> {
//! let config = ClientConfig::new("https://api.example.com")
//!     .api_key("your_api_key")
//!     .rate_limit(60, 60.0);
//! let client = ApiClient::new(config)?;
//!
//! let data = client.get("/endpoint").await?;
//! println!("{data}");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod logging;

pub use client::{ApiClient, RateLimiter, RequestOptions, Transport};
pub use config::{ClientConfig, ConfigLoader};
pub use error::{ApiError, Result};
