//! Client Module
//!
//! Retrying HTTP client, rate limiting and the transport it runs on.

pub mod http;
pub mod rate_limiter;
pub mod retry;
pub mod transport;

pub use http::{ApiClient, RequestOptions};
pub use rate_limiter::RateLimiter;
pub use transport::{
    HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError, TransportErrorKind,
};
