//! # Osprey HTTP
//!
//! Transport plumbing for the Osprey OpenSearch client: one HTTP exchange
//! per call, plus the backoff policies and retry executor that wrap it.
//!
//! ## Features
//!
//! - **Transport**: a pluggable [`Transport`] trait with a reqwest-backed
//!   implementation rotating over several node URLs
//! - **Backoff**: zero, stop, constant, simple and exponential policies
//! - **Retry**: an executor that runs an operation until it succeeds or the
//!   policy gives up, with an optional notify hook
//!
//! ## Retrying an operation
//!
//! ```rust,no_run
//! use osprey_http::{retry_notify, BackoffExt, ExponentialBackoff};
//! use std::time::Duration;
//!
//! # async fn flaky() -> Result<u32, std::io::Error> { Ok(1) }
//! #[tokio::main]
//! async fn main() -> Result<(), std::io::Error> {
//!     let backoff = ExponentialBackoff::new(Duration::from_millis(50), Duration::from_secs(5))
//!         .with_max_retries(4);
//!
//!     let value = retry_notify(flaky, &backoff, |err, wait| {
//!         eprintln!("attempt failed ({err}), retrying in {wait:?}");
//!     })
//!     .await?;
//!
//!     println!("got {value}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod backoff;
mod client;
mod config;
mod error;
mod retry;
mod transport;

pub use backoff::{
    Backoff, BackoffExt, Capped, ConstantBackoff, ExponentialBackoff, MaxRetries, SimpleBackoff,
    StopBackoff, ZeroBackoff,
};
pub use client::ReqwestTransport;
pub use config::{TransportConfig, TransportConfigBuilder};
pub use error::{Result, Retryable, TransportError};
pub use retry::{BackoffRetrier, Retrier, StopRetrier, retry, retry_notify, retry_with};
pub use transport::{Transport, TransportRequest, TransportResponse};

// Re-export common types
pub use bytes::Bytes;
pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};

/// Prelude for common imports.
///
/// ```
/// use osprey_http::prelude::*;
/// ```
pub mod prelude {
    pub use crate::backoff::{
        Backoff, BackoffExt, ConstantBackoff, ExponentialBackoff, SimpleBackoff, StopBackoff,
        ZeroBackoff,
    };
    pub use crate::client::ReqwestTransport;
    pub use crate::config::TransportConfig;
    pub use crate::error::{Retryable, TransportError};
    pub use crate::retry::{BackoffRetrier, Retrier, StopRetrier, retry, retry_notify, retry_with};
    pub use crate::transport::{Transport, TransportRequest, TransportResponse};
}
