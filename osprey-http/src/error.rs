//! Transport error types.

use std::time::Duration;
use thiserror::Error;

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors raised while exchanging a request with a node.
///
/// These are the failures the retry executor absorbs: the
/// request may never have reached the node, or the node went away before
/// answering. Envelope statuses outside 2xx are *not* transport errors; the
/// transport hands those back as a normal response.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The node could not be reached.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The exchange did not complete in time.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The caller gave up on the exchange.
    #[error("Request canceled: {0}")]
    Canceled(String),

    /// No usable node URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The request could not be built.
    #[error("Failed to build request: {0}")]
    Request(String),

    /// Underlying HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_)) || matches!(self, Self::Http(e) if e.is_timeout())
    }

    /// Check if this is a connection error.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_)) || matches!(self, Self::Http(e) if e.is_connect())
    }
}

/// Classification used by retriers to decide whether an error is worth
/// another attempt.
pub trait Retryable {
    /// Whether the failure may be transient.
    fn is_retryable(&self) -> bool;

    /// Whether the caller canceled the operation. Cancellations are never
    /// retried, whatever the policy says.
    fn is_cancellation(&self) -> bool {
        false
    }

    /// The envelope status code, if the error carries one.
    fn status_code(&self) -> Option<u16> {
        None
    }
}

impl Retryable for TransportError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) | Self::Io(_) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Canceled(_) | Self::InvalidUrl(_) | Self::Request(_) | Self::UrlParse(_) => {
                false
            }
        }
    }

    fn is_cancellation(&self) -> bool {
        matches!(self, Self::Canceled(_))
    }

    fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
