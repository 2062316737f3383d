//! Error types for OpenSearch operations.

use osprey_http::{Retryable, TransportError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// OpenSearch client error type.
#[derive(Error, Debug)]
pub enum Error {
    /// The exchange with the cluster failed before a response arrived.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The cluster answered with an envelope status outside 2xx.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The request was rejected before it was sent.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The caller's deadline ran out, retries included.
    #[error("Deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    /// Invalid client configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for OpenSearch operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Envelope status code, if the cluster answered.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api(e) => Some(e.status),
            _ => None,
        }
    }

    /// The reason OpenSearch reported, if any.
    pub fn error_reason(&self) -> Option<&str> {
        match self {
            Self::Api(e) => e.reason(),
            _ => None,
        }
    }

    /// Whether the cluster answered with `code`.
    pub fn is_status_code(&self, code: u16) -> bool {
        self.status_code() == Some(code)
    }

    /// HTTP 404.
    pub fn is_not_found(&self) -> bool {
        self.is_status_code(404)
    }

    /// HTTP 408.
    pub fn is_timeout(&self) -> bool {
        self.is_status_code(408)
    }

    /// HTTP 409, e.g. a version conflict.
    pub fn is_conflict(&self) -> bool {
        self.is_status_code(409)
    }

    /// HTTP 401.
    pub fn is_unauthorized(&self) -> bool {
        self.is_status_code(401)
    }

    /// HTTP 403.
    pub fn is_forbidden(&self) -> bool {
        self.is_status_code(403)
    }

    /// No node could be reached.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_connection())
    }

    /// The operation was canceled or ran past its deadline.
    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::DeadlineExceeded(_) => true,
            Self::Transport(e) => e.is_cancellation(),
            _ => false,
        }
    }
}

impl Retryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            _ => false,
        }
    }

    fn is_cancellation(&self) -> bool {
        Error::is_cancellation(self)
    }

    fn status_code(&self) -> Option<u16> {
        Error::status_code(self)
    }
}

/// An error response from OpenSearch: the envelope status plus whatever
/// details the cluster sent along.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    /// HTTP status of the response.
    pub status: u16,
    /// Parsed error details, if the body carried any.
    pub details: Option<ErrorDetails>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    status: u16,
    #[serde(default)]
    error: Option<ErrorField>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorField {
    Details(Box<ErrorDetails>),
    Message(String),
}

impl ApiError {
    /// Build an error from a status and a response body.
    ///
    /// Bodies that are empty or not JSON yield an error with the status only.
    /// A `status` field in the body wins over the envelope status unless it
    /// is zero; an `error` given as a plain string becomes the reason.
    pub fn from_body(status: u16, body: &[u8]) -> Self {
        let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) else {
            return Self {
                status,
                details: None,
            };
        };
        let details = parsed.error.map(|field| match field {
            ErrorField::Details(details) => *details,
            ErrorField::Message(reason) => ErrorDetails {
                reason,
                ..Default::default()
            },
        });
        Self {
            status: if parsed.status == 0 { status } else { parsed.status },
            details,
        }
    }

    /// The reported reason, if any.
    pub fn reason(&self) -> Option<&str> {
        self.details
            .as_ref()
            .map(|d| d.reason.as_str())
            .filter(|r| !r.is_empty())
    }

    /// The reported error type, if any.
    pub fn error_type(&self) -> Option<&str> {
        self.details
            .as_ref()
            .map(|d| d.kind.as_str())
            .filter(|t| !t.is_empty())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = http::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("");
        match &self.details {
            Some(details) if !details.reason.is_empty() => write!(
                f,
                "opensearch: Error {} ({}): {} [type={}]",
                self.status, text, details.reason, details.kind
            ),
            _ => write!(f, "opensearch: Error {} ({})", self.status, text),
        }
    }
}

impl std::error::Error for ApiError {}

/// Error details as reported by OpenSearch, both for failed requests and
/// for failed items of a bulk response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorDetails {
    /// Error type, e.g. `version_conflict_engine_exception`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Human readable reason.
    pub reason: String,
    /// Type of the resource involved, e.g. `index_or_alias`.
    #[serde(rename = "resource.type", skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    /// Id of the resource involved.
    #[serde(rename = "resource.id", skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// Index the error relates to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    /// Search phase that failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    /// Whether shard failures were grouped.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub grouped: bool,
    /// Underlying cause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caused_by: Option<Map<String, Value>>,
    /// Root causes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub root_cause: Vec<ErrorDetails>,
    /// Suppressed errors.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suppressed: Vec<ErrorDetails>,
    /// Per-shard failures.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_shards: Vec<Map<String, Value>>,
    /// Extra headers sent with the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<Map<String, Value>>,

    // Only set for script exceptions.
    /// Script stack excerpt.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub script_stack: Vec<String>,
    /// The failing script.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    /// Script language.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    /// Where in the script the error occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<ScriptErrorPosition>,
}

/// Position of an error within a script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptErrorPosition {
    /// Offset of the failing token.
    pub offset: i64,
    /// Start of the excerpt.
    pub start: i64,
    /// End of the excerpt.
    pub end: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_from_structured_body() {
        let body = br#"{
            "error": {
                "root_cause": [{"type": "index_not_found_exception", "reason": "no such index [x]"}],
                "type": "index_not_found_exception",
                "reason": "no such index [x]",
                "index": "x",
                "resource.type": "index_or_alias",
                "resource.id": "x"
            },
            "status": 404
        }"#;
        let err = ApiError::from_body(404, body);

        assert_eq!(err.status, 404);
        assert_eq!(err.reason(), Some("no such index [x]"));
        assert_eq!(err.error_type(), Some("index_not_found_exception"));
        let details = err.details.as_ref().unwrap();
        assert_eq!(details.resource_type.as_deref(), Some("index_or_alias"));
        assert_eq!(details.root_cause.len(), 1);
        assert_eq!(
            err.to_string(),
            "opensearch: Error 404 (Not Found): no such index [x] [type=index_not_found_exception]"
        );
    }

    #[test]
    fn test_api_error_from_string_error() {
        let err = ApiError::from_body(400, br#"{"error":"Incorrect HTTP method","status":405}"#);
        assert_eq!(err.status, 405);
        assert_eq!(err.reason(), Some("Incorrect HTTP method"));
    }

    #[test]
    fn test_api_error_without_body() {
        let err = ApiError::from_body(503, b"");
        assert_eq!(err.status, 503);
        assert!(err.details.is_none());
        assert_eq!(err.to_string(), "opensearch: Error 503 (Service Unavailable)");

        let err = ApiError::from_body(502, b"<html>bad gateway</html>");
        assert_eq!(err.status, 502);
        assert!(err.details.is_none());
    }

    #[test]
    fn test_zero_status_in_body_keeps_envelope_status() {
        let err = ApiError::from_body(500, br#"{"error":{"type":"x","reason":"y"}}"#);
        assert_eq!(err.status, 500);
    }

    #[test]
    fn test_script_error_details() {
        let body = br#"{"error":{"type":"script_exception","reason":"compile error",
            "script_stack":["doc['x'].value +", "                 ^---- HERE"],
            "script":"doc['x'].value +","lang":"painless",
            "position":{"offset":17,"start":0,"end":17}},"status":400}"#;
        let err = ApiError::from_body(400, body);
        let details = err.details.unwrap();
        assert_eq!(details.script_stack.len(), 2);
        assert_eq!(details.lang.as_deref(), Some("painless"));
        assert_eq!(
            details.position,
            Some(ScriptErrorPosition {
                offset: 17,
                start: 0,
                end: 17
            })
        );
    }

    #[test]
    fn test_status_helpers() {
        let err = Error::from(ApiError::from_body(409, b""));
        assert!(err.is_conflict());
        assert!(!err.is_not_found());
        assert!(err.is_status_code(409));
        assert!(!err.is_retryable());
        assert_eq!(Retryable::status_code(&err), Some(409));

        assert!(Error::from(ApiError::from_body(404, b"")).is_not_found());
        assert!(Error::from(ApiError::from_body(408, b"")).is_timeout());
        assert!(Error::from(ApiError::from_body(401, b"")).is_unauthorized());
        assert!(Error::from(ApiError::from_body(403, b"")).is_forbidden());
    }

    #[test]
    fn test_classification() {
        let err = Error::from(TransportError::Connection("refused".to_string()));
        assert!(err.is_connection_error());
        assert!(err.is_retryable());
        assert!(err.error_reason().is_none());

        let err = Error::DeadlineExceeded(Duration::from_secs(1));
        assert!(err.is_cancellation());
        assert!(!err.is_retryable());

        let err = Error::Validation("No bulk actions to commit".to_string());
        assert!(!err.is_retryable());
        assert!(!err.is_cancellation());
    }
}
