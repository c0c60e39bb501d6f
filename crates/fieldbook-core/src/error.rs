//! Error types for the Fieldbook connectivity layer.
//!
//! `ClientError` is what callers of the resilient client observe. Resolution
//! failures get their own cloneable type because a single probing cycle is
//! shared by every caller waiting on it.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for requests issued through the resilient client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No candidate answered, or the transport failed (refused, DNS, timeout).
    #[error("Backend unreachable: {message}")]
    Unreachable { message: String },

    /// A protected call was issued without a stored credential.
    #[error("Authentication required for {path}")]
    AuthRequired { path: String },

    /// The backend answered with a non-2xx status and a structured error body.
    #[error("Request failed with status {status}: {body}")]
    BadStatus {
        status: u16,
        body: serde_json::Value,
    },

    /// The backend answered with HTML, an empty body, or something unparseable.
    #[error("Malformed response{}: {reason}", status_suffix(.status))]
    MalformedResponse { status: Option<u16>, reason: String },

    #[error("Request cancelled")]
    Cancelled,

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {})", s)).unwrap_or_default()
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Why endpoint resolution did not produce a usable endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("none of {attempted} candidate endpoints passed the health probe")]
    Unresolved { attempted: usize },

    #[error("endpoint resolution abandoned after {0:?}")]
    DeadlineExceeded(Duration),

    #[error("endpoint resolution task aborted: {0}")]
    Aborted(String),
}

impl From<ResolutionError> for ClientError {
    fn from(err: ResolutionError) -> Self {
        ClientError::Unreachable {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<crate::cancel::CancelledError> for ClientError {
    fn from(_: crate::cancel::CancelledError) -> Self {
        ClientError::Cancelled
    }
}

impl ClientError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        ClientError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Build a transport-level error from a reqwest failure.
    pub(crate) fn transport(url: &str, err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            "timed out"
        } else if err.is_connect() {
            "connection failed"
        } else {
            "transport error"
        };
        ClientError::Unreachable {
            message: format!("{} {}: {}", url, kind, err),
        }
    }

    /// Transport-level failures are the only ones worth retrying.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Unreachable { .. })
    }

    /// Failures that an offline substitute may stand in for.
    ///
    /// `BadStatus` carries actionable information and `AuthRequired` would hide
    /// a login requirement, so neither is ever masked.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ClientError::Unreachable { .. } | ClientError::MalformedResponse { .. }
        )
    }

    /// HTTP status attached to the error, if the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::BadStatus { status, .. } => Some(*status),
            ClientError::MalformedResponse { status, .. } => *status,
            _ => None,
        }
    }
}
