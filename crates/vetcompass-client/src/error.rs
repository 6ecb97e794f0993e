//! Client error types.

use bytes::Bytes;
use thiserror::Error;

use crate::outcome::{CancelReason, Failure};

/// Client error type.
#[derive(Debug, Error)]
pub enum Error {
    /// A request record was malformed (empty search expression, etc).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport-level failure not originating from reqwest.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Server answered with a non-success status.
    #[error("Server returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body, possibly empty.
        body: Bytes,
    },

    /// Query or selection issued before `start`/`resume`.
    #[error("Coding session not started")]
    NotStarted,

    /// `start` or `resume` called on a session that is already running.
    #[error("Coding session already started")]
    AlreadyStarted,

    /// The session has faulted and can no longer be used.
    #[error("Coding session is faulted")]
    SessionFaulted,

    /// A blocking call was made from a thread driving a tokio runtime.
    #[error("Blocking call made from within a tokio runtime")]
    BlockingInRuntime,

    /// The operation was cancelled before completing.
    #[error("Operation cancelled: {0}")]
    Cancelled(CancelReason),

    /// The operation failed; carries every underlying cause.
    #[error("{0}")]
    Failed(Failure),

    /// A spawned task panicked or was torn down by the runtime.
    #[error("Task aborted: {0}")]
    TaskAborted(String),
}

impl Error {
    /// Check if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        match self {
            Error::Status { status, .. } => *status >= 500,
            Error::Failed(failure) => failure.root_cause().is_server_error(),
            _ => false,
        }
    }

    /// Check if this is a cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }

    /// Check if the caller misused the session rather than the request failing.
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            Error::NotStarted
                | Error::AlreadyStarted
                | Error::SessionFaulted
                | Error::BlockingInRuntime
        )
    }

    /// Body text supplied by the server alongside a non-success status.
    ///
    /// Returns `None` when the error did not come from a server response or
    /// the body was empty. Invalid UTF-8 is replaced rather than rejected.
    pub fn server_body(&self) -> Option<String> {
        match self {
            Error::Status { body, .. } if !body.is_empty() => {
                Some(String::from_utf8_lossy(body).into_owned())
            }
            Error::Failed(failure) => failure.causes().iter().find_map(|c| c.server_body()),
            _ => None,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
