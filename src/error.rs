//! Error taxonomy for tabsmith operations.
//!
//! Every failure surfaced by the engine is one of a small, closed set of
//! kinds. The kind string returned by [`Error::kind`] is stable and is what
//! the response envelope serializes, so callers on the other side of the
//! transport can branch on it without parsing messages.
//!
//! ```
//! use tabsmith::error::Error;
//!
//! let err = Error::Validation("epsilon must be non-negative".to_owned());
//! assert_eq!(err.kind(), "validation_error");
//! assert_eq!(err.to_string(), "Validation error: epsilon must be non-negative");
//! ```
//!
//! ## Context Extension Trait
//!
//! [`ResultExt`] adds `.context()` to any result whose error converts into
//! [`Error`]. The original kind is kept; only the message gains a prefix.
//!
//! ```no_run
//! use tabsmith::error::{Result, ResultExt as _};
//!
//! fn read_source(path: &str) -> Result<String> {
//!     std::fs::read_to_string(path).context("Failed to read dataset")
//! }
//! ```

use std::time::Duration;

/// Main error type for tabsmith operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unreadable or malformed source data.
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// Out-of-range configuration or arguments.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The dataset handed to a session call is not the one the session was
    /// created for.
    #[error("Context mismatch: session expects dataset {expected}, got {actual}")]
    ContextMismatch { expected: String, actual: String },

    /// Unknown, expired or terminated session.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Another continuation for the same session is still running.
    #[error("Session busy: {0} already has a step in flight")]
    SessionBusy(String),

    /// A phase or profiling pass exceeded its budget.
    #[error("Computation timeout: {what} exceeded its budget of {budget:?}")]
    ComputationTimeout { what: String, budget: Duration },

    /// The caller cancelled the run.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),
}

impl Error {
    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DataAccess(_) => "data_access_error",
            Self::Validation(_) => "validation_error",
            Self::ContextMismatch { .. } => "context_mismatch_error",
            Self::SessionNotFound(_) => "session_not_found_error",
            Self::SessionBusy(_) => "session_busy",
            Self::ComputationTimeout { .. } => "computation_timeout",
            Self::Cancelled(_) => "cancelled",
        }
    }

    fn with_prefix(self, prefix: &str) -> Self {
        match self {
            Self::DataAccess(msg) => Self::DataAccess(format!("{prefix}: {msg}")),
            Self::Validation(msg) => Self::Validation(format!("{prefix}: {msg}")),
            Self::SessionNotFound(msg) => Self::SessionNotFound(format!("{prefix}: {msg}")),
            Self::SessionBusy(msg) => Self::SessionBusy(format!("{prefix}: {msg}")),
            Self::Cancelled(msg) => Self::Cancelled(format!("{prefix}: {msg}")),
            Self::ComputationTimeout { what, budget } => Self::ComputationTimeout {
                what: format!("{prefix}: {what}"),
                budget,
            },
            other @ Self::ContextMismatch { .. } => other,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::DataAccess(format!("I/O error: {err}"))
    }
}

impl From<polars::error::PolarsError> for Error {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::DataAccess(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("JSON error: {err}"))
    }
}

/// Result type alias for tabsmith operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait to add context to results.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_prefix(&msg.into()))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_prefix(&f()))
    }
}
