//! Transport envelope.
//!
//! Every public operation returns `Result<T>`; [`Response`] is the shape
//! that result takes on the wire: `{"status": "success", "payload": ...}` or
//! `{"status": "error", "error": {"kind": ..., "message": ...}}`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind().to_owned(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response<T> {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> Response<T> {
    pub fn success(payload: T) -> Self {
        Self {
            status: Status::Success,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn failure(err: &Error) -> Self {
        Self {
            status: Status::Error,
            payload: None,
            error: Some(err.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

impl<T> From<Result<T>> for Response<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(payload) => Self::success(payload),
            Err(err) => {
                tracing::debug!(kind = err.kind(), "Operation failed: {err}");
                Self::failure(&err)
            }
        }
    }
}

impl<T: Serialize> Response<T> {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
