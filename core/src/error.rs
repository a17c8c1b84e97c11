//! Failure taxonomy for the request executor.
//!
//! # Design
//! Every failure is classified once, at the point where it happens, into a
//! `FailureKind`. Nothing downstream inspects an opaque error to figure out
//! what went wrong. `FetchError` is the single failure record returned to
//! callers: it always names the request URL and the 1-based attempt on which
//! it was produced.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Result of one logical request.
pub type Outcome<T> = Result<T, FetchError>;

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The request body could not be encoded.
    Serialization,
    /// Connection, DNS or protocol error from the transport.
    Transport,
    /// The attempt did not complete before its deadline.
    Timeout,
    /// A response arrived with a status outside 200..300.
    HttpStatus,
    /// The response body is not valid JSON.
    Decode,
    /// The body parsed but the validator rejected it.
    Validation,
    /// The caller cancelled the request.
    Cancelled,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Serialization => "serialization",
            FailureKind::Transport => "transport",
            FailureKind::Timeout => "timeout",
            FailureKind::HttpStatus => "http-status",
            FailureKind::Decode => "decode",
            FailureKind::Validation => "validation",
            FailureKind::Cancelled => "cancelled",
        }
    }

    /// Kinds reported to the error observer as soon as they are classified,
    /// on every attempt. All other kinds are reported once, at the end.
    pub(crate) fn observed_on_attempt(self) -> bool {
        matches!(self, FailureKind::HttpStatus | FailureKind::Validation)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified request failure.
#[derive(Debug, Clone, Error)]
#[error("{kind} failure for {url} (attempt {attempt}): {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
    pub url: String,
    pub status: Option<u16>,
    /// Diagnostic payload: the decoded error body for status failures, the
    /// truncated raw text for decode failures, the rejected value for
    /// validation failures.
    pub payload: Option<Value>,
    pub attempt: u32,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>, url: impl Into<String>, attempt: u32) -> Self {
        Self {
            kind,
            message: message.into(),
            url: url.into(),
            status: None,
            payload: None,
            attempt,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_payload(mut self, payload: Option<Value>) -> Self {
        self.payload = payload;
        self
    }

    pub fn is(&self, kind: FailureKind) -> bool {
        self.kind == kind
    }
}

/// Error raised by a `Transport` when no response was obtained.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::new(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn display_names_kind_url_and_attempt() {
        let err = FetchError::new(FailureKind::HttpStatus, "status 503", "https://x/api", 3).with_status(503);
        assert_eq!(err.to_string(), "http-status failure for https://x/api (attempt 3): status 503");
    }

    #[test]
    fn payload_is_attached_verbatim() {
        let err = FetchError::new(FailureKind::Validation, "missing field", "https://x", 1)
            .with_payload(Some(json!({"a": "x"})));
        assert_eq!(err.payload, Some(json!({"a": "x"})));
        assert!(err.is(FailureKind::Validation));
        assert!(err.status.is_none());
    }

    #[test]
    fn only_status_and_validation_are_observed_per_attempt() {
        assert!(FailureKind::HttpStatus.observed_on_attempt());
        assert!(FailureKind::Validation.observed_on_attempt());
        assert!(!FailureKind::Timeout.observed_on_attempt());
        assert!(!FailureKind::Transport.observed_on_attempt());
        assert!(!FailureKind::Decode.observed_on_attempt());
    }
}
