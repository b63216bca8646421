#![forbid(unsafe_code)]

//! Error types for policy lookups.

use thiserror::Error;

use crate::sequencer::RequestToken;

/// Why a fetch did not produce a usable result.
///
/// Variants carry rendered messages so the error can be cloned into
/// observable query state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum FetchError {
    /// The request never produced a response (DNS, connect, timeout, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        message: String,
    },

    /// The server declined the lookup with an explanatory message.
    #[error("lookup rejected: {0}")]
    Rejected(String),

    /// The body was not a lookup payload (missing `invoices` or `policy`,
    /// wrong types, invalid JSON).
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl FetchError {
    /// Whether the payload arrived but could not be understood.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }

    /// Short, stable label for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Status { .. } => "status",
            Self::Rejected(_) => "rejected",
            Self::Malformed(_) => "malformed",
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// A submitted lookup failed; previous results were left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("query {token} failed: {error}")]
pub struct QueryFailed {
    /// The request that failed.
    pub token: RequestToken,
    /// The underlying cause.
    #[source]
    pub error: FetchError,
}
