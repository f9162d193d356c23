/// Error types shared across the medical retrieval crates.
///
/// These errors represent failures while talking to the two network peers
/// (the primary medical API and the Groq provider). Application-specific
/// errors are defined in the server crate and wrap `CommonError` via
/// `#[from]`.
use std::time::Duration;

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid response JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("upstream returned error: status={status} message={message}")]
    Upstream { status: StatusCode, message: String },

    #[error("deadline of {0:?} exceeded, request cancelled")]
    DeadlineExceeded(Duration),

    #[error("missing credential: {0} is not configured")]
    MissingCredential(&'static str),

    #[error("upstream response missing expected field: {0}")]
    MalformedResponse(&'static str),
}

impl CommonError {
    /// Whether this failure is an expected tier-level signal the caller
    /// recovers from by advancing to the next tier, as opposed to a bug.
    pub fn is_tier_failure(&self) -> bool {
        !matches!(self, CommonError::InvalidJson(_))
    }
}
