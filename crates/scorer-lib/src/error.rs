//! Error types for the scoring extender

use thiserror::Error;

/// Errors surfaced to the scheduler for a single request
#[derive(Debug, Error)]
pub enum ExtenderError {
    #[error("malformed request body: {0}")]
    MalformedRequest(String),

    #[error("request carries no candidate nodes")]
    NoCandidates,

    #[error("request must set exactly one of `nodes` or `nodenames`")]
    AmbiguousCandidates,

    #[error("failed to serialize response: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ExtenderError {
    /// Stable identifier used in error bodies and metric labels
    pub fn code(&self) -> &'static str {
        match self {
            ExtenderError::MalformedRequest(_) => "malformed_request",
            ExtenderError::NoCandidates => "no_candidates",
            ExtenderError::AmbiguousCandidates => "ambiguous_candidates",
            ExtenderError::Serialization(_) => "serialization",
        }
    }

    /// True for errors caused by the caller's input
    pub fn is_request_error(&self) -> bool {
        !matches!(self, ExtenderError::Serialization(_))
    }
}

/// Failure of one dimension query against the monitoring backend
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("undecodable backend payload: {0}")]
    Decode(String),

    #[error("backend reported status {status:?}: {message}")]
    NotSuccess { status: String, message: String },

    #[error("query task did not complete: {0}")]
    Aborted(String),
}

impl QueryError {
    /// Short label for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            QueryError::Timeout => "timeout",
            QueryError::Transport(_) => "transport",
            QueryError::Status { .. } => "http_status",
            QueryError::Decode(_) => "decode",
            QueryError::NotSuccess { .. } => "not_success",
            QueryError::Aborted(_) => "aborted",
        }
    }
}

impl From<reqwest::Error> for QueryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            QueryError::Timeout
        } else if err.is_decode() {
            QueryError::Decode(err.to_string())
        } else {
            QueryError::Transport(err.to_string())
        }
    }
}

/// Invalid scoring policy configuration
#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("cutoffs must satisfy 0 <= min_ratio < max_ratio (got {min} / {max})")]
    Cutoffs { min: f64, max: f64 },

    #[error("weight `{0}` must be finite and non-negative")]
    Weight(&'static str),

    #[error("neutral score must lie in [0, 100] (got {0})")]
    NeutralScore(f64),
}
