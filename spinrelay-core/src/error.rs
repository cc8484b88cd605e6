//! Error taxonomy for one loop iteration and its bonus rounds.

use thiserror::Error;

use crate::capture::RequestClass;

/// Failures raised while replaying a captured request or reading its reply.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SpinError {
    #[error("no {0} request has been captured")]
    CaptureMissing(RequestClass),
    #[error("captured request is malformed: {0}")]
    MalformedCapture(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("upstream rejected the request (status {status}): {reason}")]
    UpstreamRejected { status: u16, reason: String },
    #[error("bonus response violated the protocol: {0}")]
    BonusProtocol(String),
    #[error("session was cancelled")]
    Cancelled,
}

impl SpinError {
    /// Whether the failure feeds the consecutive-error budget.
    #[must_use]
    pub const fn counts_toward_limit(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }

    pub(crate) fn rejected(status: u16, reason: impl Into<String>) -> Self {
        Self::UpstreamRejected {
            status,
            reason: reason.into(),
        }
    }
}

/// Errors raised when loop configuration invariants are violated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoopConfigError {
    #[error("{field} minimum {min} ms exceeds maximum {max} ms")]
    DelayBounds {
        field: &'static str,
        min: u64,
        max: u64,
    },
    #[error("max_consecutive_errors must be at least 1 (got {0})")]
    ErrorBudget(u32),
    #[error("stop_on_loss must not be negative (got {0})")]
    NegativeLossLimit(i64),
}

/// Failures from a history sink.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history storage error: {0}")]
    Storage(String),
    #[error("history serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
