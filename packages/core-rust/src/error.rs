//! Classified activation failures surfaced to callers.

use crate::engine::EngineError;
use crate::normalize::NormalizeError;

/// Errors returned by the activation path, classified for wire mapping.
///
/// `Validation` is always a client fault and is never forwarded to the
/// decision engine. The other variants describe an engine that could not
/// produce a decision; they are surfaced to the caller immediately and
/// never retried here, because a successful activation implies an
/// impression record owned by the engine and a retry could double-count it.
#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    #[error("invalid activation request: {reason}")]
    Validation { reason: String },
    #[error("activation timed out after {timeout_ms}ms")]
    DeadlineExceeded { timeout_ms: u64 },
    #[error("decision engine unavailable")]
    DecisionUnavailable {
        #[source]
        source: EngineError,
    },
}

impl ActivationError {
    /// True for faults the caller can fix by changing the request.
    #[must_use]
    pub fn is_client_fault(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

impl From<NormalizeError> for ActivationError {
    fn from(err: NormalizeError) -> Self {
        Self::Validation {
            reason: err.to_string(),
        }
    }
}
