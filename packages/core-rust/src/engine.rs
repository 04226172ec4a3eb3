//! The decision-engine capability boundary.
//!
//! Bucketing, audience evaluation, traffic allocation, config polling, and
//! impression dispatch are all owned by an external engine. This crate only
//! defines the capability it must provide, so any concrete SDK (or a test
//! fake) can be injected at the seam.

use async_trait::async_trait;

use crate::context::UserContext;

/// Failures reported by a decision engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("unknown experiment key: {key}")]
    UnknownExperiment { key: String },
    #[error("decision engine fault: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Capability to bucket a user into an experiment variation.
///
/// Implementations must be safe for concurrent use: a single handle is
/// shared across every in-flight request. Activating a user is an
/// externally-visible event (the engine records an impression for
/// analytics), so callers must not retry a failed activation implicitly.
#[async_trait]
pub trait DecisionEngine: Send + Sync {
    /// Returns the key of the variation `user` is bucketed into for
    /// `experiment_key`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownExperiment`] when the key does not
    /// resolve to a running experiment, and [`EngineError::Internal`] for
    /// any other engine fault.
    async fn activate(
        &self,
        experiment_key: &str,
        user: &UserContext,
    ) -> Result<String, EngineError>;
}
