//! Protocol-agnostic activation dispatch.
//!
//! Both wire adapters hand a canonical [`ActivationRequest`] to this
//! handler. It validates, bounds the decision-engine call with the
//! configured deadline, and classifies failures; the adapters only map the
//! classified error onto their wire status.

use std::sync::Arc;
use std::time::Duration;

use expgate_core::{ActivationError, ActivationRequest, ActivationResult, DecisionEngine};
use tracing::error;

/// Dispatches activation requests through the injected decision engine.
///
/// One instance is shared by every request on both protocols; it holds no
/// per-request state.
pub struct ActivationHandler {
    engine: Arc<dyn DecisionEngine>,
    deadline: Duration,
}

impl ActivationHandler {
    #[must_use]
    pub fn new(engine: Arc<dyn DecisionEngine>, deadline: Duration) -> Self {
        Self { engine, deadline }
    }

    /// Resolves one activation request to a variation.
    ///
    /// A request that fails validation never reaches the engine. The engine
    /// call runs under the handler deadline; when the deadline fires, the
    /// call's future is dropped rather than awaited further. Failures are
    /// surfaced immediately — no retries, since the engine records an
    /// impression per decision and a retry could double-count it.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError::Validation`] for malformed requests,
    /// [`ActivationError::DeadlineExceeded`] when the engine misses the
    /// deadline, and [`ActivationError::DecisionUnavailable`] for engine
    /// faults.
    pub async fn activate(
        &self,
        request: &ActivationRequest,
    ) -> Result<ActivationResult, ActivationError> {
        request
            .validate()
            .map_err(|reason| ActivationError::Validation { reason })?;

        let decision = tokio::time::timeout(
            self.deadline,
            self.engine
                .activate(&request.experiment_key, &request.user),
        )
        .await;

        // Attribute values are never logged here: the bag can carry PII.
        match decision {
            Ok(Ok(variation_key)) => Ok(ActivationResult { variation_key }),
            Ok(Err(source)) => {
                error!(
                    experiment_key = %request.experiment_key,
                    user_id = %request.user.id,
                    error = %source,
                    "activating user failed"
                );
                Err(ActivationError::DecisionUnavailable { source })
            }
            Err(_elapsed) => {
                let timeout_ms = u64::try_from(self.deadline.as_millis()).unwrap_or(u64::MAX);
                error!(
                    experiment_key = %request.experiment_key,
                    user_id = %request.user.id,
                    timeout_ms,
                    "activation deadline exceeded"
                );
                Err(ActivationError::DeadlineExceeded { timeout_ms })
            }
        }
    }
}
