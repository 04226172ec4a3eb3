//! `expgate` Core — canonical user context, attribute normalization, and the
//! decision-engine capability boundary.
//!
//! Everything in this crate is protocol-agnostic: the gRPC and HTTP adapters
//! in `expgate-server` convert their wire formats into these types before any
//! decision is made. The actual bucketing algorithm lives behind the
//! [`DecisionEngine`] trait and is owned by an external collaborator.

pub mod context;
pub mod engine;
pub mod error;
pub mod normalize;

pub use context::{ActivationRequest, ActivationResult, UserContext};
pub use engine::{DecisionEngine, EngineError};
pub use error::ActivationError;
pub use normalize::{normalize, NormalizeError};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
