//! Concrete decision-engine adapters.
//!
//! The serving path only knows the `DecisionEngine` capability from
//! `expgate-core`; this module holds the adapters that implement it.

pub mod remote;

pub use remote::{EngineInitError, RemoteDecisionEngine};
