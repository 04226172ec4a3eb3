//! HTTP handler definitions for the REST adapter.
//!
//! `AppState` is the shared state carried through axum extractors; handler
//! functions are re-exported for the router builder in [`crate::network`].

pub mod activation;
pub mod health;

pub use activation::activation_handler;
pub use health::{health_handler, liveness_handler, readiness_handler};

use std::sync::Arc;
use std::time::Instant;

use crate::activation::ActivationHandler;
use crate::network::shutdown::ShutdownController;

/// Shared application state passed to all axum handlers via `State`.
///
/// Everything is behind an `Arc` so per-request clones are cheap.
#[derive(Clone)]
pub struct AppState {
    /// Protocol-agnostic activation dispatch, shared with the gRPC server.
    pub handler: Arc<ActivationHandler>,
    /// Drain coordination and in-flight accounting.
    pub shutdown: Arc<ShutdownController>,
    /// Process start time, used for uptime reporting.
    pub start_time: Instant,
}
