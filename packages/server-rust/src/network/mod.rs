//! REST adapter: routes, middleware stack, and shutdown control.

pub mod handlers;
pub mod middleware;
pub mod shutdown;

pub use handlers::AppState;
pub use shutdown::{HealthState, InFlightGuard, ShutdownController};

use axum::routing::{get, post};
use axum::Router;

use crate::config::ServiceConfig;
use crate::trace::TracingLayer;
use handlers::{activation_handler, health_handler, liveness_handler, readiness_handler};
use middleware::build_http_layers;

/// Span name for the activation route; fixed at registration time.
const ACTIVATION_SPAN: &str = "POST /projects/{project_id}/experiment/activation";

/// Assembles the axum router with all routes and middleware.
///
/// Routes:
/// - `GET /health` -- detailed health JSON
/// - `GET /health/live` -- liveness probe
/// - `GET /health/ready` -- readiness probe
/// - `POST /projects/{project_id}/experiment/activation` -- activation,
///   wrapped in the per-request tracing middleware
pub fn build_router(state: AppState, config: &ServiceConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .route(
            "/projects/{project_id}/experiment/activation",
            post(activation_handler).layer(TracingLayer::new(ACTIVATION_SPAN)),
        )
        .layer(build_http_layers(config))
        .with_state(state)
}
