//! Health, liveness, and readiness endpoint handlers.
//!
//! Exposed for orchestrators and load balancers. Liveness only says the
//! process is responsive; readiness additionally requires the decision
//! engine to have initialized and the drain not to have started.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::AppState;
use crate::network::shutdown::HealthState;

/// Returns detailed health information as JSON.
///
/// Always 200 -- the `state` field carries the actual condition, so
/// monitoring can tell "up but draining" from "down".
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let health = state.shutdown.health_state();
    let in_flight = state.shutdown.in_flight_count();
    let uptime_secs = state.start_time.elapsed().as_secs();

    Json(json!({
        "state": health.as_str(),
        "in_flight": in_flight,
        "uptime_secs": uptime_secs,
    }))
}

/// Liveness probe -- always 200 OK.
///
/// Deliberately ignores downstream dependencies: a failing liveness probe
/// triggers a restart, which would not fix a broken decision engine.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe -- 200 when `Ready`, 503 otherwise.
///
/// 503 during startup, during the drain, and after stop, so no new traffic
/// is routed here while the service cannot take it.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.shutdown.health_state() == HealthState::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use expgate_core::{DecisionEngine, EngineError, UserContext};

    use super::*;
    use crate::activation::ActivationHandler;
    use crate::network::shutdown::ShutdownController;

    struct NullEngine;

    #[async_trait]
    impl DecisionEngine for NullEngine {
        async fn activate(
            &self,
            _experiment_key: &str,
            _user: &UserContext,
        ) -> Result<String, EngineError> {
            Ok("control".to_string())
        }
    }

    fn test_state() -> AppState {
        AppState {
            handler: Arc::new(ActivationHandler::new(
                Arc::new(NullEngine),
                Duration::from_secs(1),
            )),
            shutdown: Arc::new(ShutdownController::new()),
            start_time: Instant::now(),
        }
    }

    #[tokio::test]
    async fn health_handler_reports_all_fields() {
        let state = test_state();
        state.shutdown.set_ready();

        let response = health_handler(State(state)).await;
        let json = response.0;

        assert_eq!(json["state"], "ready");
        assert_eq!(json["in_flight"], 0);
        assert!(json["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn health_handler_reports_draining_state() {
        let state = test_state();
        state.shutdown.set_ready();
        state.shutdown.begin_drain();

        let response = health_handler(State(state)).await;
        assert_eq!(response.0["state"], "draining");
    }

    #[tokio::test]
    async fn health_handler_reports_in_flight_count() {
        let state = test_state();
        let _guard = state.shutdown.in_flight_guard();

        let response = health_handler(State(state)).await;
        assert_eq!(response.0["in_flight"], 1);
    }

    #[tokio::test]
    async fn liveness_always_returns_200() {
        assert_eq!(liveness_handler().await, StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_returns_200_only_when_ready() {
        let state = test_state();
        assert_eq!(
            readiness_handler(State(state.clone())).await,
            StatusCode::SERVICE_UNAVAILABLE
        );

        state.shutdown.set_ready();
        assert_eq!(readiness_handler(State(state.clone())).await, StatusCode::OK);

        state.shutdown.begin_drain();
        assert_eq!(
            readiness_handler(State(state)).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
