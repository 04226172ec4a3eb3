//! REST activation endpoint handler.
//!
//! Accepts the JSON mirror of the gRPC request and dispatches through the
//! same [`crate::activation::ActivationHandler`], so both protocols stay
//! isomorphic. The
//! `project_id` path segment is recorded for log correlation but does not
//! affect dispatch.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use expgate_core::{normalize, ActivationError, ActivationRequest, NormalizeError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::AppState;

/// JSON request body for `POST /projects/{project_id}/experiment/activation`.
#[derive(Debug, Deserialize)]
pub struct ActivationBody {
    pub experiment_key: String,
    pub user_id: String,
    /// Attribute bag; omitted means no attributes.
    #[serde(default)]
    pub attributes: Value,
}

/// JSON response body on a successful activation.
#[derive(Debug, Serialize)]
pub struct ActivationResponse {
    pub variation: String,
}

/// Classified activation failure rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(ActivationError);

impl From<ActivationError> for ApiError {
    fn from(err: ActivationError) -> Self {
        Self(err)
    }
}

impl From<NormalizeError> for ApiError {
    fn from(err: NormalizeError) -> Self {
        Self(ActivationError::from(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ActivationError::Validation { .. } => StatusCode::BAD_REQUEST,
            ActivationError::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
            ActivationError::DecisionUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Resolves an activation for the experiment named in the body.
///
/// # Errors
///
/// `400` for malformed input, `504` when the decision deadline elapses,
/// `503` when the decision engine fails.
pub async fn activation_handler(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Json<ActivationBody>,
) -> Result<Json<ActivationResponse>, ApiError> {
    let _guard = state.shutdown.in_flight_guard();

    let user = normalize(&body.user_id, body.attributes)?;
    let request = ActivationRequest {
        experiment_key: body.experiment_key,
        user,
    };
    debug!(
        project_id = %project_id,
        experiment_key = %request.experiment_key,
        "activation requested"
    );

    let result = state.handler.activate(&request).await?;
    Ok(Json(ActivationResponse {
        variation: result.variation_key,
    }))
}
