//! HTTP middleware stack for the REST adapter.
//!
//! Transport-level middleware only; the per-route tracing middleware lives
//! in [`crate::trace`] and is attached at route registration. Ordering is
//! outer-to-inner: the first layer listed touches the request first.

use axum::http::header::HeaderName;
use tower::ServiceBuilder;
use tower_http::request_id::PropagateRequestIdLayer;
use tower_http::timeout::TimeoutLayer;

use crate::config::ServiceConfig;
use crate::trace::REQUEST_ID_HEADER;

/// The composed Tower layer type produced by [`build_http_layers`].
type HttpLayers = tower::layer::util::Stack<
    PropagateRequestIdLayer,
    tower::layer::util::Stack<TimeoutLayer, tower::layer::util::Identity>,
>;

/// Builds the HTTP-level Tower middleware stack.
///
/// **Ordering (outermost to innermost):**
/// 1. `Timeout` -- bounds total request processing time
/// 2. `PropagateRequestId` -- echoes a caller-supplied `x-request-id` back
///    on the response
///
/// Request ids are never generated here: the correlation id is caller
/// owned, and its absence must stay observable downstream (the tracing
/// middleware only records the attribute when the caller sent one).
#[must_use]
pub fn build_http_layers(config: &ServiceConfig) -> HttpLayers {
    let x_request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    ServiceBuilder::new()
        .layer(TimeoutLayer::new(config.http_request_timeout()))
        .layer(PropagateRequestIdLayer::new(x_request_id))
        .into_inner()
}
