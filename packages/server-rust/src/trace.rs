//! Per-request tracing middleware.
//!
//! A Tower layer generic over `http::Request`, so the identical middleware
//! wraps both the axum routes and the tonic service stack (gRPC metadata
//! travels as HTTP/2 headers). Applied once per route or service at
//! registration time with a static span name.
//!
//! Each request gets one span, parented on the inbound W3C `traceparent`
//! context when present. A caller-supplied `x-request-id` is recorded as
//! the `request.id` span attribute; absence of the header leaves the
//! attribute unset. The span handle lives inside the instrumented response
//! future, so it closes exactly once on every exit path — success, error,
//! or panic unwind — and span export is batched by the exporter off the
//! request path.

use http::{HeaderMap, Request};
use opentelemetry::global;
use opentelemetry::propagation::Extractor;
use tower::{Layer, Service};
use tracing::instrument::Instrumented;
use tracing::{field, Instrument};
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Header carrying the caller's correlation identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// ---------------------------------------------------------------------------
// TracingLayer
// ---------------------------------------------------------------------------

/// Tower layer that wraps services with per-request span management.
///
/// The span name is fixed at registration time (`"POST /path"` for HTTP
/// routes, the full method path for gRPC), not derived per request.
#[derive(Debug, Clone, Copy)]
pub struct TracingLayer {
    span_name: &'static str,
}

impl TracingLayer {
    #[must_use]
    pub fn new(span_name: &'static str) -> Self {
        Self { span_name }
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService {
            inner,
            span_name: self.span_name,
        }
    }
}

// ---------------------------------------------------------------------------
// TracingService
// ---------------------------------------------------------------------------

/// Service wrapper that runs every call inside a request span.
#[derive(Debug, Clone)]
pub struct TracingService<S> {
    inner: S,
    span_name: &'static str,
}

impl<S, B> Service<Request<B>> for TracingService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Instrumented<S::Future>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let span = make_request_span(self.span_name, req.headers());
        self.inner.call(req).instrument(span)
    }
}

/// Builds the ingress span for one request.
///
/// The inbound trace context is extracted with the globally configured
/// propagator; an empty extraction makes this span a new root.
fn make_request_span(span_name: &'static str, headers: &HeaderMap) -> tracing::Span {
    let span = tracing::info_span!(
        "request",
        otel.name = span_name,
        otel.kind = "server",
        "request.id" = field::Empty,
    );

    let parent =
        global::get_text_map_propagator(|propagator| propagator.extract(&HeaderExtractor(headers)));
    span.set_parent(parent);

    if let Some(request_id) = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        span.record("request.id", request_id);
    }

    span
}

/// Adapter exposing `http::HeaderMap` to the OpenTelemetry propagator.
struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(http::HeaderName::as_str).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
