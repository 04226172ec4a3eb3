//! Logging and trace-export bootstrap.
//!
//! Initialized once by the binary, before anything else that logs. The log
//! output profile follows the deployment environment; the OTLP trace
//! exporter is optional and its failure is non-fatal: the service keeps
//! serving without tracing rather than refusing to start.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::global;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::{Environment, ServiceConfig};

/// Failures while wiring up the trace exporter.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("failed to build OTLP span exporter: {0}")]
    Exporter(String),
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Handle to the installed telemetry stack.
///
/// Owns the tracer provider so spans can be flushed on shutdown. Dropping
/// the guard without calling [`Telemetry::shutdown`] leaves buffered spans
/// to the exporter's own best effort.
pub struct Telemetry {
    tracer_provider: Option<SdkTracerProvider>,
}

impl Telemetry {
    /// True when span export is active.
    #[must_use]
    pub fn tracing_enabled(&self) -> bool {
        self.tracer_provider.is_some()
    }

    /// Flushes buffered spans and shuts the exporter down.
    pub fn shutdown(&self) {
        if let Some(provider) = &self.tracer_provider {
            if let Err(err) = provider.shutdown() {
                warn!(error = %err, "trace exporter shutdown failed");
            }
        }
    }
}

/// Installs the global tracing subscriber and, when configured, the OTLP
/// trace exporter.
///
/// Exporter construction failure is deliberately demoted: the subscriber is
/// still installed, a warning is emitted, and the returned handle reports
/// tracing as disabled.
///
/// # Errors
///
/// Returns [`TelemetryError::AlreadyInitialized`] when a global subscriber
/// is already set (a process can only do this once).
pub fn init(config: &ServiceConfig) -> Result<Telemetry, TelemetryError> {
    let (tracer_provider, exporter_err) = match build_tracer_provider(config) {
        Ok(provider) => (provider, None),
        Err(err) => (None, Some(err)),
    };

    let otel_layer = tracer_provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer("expgate-server"))
    });

    tracing_subscriber::registry()
        .with(otel_layer)
        .with(fmt_layer(config.env))
        .try_init()
        .map_err(|_| TelemetryError::AlreadyInitialized)?;

    if tracer_provider.is_some() {
        global::set_text_map_propagator(TraceContextPropagator::new());
    }
    if let Some(err) = exporter_err {
        warn!(error = %err, "failed to initialize trace exporter; continuing without tracing");
    }

    Ok(Telemetry { tracer_provider })
}

/// Builds the sampled, batching OTLP tracer provider.
///
/// Returns `Ok(None)` when no exporter endpoint is configured.
fn build_tracer_provider(
    config: &ServiceConfig,
) -> Result<Option<SdkTracerProvider>, TelemetryError> {
    let Some(endpoint) = &config.otlp_endpoint else {
        return Ok(None);
    };

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint.clone())
        .build()
        .map_err(|err| TelemetryError::Exporter(err.to_string()))?;

    let resource = Resource::builder()
        .with_service_name(config.deployment_name.clone())
        .build();

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(Sampler::TraceIdRatioBased(config.trace_sample_ratio))
        .with_resource(resource)
        .build();

    Ok(Some(provider))
}

/// Log output layer for the given environment, mirroring the deployment
/// profiles: structured JSON in live/staging, nothing in testing, pretty
/// output for local development.
fn fmt_layer<S>(env: Environment) -> Option<Box<dyn Layer<S> + Send + Sync>>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    match env {
        Environment::Live => Some(
            tracing_subscriber::fmt::layer()
                .json()
                .with_filter(env_filter("info"))
                .boxed(),
        ),
        Environment::Staging => Some(
            tracing_subscriber::fmt::layer()
                .json()
                .with_filter(env_filter("debug"))
                .boxed(),
        ),
        Environment::Testing => None,
        Environment::Development => Some(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_filter(env_filter("debug"))
                .boxed(),
        ),
    }
}

/// `RUST_LOG` wins over the environment profile's default directive.
fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}
