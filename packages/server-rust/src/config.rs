//! Service configuration.
//!
//! The binary parses this once from the environment at startup; every other
//! component receives the already-validated value by reference. Nothing else
//! in the crate reads environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, ValueEnum};

/// Deployment environment, selecting the log output profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    /// Production: JSON logs at info level.
    Live,
    /// Staging: JSON logs at debug level.
    Staging,
    /// Test runs: logging disabled.
    Testing,
    /// Local development: human-readable logs.
    Development,
}

/// Top-level service configuration, sourced from the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "expgate-server", about = "Experiment activation gateway")]
pub struct ServiceConfig {
    /// Bind address for the gRPC server.
    #[arg(long, env = "GRPC_ADDR", default_value = "0.0.0.0:50051")]
    pub grpc_addr: SocketAddr,

    /// Bind address for the HTTP server.
    #[arg(long, env = "HTTP_ADDR", default_value = "0.0.0.0:8080")]
    pub http_addr: SocketAddr,

    /// Deployment environment.
    #[arg(long, env = "ENV", value_enum, default_value = "development")]
    pub env: Environment,

    /// Deployment name reported as the tracing service resource.
    #[arg(long, env = "DEPLOYMENT_NAME", default_value = "expgate")]
    pub deployment_name: String,

    /// Maximum time to wait for in-flight requests during shutdown, in
    /// seconds. Past this bound the servers are force-closed.
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,

    /// End-to-end deadline for a single decision-engine call, in
    /// milliseconds.
    #[arg(long, env = "ACTIVATION_DEADLINE_MS", default_value_t = 1000)]
    pub activation_deadline_ms: u64,

    /// Outer HTTP request timeout, in seconds.
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub http_request_timeout_secs: u64,

    /// OTLP trace exporter endpoint. Tracing is disabled when unset;
    /// exporter failure at startup is non-fatal.
    #[arg(long, env = "OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Fraction of traces to sample, in `[0.0, 1.0]`.
    #[arg(long, env = "TRACE_SAMPLE_RATIO", default_value_t = 1.0)]
    pub trace_sample_ratio: f64,

    /// Base URL of the decision-engine API.
    #[arg(long, env = "DECISION_API_URL", default_value = "http://localhost:9100")]
    pub decision_api_url: String,

    /// Access key presented to the decision-engine API.
    #[arg(long, env = "DECISION_SDK_KEY", default_value = "")]
    pub decision_sdk_key: String,
}

impl ServiceConfig {
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    #[must_use]
    pub fn activation_deadline(&self) -> Duration {
        Duration::from_millis(self.activation_deadline_ms)
    }

    #[must_use]
    pub fn http_request_timeout(&self) -> Duration {
        Duration::from_secs(self.http_request_timeout_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            grpc_addr: SocketAddr::from(([0, 0, 0, 0], 50051)),
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            env: Environment::Development,
            deployment_name: "expgate".to_string(),
            shutdown_timeout_secs: 5,
            activation_deadline_ms: 1000,
            http_request_timeout_secs: 30,
            otlp_endpoint: None,
            trace_sample_ratio: 1.0,
            decision_api_url: "http://localhost:9100".to_string(),
            decision_sdk_key: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_config_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.grpc_addr.port(), 50051);
        assert_eq!(config.http_addr.port(), 8080);
        assert_eq!(config.env, Environment::Development);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
        assert_eq!(config.activation_deadline(), Duration::from_millis(1000));
        assert!(config.otlp_endpoint.is_none());
    }

    #[test]
    fn parses_flag_overrides() {
        let config = ServiceConfig::parse_from([
            "expgate-server",
            "--grpc-addr",
            "127.0.0.1:0",
            "--env",
            "live",
            "--shutdown-timeout-secs",
            "2",
        ]);
        assert_eq!(config.grpc_addr.port(), 0);
        assert_eq!(config.env, Environment::Live);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(2));
    }
}
