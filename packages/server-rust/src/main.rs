//! `expgate-server` binary: load configuration, bring up telemetry, connect
//! the decision engine, and run the lifecycle until shutdown.
//!
//! Startup order matters: config first, then logging (so every later
//! failure is logged), then the trace exporter (non-fatal), then the
//! decision engine (fatal), then the listeners and servers. Teardown runs
//! in reverse.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;

use expgate_server::engine::RemoteDecisionEngine;
use expgate_server::{lifecycle, telemetry, Lifecycle, LifecycleError, ServiceConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let config = ServiceConfig::parse();

    let telemetry = match telemetry::init(&config) {
        Ok(telemetry) => telemetry,
        Err(err) => {
            eprintln!("failed to initialize telemetry: {err}");
            return ExitCode::FAILURE;
        }
    };

    let exit = run(config).await;
    telemetry.shutdown();
    exit
}

async fn run(config: ServiceConfig) -> ExitCode {
    let engine = match RemoteDecisionEngine::connect(&config).await {
        Ok(engine) => Arc::new(engine),
        Err(err) => {
            let err = LifecycleError::collaborator_init(err);
            error!(error = %err, "decision engine initialization failed");
            return ExitCode::FAILURE;
        }
    };

    let mut lifecycle = Lifecycle::new(config, engine);
    if let Err(err) = lifecycle.start().await {
        error!(error = %err, "startup failed");
        return ExitCode::FAILURE;
    }

    let signal = match lifecycle::termination_signal() {
        Ok(signal) => signal,
        Err(err) => {
            error!(error = %err, "failed to install signal handlers");
            return ExitCode::FAILURE;
        }
    };

    match lifecycle.serve(signal).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "service terminated abnormally");
            ExitCode::FAILURE
        }
    }
}
