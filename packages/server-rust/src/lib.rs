//! `expgate` Server — dual-protocol (gRPC + REST) activation front end.
//!
//! The server normalizes wire input into the canonical types from
//! `expgate-core`, dispatches through the injected decision engine under a
//! bounded deadline, and owns the process lifecycle: ordered startup,
//! readiness, and signal-driven graceful shutdown.

pub mod activation;
pub mod config;
pub mod engine;
pub mod grpc;
pub mod lifecycle;
pub mod network;
pub mod telemetry;
pub mod trace;

pub use activation::ActivationHandler;
pub use config::{Environment, ServiceConfig};
pub use lifecycle::{Lifecycle, LifecycleError};
