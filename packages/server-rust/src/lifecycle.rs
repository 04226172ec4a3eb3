//! Process lifecycle management with deferred startup.
//!
//! Follows the deferred startup pattern: `new()` allocates shared state,
//! `start()` binds both listeners, and `serve()` accepts connections until
//! either server fails or a termination signal arrives. The wait is an
//! explicit two-source select feeding a single state transition, so the
//! race between external fault and operator shutdown stays auditable and
//! tests can inject a synthetic signal instead of a real one.
//!
//! Shutdown is bounded: in-flight requests get the configured drain
//! timeout to finish (their own decision deadlines still apply), after
//! which the servers are force-closed and the process exits non-zero.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use expgate_core::DecisionEngine;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tracing::{error, info, warn};

use crate::activation::ActivationHandler;
use crate::config::ServiceConfig;
use crate::grpc::{ExperimentService, ACTIVATE_SPAN};
use crate::network::{build_router, AppState, ShutdownController};
use crate::trace::TracingLayer;

/// Lifecycle phases of the service process.
///
/// `Failed` is terminal and reachable from any non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Init,
    Starting,
    Serving,
    Draining,
    Stopped,
    Failed,
}

/// Process-fatal lifecycle failures.
///
/// Per-request errors never surface here; anything that does means the
/// service cannot (or can no longer) safely serve decisions.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("failed to initialize decision engine")]
    CollaboratorInit(#[source] anyhow::Error),
    #[error("failed to bind {listener} listener on {addr}")]
    Bind {
        listener: &'static str,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("{server} server failed")]
    Server {
        server: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("graceful shutdown exceeded {timeout_secs}s; servers were force-closed")]
    DrainTimeout { timeout_secs: u64 },
    #[error("forced close failed: {server} server did not terminate cleanly")]
    ForcedClose { server: &'static str },
}

impl LifecycleError {
    /// Classifies a decision-engine startup failure.
    pub fn collaborator_init(err: impl Into<anyhow::Error>) -> Self {
        Self::CollaboratorInit(err.into())
    }
}

/// Outcome of the two-source wait in [`Lifecycle::serve`].
enum WakeEvent {
    ServerError {
        server: &'static str,
        source: anyhow::Error,
    },
    Signal,
}

/// Owns startup sequencing and the shutdown race for both servers.
pub struct Lifecycle {
    config: ServiceConfig,
    handler: Arc<ActivationHandler>,
    shutdown: Arc<ShutdownController>,
    grpc_listener: Option<TcpListener>,
    http_listener: Option<TcpListener>,
    state: LifecycleState,
}

impl Lifecycle {
    /// Creates the lifecycle manager around an already-initialized engine.
    ///
    /// Engine initialization happens before this point (it is fatal on
    /// failure); injection through the capability trait keeps the manager
    /// testable with a fake.
    #[must_use]
    pub fn new(config: ServiceConfig, engine: Arc<dyn DecisionEngine>) -> Self {
        let handler = Arc::new(ActivationHandler::new(engine, config.activation_deadline()));
        Self {
            config,
            handler,
            shutdown: Arc::new(ShutdownController::new()),
            grpc_listener: None,
            http_listener: None,
            state: LifecycleState::Init,
        }
    }

    /// Shared handle to the drain coordinator.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Binds the gRPC and HTTP listeners.
    ///
    /// Returns the actual bound addresses, which differ from the
    /// configured ones when port 0 requested an OS-assigned port.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Bind`] when either address cannot be
    /// bound.
    pub async fn start(&mut self) -> Result<(SocketAddr, SocketAddr), LifecycleError> {
        self.state = LifecycleState::Starting;

        let grpc = bind("grpc", self.config.grpc_addr).await?;
        let http = bind("http", self.config.http_addr).await?;
        let grpc_addr = local_addr("grpc", self.config.grpc_addr, &grpc)?;
        let http_addr = local_addr("http", self.config.http_addr, &http)?;

        info!(%grpc_addr, %http_addr, "listeners bound");

        self.grpc_listener = Some(grpc);
        self.http_listener = Some(http);
        Ok((grpc_addr, http_addr))
    }

    /// Serves both protocols until a server fails or `signal` resolves.
    ///
    /// Whichever event fires first decides the transition: a server error
    /// moves to `Failed`, the signal starts the bounded drain. The
    /// listeners are owned by their server tasks and only ever closed
    /// once.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Server`] on a fatal server error,
    /// [`LifecycleError::DrainTimeout`] when the drain bound expired and
    /// the servers were force-closed, and [`LifecycleError::ForcedClose`]
    /// when even the forced close did not terminate a server.
    ///
    /// # Panics
    ///
    /// Panics if `start()` was not called before `serve()`.
    pub async fn serve(
        mut self,
        signal: impl Future<Output = ()> + Send,
    ) -> Result<(), LifecycleError> {
        let grpc_listener = self
            .grpc_listener
            .take()
            .expect("start() must be called before serve()");
        let http_listener = self
            .http_listener
            .take()
            .expect("start() must be called before serve()");

        let (error_tx, mut error_rx) = mpsc::channel::<(&'static str, anyhow::Error)>(2);

        let grpc_task = self.spawn_grpc_server(grpc_listener, error_tx.clone());
        let http_task = self.spawn_http_server(http_listener, error_tx);

        self.shutdown.set_ready();
        self.state = LifecycleState::Serving;
        info!("serving activation requests");

        // Two-source wait: external fault vs. operator-initiated shutdown.
        let event = tokio::select! {
            received = error_rx.recv() => match received {
                Some((server, source)) => WakeEvent::ServerError { server, source },
                None => WakeEvent::ServerError {
                    server: "all",
                    source: anyhow::anyhow!("server tasks exited unexpectedly"),
                },
            },
            _ = signal => WakeEvent::Signal,
        };

        match event {
            WakeEvent::ServerError { server, source } => {
                error!(server, error = %source, "server failed; terminating");
                self.state = LifecycleState::Failed;
                grpc_task.abort();
                http_task.abort();
                let _ = grpc_task.await;
                let _ = http_task.await;
                Err(LifecycleError::Server { server, source })
            }
            WakeEvent::Signal => self.drain(grpc_task, http_task).await,
        }
    }

    fn spawn_grpc_server(
        &self,
        listener: TcpListener,
        error_tx: mpsc::Sender<(&'static str, anyhow::Error)>,
    ) -> JoinHandle<()> {
        let service = ExperimentService::new(Arc::clone(&self.handler), Arc::clone(&self.shutdown));
        let mut drain_rx = self.shutdown.drain_receiver();

        tokio::spawn(async move {
            let drain = async move {
                let _ = drain_rx.changed().await;
            };
            let result = tonic::transport::Server::builder()
                .layer(TracingLayer::new(ACTIVATE_SPAN))
                .add_service(service.into_server())
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), drain)
                .await;
            if let Err(err) = result {
                let _ = error_tx.send(("grpc", anyhow::Error::new(err))).await;
            }
        })
    }

    fn spawn_http_server(
        &self,
        listener: TcpListener,
        error_tx: mpsc::Sender<(&'static str, anyhow::Error)>,
    ) -> JoinHandle<()> {
        let state = AppState {
            handler: Arc::clone(&self.handler),
            shutdown: Arc::clone(&self.shutdown),
            start_time: Instant::now(),
        };
        let router = build_router(state, &self.config);
        let mut drain_rx = self.shutdown.drain_receiver();

        tokio::spawn(async move {
            let drain = async move {
                let _ = drain_rx.changed().await;
            };
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(drain)
                .await;
            if let Err(err) = result {
                let _ = error_tx.send(("http", anyhow::Error::new(err))).await;
            }
        })
    }

    /// Runs the bounded drain; force-closes the servers past the bound.
    async fn drain(
        mut self,
        grpc_task: JoinHandle<()>,
        http_task: JoinHandle<()>,
    ) -> Result<(), LifecycleError> {
        info!("termination signal received; draining");
        self.state = LifecycleState::Draining;
        self.shutdown.begin_drain();

        let timeout = self.config.shutdown_timeout();
        let deadline = tokio::time::Instant::now() + timeout;

        let grpc_abort = grpc_task.abort_handle();
        let http_abort = http_task.abort_handle();
        let mut servers = futures_util::future::join(grpc_task, http_task);

        // In-flight requests first, then whatever is left of the bound for
        // the listeners to finish closing.
        if self.shutdown.wait_for_drain(timeout).await {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if tokio::time::timeout(remaining, &mut servers).await.is_ok() {
                self.state = LifecycleState::Stopped;
                info!("graceful shutdown complete");
                return Ok(());
            }
        }

        warn!(
            timeout_secs = self.config.shutdown_timeout_secs,
            "graceful shutdown timed out; force-closing servers"
        );
        grpc_abort.abort();
        http_abort.abort();
        let (grpc_result, http_result) = servers.await;
        for (server, result) in [("grpc", grpc_result), ("http", http_result)] {
            if let Err(err) = result {
                if err.is_panic() {
                    error!(server, "server task panicked during forced close");
                    self.state = LifecycleState::Failed;
                    return Err(LifecycleError::ForcedClose { server });
                }
            }
        }

        self.state = LifecycleState::Stopped;
        Err(LifecycleError::DrainTimeout {
            timeout_secs: self.config.shutdown_timeout_secs,
        })
    }
}

async fn bind(listener: &'static str, addr: SocketAddr) -> Result<TcpListener, LifecycleError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| LifecycleError::Bind {
            listener,
            addr,
            source,
        })
}

fn local_addr(
    listener: &'static str,
    configured: SocketAddr,
    bound: &TcpListener,
) -> Result<SocketAddr, LifecycleError> {
    bound
        .local_addr()
        .map_err(|source| LifecycleError::Bind {
            listener,
            addr: configured,
            source,
        })
}

/// Resolves on the first SIGINT or SIGTERM.
///
/// Installed eagerly so a registration failure surfaces at startup, not at
/// shutdown time.
///
/// # Errors
///
/// Returns the OS error when a signal handler cannot be registered.
#[cfg(unix)]
pub fn termination_signal() -> std::io::Result<impl Future<Output = ()> + Send> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => {},
            _ = terminate.recv() => {},
        }
    })
}

/// Resolves on ctrl-c; non-unix platforms have no SIGTERM.
#[cfg(not(unix))]
pub fn termination_signal() -> std::io::Result<impl Future<Output = ()> + Send> {
    Ok(async {
        let _ = tokio::signal::ctrl_c().await;
    })
}
