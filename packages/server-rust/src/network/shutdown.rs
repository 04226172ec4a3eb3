//! Graceful shutdown controller with in-flight request tracking.
//!
//! One controller is shared by the lifecycle manager, both protocol
//! servers, and the health handlers. `ArcSwap` keeps health-state reads
//! lock-free on the request path; an atomic counter with RAII guards
//! tracks in-flight activations so the drain phase knows when it is done.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::watch;

/// Readiness state of the serving path.
///
/// Transitions: Starting -> Ready -> Draining -> Stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// Dependencies are still being initialized; no requests accepted.
    Starting,
    /// Both servers are accepting requests.
    Ready,
    /// Drain in progress: new requests refused, in-flight ones finishing.
    Draining,
    /// All in-flight requests completed; listeners closed.
    Stopped,
}

impl HealthState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

/// Coordinates the drain sequence across both protocol servers.
///
/// 1. Readiness probes report `health_state()`.
/// 2. Request handlers hold an [`InFlightGuard`] for their lifetime.
/// 3. `begin_drain()` flips the state and signals both servers to stop
///    accepting.
/// 4. `wait_for_drain()` blocks until in-flight activations complete or the
///    shutdown bound expires.
#[derive(Debug)]
pub struct ShutdownController {
    drain_signal: watch::Sender<bool>,
    in_flight: Arc<AtomicU64>,
    health_state: Arc<ArcSwap<HealthState>>,
}

impl ShutdownController {
    /// Creates a controller in the `Starting` state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            drain_signal: tx,
            in_flight: Arc::new(AtomicU64::new(0)),
            health_state: Arc::new(ArcSwap::from_pointee(HealthState::Starting)),
        }
    }

    /// Marks the serving path ready; readiness probes start passing.
    pub fn set_ready(&self) {
        self.health_state.store(Arc::new(HealthState::Ready));
    }

    /// Returns a receiver that resolves when the drain begins.
    ///
    /// Each server selects on this alongside its accept loop to stop
    /// taking new connections.
    #[must_use]
    pub fn drain_receiver(&self) -> watch::Receiver<bool> {
        self.drain_signal.subscribe()
    }

    /// Starts the drain: state moves to `Draining` and every receiver is
    /// woken. Idempotent — the listeners only ever close once.
    pub fn begin_drain(&self) {
        self.health_state.store(Arc::new(HealthState::Draining));
        // Send errors just mean every receiver is already gone.
        let _ = self.drain_signal.send(true);
    }

    /// Current readiness state.
    #[must_use]
    pub fn health_state(&self) -> HealthState {
        **self.health_state.load()
    }

    /// RAII guard accounting one in-flight request.
    ///
    /// The counter is decremented on drop, so the accounting stays correct
    /// even when a handler panics and unwinds.
    #[must_use]
    pub fn in_flight_guard(&self) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Number of requests currently holding a guard.
    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Waits until every in-flight request finishes, up to `timeout`.
    ///
    /// Returns `true` on a clean drain (state becomes `Stopped`); `false`
    /// when the bound expired with requests still running (state stays
    /// `Draining` and the caller force-closes).
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if self.in_flight.load(Ordering::Relaxed) == 0 {
                self.health_state.store(Arc::new(HealthState::Stopped));
                return true;
            }

            if tokio::time::Instant::now() >= deadline {
                return false;
            }

            // Poll at 10ms intervals to avoid busy-waiting.
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight counter when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: Arc<AtomicU64>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_starting() {
        let controller = ShutdownController::new();
        assert_eq!(controller.health_state(), HealthState::Starting);
        assert_eq!(controller.in_flight_count(), 0);
    }

    #[test]
    fn state_machine_walks_starting_ready_draining() {
        let controller = ShutdownController::new();

        controller.set_ready();
        assert_eq!(controller.health_state(), HealthState::Ready);

        controller.begin_drain();
        assert_eq!(controller.health_state(), HealthState::Draining);
    }

    #[test]
    fn in_flight_guard_increments_and_decrements() {
        let controller = ShutdownController::new();

        let guard1 = controller.in_flight_guard();
        let guard2 = controller.in_flight_guard();
        assert_eq!(controller.in_flight_count(), 2);

        drop(guard1);
        assert_eq!(controller.in_flight_count(), 1);

        drop(guard2);
        assert_eq!(controller.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn drain_receiver_is_woken() {
        let controller = ShutdownController::new();
        let mut rx = controller.drain_receiver();
        assert!(!*rx.borrow());

        controller.begin_drain();

        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn wait_for_drain_without_requests_stops_immediately() {
        let controller = ShutdownController::new();
        controller.set_ready();
        controller.begin_drain();

        let drained = controller.wait_for_drain(Duration::from_secs(1)).await;
        assert!(drained);
        assert_eq!(controller.health_state(), HealthState::Stopped);
    }

    #[tokio::test]
    async fn wait_for_drain_follows_a_late_finishing_request() {
        let controller = ShutdownController::new();
        controller.set_ready();

        let guard = controller.in_flight_guard();
        controller.begin_drain();

        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(guard);
        });

        let drained = controller.wait_for_drain(Duration::from_secs(2)).await;
        assert!(drained);
        assert_eq!(controller.health_state(), HealthState::Stopped);

        release.await.unwrap();
    }

    #[tokio::test]
    async fn wait_for_drain_times_out_with_requests_still_running() {
        let controller = ShutdownController::new();
        controller.set_ready();

        let _guard = controller.in_flight_guard();
        controller.begin_drain();

        let drained = controller.wait_for_drain(Duration::from_millis(50)).await;
        assert!(!drained);
        assert_eq!(controller.health_state(), HealthState::Draining);
    }

    #[test]
    fn health_state_names_are_stable() {
        assert_eq!(HealthState::Starting.as_str(), "starting");
        assert_eq!(HealthState::Ready.as_str(), "ready");
        assert_eq!(HealthState::Draining.as_str(), "draining");
        assert_eq!(HealthState::Stopped.as_str(), "stopped");
    }
}
