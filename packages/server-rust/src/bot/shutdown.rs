//! Bot lifecycle: health state, in-flight request tracking, and the root
//! cancellation token shared by every request context.
//!
//! Uses `ArcSwap` for lock-free health state transitions and an atomic
//! counter with RAII guards for accurate in-flight tracking.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio_util::sync::CancellationToken;

/// Bot health state.
///
/// State machine: Starting -> Ready -> Draining -> Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// Constructed, not yet receiving updates.
    Starting,
    /// Receiving and dispatching updates.
    Ready,
    /// No longer receiving; waiting for in-flight requests.
    Draining,
    /// Run loop has returned.
    Stopped,
}

/// Tracks health and in-flight requests for one bot run.
#[derive(Debug)]
pub struct Lifecycle {
    health_state: ArcSwap<HealthState>,
    in_flight: Arc<AtomicUsize>,
    requests: CancellationToken,
}

impl Lifecycle {
    #[must_use]
    pub fn new() -> Self {
        Self {
            health_state: ArcSwap::from_pointee(HealthState::Starting),
            in_flight: Arc::new(AtomicUsize::new(0)),
            requests: CancellationToken::new(),
        }
    }

    pub fn set_ready(&self) {
        self.health_state.store(Arc::new(HealthState::Ready));
    }

    pub fn begin_draining(&self) {
        self.health_state.store(Arc::new(HealthState::Draining));
    }

    pub fn mark_stopped(&self) {
        self.health_state.store(Arc::new(HealthState::Stopped));
    }

    #[must_use]
    pub fn health_state(&self) -> HealthState {
        **self.health_state.load()
    }

    /// Parent token for request contexts; cancelled by [`cancel_requests`].
    ///
    /// [`cancel_requests`]: Self::cancel_requests
    #[must_use]
    pub fn request_token(&self) -> &CancellationToken {
        &self.requests
    }

    /// Cancels every request context linked to [`request_token`].
    ///
    /// [`request_token`]: Self::request_token
    pub fn cancel_requests(&self) {
        self.requests.cancel();
    }

    /// Creates an RAII guard that tracks an in-flight request.
    ///
    /// The counter is decremented when the guard drops, including on unwind.
    #[must_use]
    pub fn in_flight_guard(&self) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Waits for in-flight requests to finish, up to `timeout`.
    ///
    /// Returns `true` if the count reached zero in time.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if self.in_flight.load(Ordering::Relaxed) == 0 {
                return true;
            }

            if tokio::time::Instant::now() >= deadline {
                return false;
            }

            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard that decrements the in-flight counter when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}
