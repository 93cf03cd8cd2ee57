//! Metrics middleware for dispatched requests.
//!
//! Measures each request's latency and outcome and hands the observation to an
//! [`Observer`]. The default observer writes a `tracing` event and records to
//! the `metrics` facade. Replies and errors pass through untouched.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use feeder_core::Reply;
use tokio::time::Instant;
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::service::request::{DispatchError, Request};

/// Histogram of request latency in seconds, labelled by `outcome`.
pub const DURATION_METRIC: &str = "feeder_dispatch_duration_seconds";
/// Counter of finished requests, labelled by `outcome`.
pub const TOTAL_METRIC: &str = "feeder_dispatch_total";

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

/// One request's measured latency and whether it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub duration: Duration,
    pub error: bool,
}

impl Observation {
    #[must_use]
    pub fn outcome(&self) -> &'static str {
        if self.error {
            "error"
        } else {
            "ok"
        }
    }
}

/// Sink for request observations.
pub trait Observer: Send + Sync + 'static {
    fn observe(&self, observation: Observation);
}

/// Emits a `tracing` event and updates the `metrics` histogram and counter.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultObserver;

impl Observer for DefaultObserver {
    fn observe(&self, observation: Observation) {
        let outcome = observation.outcome();
        metrics::histogram!(DURATION_METRIC, "outcome" => outcome)
            .record(observation.duration.as_secs_f64());
        metrics::counter!(TOTAL_METRIC, "outcome" => outcome).increment(1);

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = observation.duration.as_millis() as u64;
        tracing::info!(
            duration_ms = duration_ms,
            error = observation.error,
            "message processing time"
        );
    }
}

/// Floor for recorded durations. The clock can report zero elapsed time for
/// a request that never yields, and every sample must be strictly positive.
const MIN_DURATION: Duration = Duration::from_nanos(1);

/// Reports exactly once: with the recorded outcome, or as an error if the
/// request future is dropped before it finishes.
struct Measurement {
    observer: Arc<dyn Observer>,
    start: Instant,
    error: Option<bool>,
}

impl Drop for Measurement {
    fn drop(&mut self) {
        self.observer.observe(Observation {
            duration: self.start.elapsed().max(MIN_DURATION),
            error: self.error.unwrap_or(true),
        });
    }
}

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

/// Tower layer that instruments requests with timing and outcome.
#[derive(Clone)]
pub struct MetricsLayer {
    observer: Arc<dyn Observer>,
}

impl MetricsLayer {
    /// Layer reporting through [`DefaultObserver`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_observer(Arc::new(DefaultObserver))
    }

    #[must_use]
    pub fn with_observer(observer: Arc<dyn Observer>) -> Self {
        Self { observer }
    }
}

impl Default for MetricsLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MetricsLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsLayer").finish_non_exhaustive()
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService {
            inner,
            observer: Arc::clone(&self.observer),
        }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

/// Service wrapper that records request duration and outcome.
#[derive(Clone)]
pub struct MetricsService<S> {
    inner: S,
    observer: Arc<dyn Observer>,
}

impl<S> Service<Request> for MetricsService<S>
where
    S: Service<Request, Response = Reply, Error = DispatchError> + Send,
    S::Future: Send + 'static,
{
    type Response = Reply;
    type Error = DispatchError;
    type Future = Pin<Box<dyn Future<Output = Result<Reply, DispatchError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let actor = req.message.as_ref().and_then(feeder_core::Message::actor);
        let span = info_span!(
            "dispatch",
            actor = actor.map(|a| a.0),
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let mut measurement = Measurement {
            observer: Arc::clone(&self.observer),
            start: Instant::now(),
            error: None,
        };
        let fut = self.inner.call(req);

        Box::pin(
            async move {
                let result = fut.await;
                measurement.error = Some(result.is_err());

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = measurement.start.elapsed().as_millis() as u64;
                let span = tracing::Span::current();
                span.record("duration_ms", duration_ms);
                span.record("outcome", if result.is_err() { "error" } else { "ok" });

                drop(measurement);
                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
