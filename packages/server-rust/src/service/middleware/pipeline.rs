//! Pipeline composition: wraps a business handler with the dispatch policies.

use feeder_core::Reply;
use tower::Service;

use super::error_handling::ErrorHandlingLayer;
use super::metrics::MetricsLayer;
use super::sequencer::SequencerLayer;
use super::throttle::ThrottleLayer;
use crate::service::config::DispatchConfig;
use crate::service::handler::{compose, middleware, BoxHandler, Middleware};
use crate::service::request::{DispatchError, Request};

/// The standard middleware list, first entry innermost:
///
/// 1. `ThrottleLayer` -- global concurrency cap directly around the handler
/// 2. `SequencerLayer` -- one request per actor, FIFO
/// 3. `MetricsLayer` -- latency and outcome of everything below, waits included
/// 4. `ErrorHandlingLayer` -- outermost; turns failures into the fallback reply
///
/// A request queued behind the same actor therefore never holds a throttle
/// permit while it waits.
#[must_use]
pub fn dispatch_middlewares(config: &DispatchConfig) -> Vec<Middleware> {
    vec![
        middleware(ThrottleLayer::new(config.max_concurrency)),
        middleware(SequencerLayer::new()),
        middleware(MetricsLayer::new()),
        middleware(ErrorHandlingLayer),
    ]
}

/// Builds the dispatch pipeline around `handler`.
#[must_use]
pub fn build_dispatch_pipeline<S>(handler: S, config: &DispatchConfig) -> BoxHandler
where
    S: Service<Request, Response = Reply, Error = DispatchError> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
{
    compose(handler, dispatch_middlewares(config))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
