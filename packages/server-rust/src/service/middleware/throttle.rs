//! Global concurrency throttle.
//!
//! Caps how many requests are inside the wrapped stage at once, across all
//! actors. Requests over the limit wait for a permit or for their context to
//! finish, whichever comes first.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use feeder_core::Reply;
use tokio::sync::Semaphore;
use tower::{Layer, Service};

use crate::service::request::{DispatchError, Request, WaitStage};

// ---------------------------------------------------------------------------
// ThrottleLayer
// ---------------------------------------------------------------------------

/// Tower layer that bounds concurrent executions via a shared semaphore.
///
/// Every service produced by the same layer (and every clone of those
/// services) draws from one permit pool. Waiters are not promised FIFO order.
#[derive(Debug, Clone)]
pub struct ThrottleLayer {
    semaphore: Arc<Semaphore>,
}

impl ThrottleLayer {
    /// Creates a throttle admitting `max_concurrent` requests at a time.
    /// A limit of zero is raised to one so the pipeline can make progress.
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Permits not currently held by any request.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl<S> Layer<S> for ThrottleLayer {
    type Service = ThrottleService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ThrottleService {
            inner,
            semaphore: Arc::clone(&self.semaphore),
        }
    }
}

// ---------------------------------------------------------------------------
// ThrottleService
// ---------------------------------------------------------------------------

/// Service wrapper that holds one permit for the whole inner call.
#[derive(Debug, Clone)]
pub struct ThrottleService<S> {
    inner: S,
    semaphore: Arc<Semaphore>,
}

impl<S> Service<Request> for ThrottleService<S>
where
    S: Service<Request, Response = Reply, Error = DispatchError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Reply;
    type Error = DispatchError;
    type Future = Pin<Box<dyn Future<Output = Result<Reply, DispatchError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        if let Err(err) = req.message() {
            return Box::pin(async move { Err(err) });
        }

        // The ready inner service goes into the future; a fresh clone stays behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let semaphore = Arc::clone(&self.semaphore);

        Box::pin(async move {
            let permit = match req.ctx.run_until_done(semaphore.acquire_owned()).await {
                Ok(acquired) => acquired
                    .map_err(|_closed| anyhow::anyhow!("throttle semaphore closed"))?,
                Err(cause) => {
                    tracing::debug!(%cause, "gave up waiting for throttle permit");
                    return Err(DispatchError::Cancelled {
                        stage: WaitStage::Throttle,
                        cause,
                    });
                }
            };

            // Held until the inner call finishes; dropped on unwind or when
            // this future is dropped as well.
            let result = inner.call(req).await;
            drop(permit);
            result
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
