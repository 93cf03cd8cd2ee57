//! Error-normalizing middleware.
//!
//! Callers of the pipeline see either a usable reply or an invalid-request
//! error. Any other failure from inner stages is logged and replaced by a
//! fixed apology addressed to the requester; the internal error text never
//! reaches the user.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use feeder_core::Reply;
use tower::{Layer, Service};

use crate::service::request::{DispatchError, ErrorKind, Request};

/// Reply text sent in place of any internal failure.
pub const FALLBACK_TEXT: &str =
    "Sorry, I encountered an error while processing your request. Please try again later.";

// ---------------------------------------------------------------------------
// ErrorHandlingLayer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorHandlingLayer;

impl<S> Layer<S> for ErrorHandlingLayer {
    type Service = ErrorHandlingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ErrorHandlingService { inner }
    }
}

// ---------------------------------------------------------------------------
// ErrorHandlingService
// ---------------------------------------------------------------------------

/// Service wrapper that folds inner failures into the fallback reply.
#[derive(Debug, Clone)]
pub struct ErrorHandlingService<S> {
    inner: S,
}

impl<S> Service<Request> for ErrorHandlingService<S>
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
        // Without a message there is nobody to answer.
        let address = match req.message() {
            Ok(msg) => msg.reply_address(),
            Err(err) => return Box::pin(async move { Err(err) }),
        };

        let fut = self.inner.call(req);
        Box::pin(async move {
            match fut.await {
                Ok(reply) => Ok(reply),
                Err(err) => {
                    if err.kind() == ErrorKind::Cancelled {
                        tracing::warn!(error = %err, "request cancelled");
                    } else {
                        tracing::error!(error = %err, "failed to handle message");
                    }
                    Ok(Reply::text(address, FALLBACK_TEXT))
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
