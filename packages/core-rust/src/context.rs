use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Why a request context finished before its work did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    /// The context (or one of its parents) was cancelled explicitly.
    Cancelled,
    /// The context's deadline passed.
    DeadlineExceeded,
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("context cancelled"),
            Self::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

impl std::error::Error for CancelCause {}

/// Per-request execution context: request id for log correlation, an
/// optional deadline, and a cancellation token.
///
/// Cloning shares the same token, so cancelling any clone cancels all of them.
/// Use [`RequestContext::child`] for a context that can be cancelled on its own
/// while still following its parent.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlates every log line emitted while serving this request.
    pub request_id: Uuid,
    deadline: Option<Instant>,
    cancellation: CancellationToken,
}

impl RequestContext {
    /// A fresh context with a new request id, no deadline, never cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            deadline: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// A fresh context that expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().deadline_at(Instant::now() + timeout)
    }

    /// Sets the deadline. An earlier existing deadline is kept.
    #[must_use]
    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Ties this context to `parent`: cancelling `parent` cancels the context,
    /// but cancelling the context leaves `parent` alone.
    #[must_use]
    pub fn linked_to(mut self, parent: &CancellationToken) -> Self {
        self.cancellation = parent.child_token();
        self
    }

    /// Derives a context with the same id and deadline whose cancellation does
    /// not propagate upwards.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            request_id: self.request_id,
            deadline: self.deadline,
            cancellation: self.cancellation.child_token(),
        }
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Returns the cause if the context is already finished.
    #[must_use]
    pub fn cause(&self) -> Option<CancelCause> {
        if self.cancellation.is_cancelled() {
            return Some(CancelCause::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelCause::DeadlineExceeded),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.cause().is_some()
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> CancelCause {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                () = self.cancellation.cancelled() => CancelCause::Cancelled,
                () = tokio::time::sleep_until(deadline) => CancelCause::DeadlineExceeded,
            },
            None => {
                self.cancellation.cancelled().await;
                CancelCause::Cancelled
            }
        }
    }

    /// Drives `fut` until it completes or the context finishes, whichever is
    /// first. A context that is already finished wins over a ready future, so
    /// a cancelled request never acquires anything.
    ///
    /// # Errors
    ///
    /// Returns the [`CancelCause`] when the context finishes first; `fut` is
    /// dropped in that case.
    pub async fn run_until_done<F: Future>(&self, fut: F) -> Result<F::Output, CancelCause> {
        tokio::select! {
            biased;
            cause = self.done() => Err(cause),
            output = fut => Ok(output),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
