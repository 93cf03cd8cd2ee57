//! Request and error types carried through the dispatch pipeline.

use std::fmt;

use feeder_core::{ActorId, CancelCause, Message, RequestContext};

/// One inbound unit of work: the message plus its execution context.
///
/// `message` is `None` when the transport produced nothing addressable; every
/// gating stage rejects such requests before touching shared resources.
#[derive(Debug, Clone)]
pub struct Request {
    pub ctx: RequestContext,
    pub message: Option<Message>,
}

impl Request {
    #[must_use]
    pub fn new(ctx: RequestContext, message: Message) -> Self {
        Self {
            ctx,
            message: Some(message),
        }
    }

    /// A request that carries no message.
    #[must_use]
    pub fn without_message(ctx: RequestContext) -> Self {
        Self { ctx, message: None }
    }

    /// # Errors
    ///
    /// Returns `DispatchError::InvalidRequest` if there is no message.
    pub fn message(&self) -> Result<&Message, DispatchError> {
        self.message.as_ref().ok_or(DispatchError::InvalidRequest {
            reason: "message is nil",
        })
    }

    /// # Errors
    ///
    /// Returns `DispatchError::InvalidRequest` if there is no message or the
    /// message has no sender.
    pub fn actor(&self) -> Result<ActorId, DispatchError> {
        self.message
            .as_ref()
            .and_then(Message::actor)
            .ok_or(DispatchError::InvalidRequest {
                reason: "message or user is nil",
            })
    }
}

/// Where a request was when its context finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStage {
    /// Waiting for a global concurrency permit.
    Throttle,
    /// Waiting for the same actor's earlier request to finish.
    ActorQueue,
    /// Inside the business handler.
    Execution,
}

impl fmt::Display for WaitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Throttle => f.write_str("context cancelled while waiting for throttler"),
            Self::ActorQueue => f.write_str(
                "context cancelled while waiting for actor's prior request to complete",
            ),
            Self::Execution => f.write_str("context cancelled while handling request"),
        }
    }
}

/// Coarse error category; the pipeline's propagation policy is keyed on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    Cancelled,
    HandlerFailure,
}

/// Errors produced by pipeline stages and business handlers.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: &'static str },
    #[error("{stage}: {cause}")]
    Cancelled { stage: WaitStage, cause: CancelCause },
    #[error(transparent)]
    Handler(#[from] anyhow::Error),
}

impl DispatchError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest { .. } => ErrorKind::InvalidInput,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Handler(_) => ErrorKind::HandlerFailure,
        }
    }

    /// A handler observed its context finishing mid-execution.
    #[must_use]
    pub fn cancelled_during_execution(cause: CancelCause) -> Self {
        Self::Cancelled {
            stage: WaitStage::Execution,
            cause,
        }
    }
}
