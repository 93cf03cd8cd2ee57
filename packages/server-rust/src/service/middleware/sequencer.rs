//! Per-actor request sequencer.
//!
//! Serializes requests from the same actor while letting different actors
//! proceed concurrently. Each actor with in-flight or queued requests owns one
//! registry slot: a fair async mutex (the gate) plus a count of requests
//! interested in it. Waiters are admitted in the order they started waiting.
//!
//! Slots are created lazily on an actor's first request and removed as soon as
//! the last interested request leaves. The decrement and the removal happen in
//! one critical section, so an arriving request can never grab a gate that is
//! about to disappear.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use dashmap::DashMap;
use feeder_core::{ActorId, Reply};
use tokio::sync::Mutex;
use tower::{Layer, Service};

use crate::service::request::{DispatchError, Request, WaitStage};

// ---------------------------------------------------------------------------
// ActorRegistry
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ActorSlot {
    gate: Arc<Mutex<()>>,
    interested: usize,
}

#[derive(Debug, Default)]
struct ActorRegistry {
    slots: DashMap<ActorId, ActorSlot>,
}

impl ActorRegistry {
    /// Registers interest in `actor`'s gate, creating the slot if needed.
    fn enter(self: &Arc<Self>, actor: ActorId) -> (Interest, Arc<Mutex<()>>) {
        let mut slot = self.slots.entry(actor).or_insert_with(|| ActorSlot {
            gate: Arc::new(Mutex::new(())),
            interested: 0,
        });
        slot.interested += 1;
        let gate = Arc::clone(&slot.gate);
        drop(slot);

        let interest = Interest {
            registry: Arc::clone(self),
            actor,
        };
        (interest, gate)
    }

    fn leave(&self, actor: ActorId) {
        let removed = self.slots.remove_if_mut(&actor, |_, slot| {
            slot.interested -= 1;
            slot.interested == 0
        });
        if removed.is_some() {
            tracing::trace!(%actor, "retired actor slot");
        }
    }
}

/// Keeps an actor's slot alive. Dropping it (on completion, cancellation,
/// unwind, or when the request future is dropped) releases the interest.
struct Interest {
    registry: Arc<ActorRegistry>,
    actor: ActorId,
}

impl Drop for Interest {
    fn drop(&mut self) {
        self.registry.leave(self.actor);
    }
}

// ---------------------------------------------------------------------------
// SequencerLayer
// ---------------------------------------------------------------------------

/// Tower layer enforcing at most one in-flight request per actor.
///
/// Services produced by the same layer share one registry.
#[derive(Debug, Clone, Default)]
pub struct SequencerLayer {
    registry: Arc<ActorRegistry>,
}

impl SequencerLayer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of actors that currently have an in-flight or queued request.
    #[must_use]
    pub fn active_actors(&self) -> usize {
        self.registry.slots.len()
    }

    /// Requests in flight or queued for `actor`.
    #[must_use]
    pub fn pending_for(&self, actor: ActorId) -> usize {
        self.registry
            .slots
            .get(&actor)
            .map_or(0, |slot| slot.interested)
    }
}

impl<S> Layer<S> for SequencerLayer {
    type Service = SequencerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SequencerService {
            inner,
            registry: Arc::clone(&self.registry),
        }
    }
}

// ---------------------------------------------------------------------------
// SequencerService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SequencerService<S> {
    inner: S,
    registry: Arc<ActorRegistry>,
}

impl<S> Service<Request> for SequencerService<S>
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
        let actor = match req.actor() {
            Ok(actor) => actor,
            Err(err) => return Box::pin(async move { Err(err) }),
        };

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let registry = Arc::clone(&self.registry);

        Box::pin(async move {
            let (interest, gate) = registry.enter(actor);

            let turn = match req.ctx.run_until_done(gate.lock_owned()).await {
                Ok(turn) => turn,
                Err(cause) => {
                    tracing::debug!(%actor, %cause, "gave up waiting for actor's prior request");
                    drop(interest);
                    return Err(DispatchError::Cancelled {
                        stage: WaitStage::ActorQueue,
                        cause,
                    });
                }
            };

            let result = inner.call(req).await;
            // Hand the gate to the next waiter before giving up interest.
            drop(turn);
            drop(interest);
            result
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
