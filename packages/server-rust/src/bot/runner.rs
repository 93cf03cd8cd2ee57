//! The dispatch runtime: pulls updates from a transport, runs each message
//! through the pipeline in its own task, and sends the replies back.

use std::sync::Arc;

use feeder_core::{Message, Reply, RequestContext};
use tokio::sync::watch;
use tower::ServiceExt;
use tracing::{info_span, Instrument};

use super::shutdown::{HealthState, Lifecycle};
use crate::service::config::DispatchConfig;
use crate::service::handler::BoxHandler;
use crate::service::request::{ErrorKind, Request};
use crate::traits::Transport;

/// A running bot: one transport, one pipeline.
pub struct Bot {
    transport: Arc<dyn Transport>,
    /// Template cloned per request.
    pipeline: BoxHandler,
    config: DispatchConfig,
    lifecycle: Lifecycle,
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("config", &self.config)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}

impl Bot {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, pipeline: BoxHandler, config: DispatchConfig) -> Self {
        Self {
            transport,
            pipeline,
            config,
            lifecycle: Lifecycle::new(),
        }
    }

    #[must_use]
    pub fn health_state(&self) -> HealthState {
        self.lifecycle.health_state()
    }

    /// Requests currently being processed or delivered.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.lifecycle.in_flight_count()
    }

    /// Runs until `shutdown` turns `true` or the transport's stream ends,
    /// then drains in-flight requests.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        self.lifecycle.set_ready();
        tracing::info!("starting bot");

        loop {
            let update = tokio::select! {
                biased;
                () = shutdown_requested(&mut shutdown) => {
                    tracing::info!("starting graceful shutdown");
                    break;
                }
                update = self.transport.receive() => update,
            };
            let Some(update) = update else {
                tracing::info!("update stream ended");
                break;
            };
            let Some(message) = update.message else {
                tracing::trace!(update_id = update.update_id, "skipping update without message");
                continue;
            };
            self.spawn_request(message);
        }

        self.drain().await;
    }

    fn spawn_request(&self, message: Message) {
        let guard = self.lifecycle.in_flight_guard();
        let ctx = RequestContext::with_timeout(self.config.request_timeout)
            .linked_to(self.lifecycle.request_token());
        let span = info_span!(
            "request",
            req_id = %ctx.request_id,
            chat_id = message.reply_address().map(|chat| chat.0),
        );
        let pipeline = self.pipeline.clone();
        let transport = Arc::clone(&self.transport);

        tokio::spawn(
            async move {
                let _guard = guard;
                match pipeline.oneshot(Request::new(ctx, message)).await {
                    Ok(reply) => deliver(transport.as_ref(), &reply).await,
                    Err(err) if err.kind() == ErrorKind::Cancelled => {
                        tracing::info!(error = %err, "request cancelled");
                    }
                    Err(err) => tracing::error!(error = %err, "unexpected error"),
                }
            }
            .instrument(span),
        );
    }

    async fn drain(&self) {
        self.lifecycle.begin_draining();
        self.transport.stop_receiving();

        let timeout = self.config.drain_timeout;
        if self.lifecycle.wait_for_drain(timeout).await {
            tracing::info!("graceful shutdown completed");
        } else {
            tracing::warn!(
                in_flight = self.lifecycle.in_flight_count(),
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "graceful shutdown timed out, cancelling remaining requests"
            );
            self.lifecycle.cancel_requests();
        }
        self.lifecycle.mark_stopped();
    }
}

/// Sends `reply` unless there is nothing to send or nowhere to send it.
async fn deliver(transport: &dyn Transport, reply: &Reply) {
    if reply.is_empty() {
        return;
    }
    if reply.chat_id.is_none() {
        tracing::debug!("dropping reply without a chat");
        return;
    }
    if let Err(err) = transport.send(reply).await {
        tracing::error!(error = %err, "failed to send message");
    }
}

/// Resolves once the flag turns `true`. A dropped sender never resolves.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    let signalled = rx.wait_for(|stop| *stop).await.is_ok();
    if !signalled {
        std::future::pending::<()>().await;
    }
}
