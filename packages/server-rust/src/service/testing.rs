//! Instrumented handlers shared by the pipeline unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use feeder_core::{Message, Reply, RequestContext};

use super::handler::{handler_fn, BoxHandler};
use super::request::{DispatchError, Request};

/// Records how many requests are inside the handler, overall and per actor.
#[derive(Debug, Default)]
pub(crate) struct Probe {
    current: AtomicUsize,
    max: AtomicUsize,
    entered: AtomicUsize,
    per_actor: Mutex<HashMap<i64, (usize, usize)>>,
    order: Mutex<Vec<i64>>,
}

impl Probe {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn max_concurrent(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }

    pub(crate) fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    pub(crate) fn max_for_actor(&self, actor: i64) -> usize {
        self.per_actor
            .lock()
            .unwrap()
            .get(&actor)
            .map_or(0, |&(_, max)| max)
    }

    /// Message ids in the order they entered the handler.
    pub(crate) fn entry_order(&self) -> Vec<i64> {
        self.order.lock().unwrap().clone()
    }

    fn enter(&self, msg: &Message) {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
        self.order.lock().unwrap().push(msg.message_id);
        if let Some(actor) = msg.actor() {
            let mut per_actor = self.per_actor.lock().unwrap();
            let entry = per_actor.entry(actor.0).or_default();
            entry.0 += 1;
            entry.1 = entry.1.max(entry.0);
        }
    }

    fn exit(&self, msg: &Message) {
        self.current.fetch_sub(1, Ordering::SeqCst);
        if let Some(actor) = msg.actor() {
            if let Some(entry) = self.per_actor.lock().unwrap().get_mut(&actor.0) {
                entry.0 -= 1;
            }
        }
    }

    /// Handler that stays busy for `delay`, then echoes the message text.
    pub(crate) fn handler(self: &Arc<Self>, delay: Duration) -> BoxHandler {
        let probe = Arc::clone(self);
        handler_fn(move |req: Request| {
            let probe = Arc::clone(&probe);
            async move {
                let msg = req.message()?.clone();
                probe.enter(&msg);
                tokio::time::sleep(delay).await;
                probe.exit(&msg);
                Ok::<_, DispatchError>(Reply::text(msg.reply_address(), msg.text()))
            }
        })
    }
}

/// Handler that always fails with `message`.
pub(crate) fn failing(message: &'static str) -> BoxHandler {
    handler_fn(move |_req: Request| async move {
        Err::<Reply, _>(DispatchError::Handler(anyhow::anyhow!(message)))
    })
}

pub(crate) fn request(message_id: i64, actor: i64, text: &str) -> Request {
    Request::new(
        RequestContext::new(),
        Message::private_text(message_id, actor, text),
    )
}

pub(crate) fn request_with(ctx: RequestContext, message_id: i64, actor: i64) -> Request {
    Request::new(ctx, Message::private_text(message_id, actor, "queued"))
}
