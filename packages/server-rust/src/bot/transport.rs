//! In-memory transport backed by tokio channels.

use async_trait::async_trait;
use feeder_core::{Reply, Update};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::traits::Transport;

/// Transport fed from an `mpsc` channel; sent replies go to another channel.
///
/// Used by tests and local tooling to drive the bot without a network.
#[derive(Debug)]
pub struct ChannelTransport {
    updates: Mutex<mpsc::Receiver<Update>>,
    replies: mpsc::UnboundedSender<Reply>,
    stopped: CancellationToken,
}

/// The other ends of a [`ChannelTransport`].
#[derive(Debug)]
pub struct ChannelPeer {
    /// Injects updates. Dropping every sender ends the update stream.
    pub updates: mpsc::Sender<Update>,
    /// Receives every reply the bot sends.
    pub replies: mpsc::UnboundedReceiver<Reply>,
}

impl ChannelTransport {
    #[must_use]
    pub fn new(capacity: usize) -> (Self, ChannelPeer) {
        let (update_tx, update_rx) = mpsc::channel(capacity.max(1));
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let transport = Self {
            updates: Mutex::new(update_rx),
            replies: reply_tx,
            stopped: CancellationToken::new(),
        };
        let peer = ChannelPeer {
            updates: update_tx,
            replies: reply_rx,
        };
        (transport, peer)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn receive(&self) -> Option<Update> {
        if self.stopped.is_cancelled() {
            return None;
        }
        let mut updates = self.updates.lock().await;
        tokio::select! {
            biased;
            () = self.stopped.cancelled() => None,
            update = updates.recv() => update,
        }
    }

    async fn send(&self, reply: &Reply) -> anyhow::Result<()> {
        self.replies
            .send(reply.clone())
            .map_err(|_closed| anyhow::anyhow!("reply channel closed"))
    }

    fn stop_receiving(&self) {
        self.stopped.cancel();
    }
}
