use async_trait::async_trait;
use feeder_core::{Reply, Update};

/// Source of inbound updates and sink for outbound replies.
/// Implementations: Telegram Bot API long polling, in-memory channels (tests).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Wait for the next update. `None` means the stream has ended.
    async fn receive(&self) -> Option<Update>;

    /// Deliver a reply to its chat.
    async fn send(&self, reply: &Reply) -> anyhow::Result<()>;

    /// Stop producing updates. Pending and future `receive` calls return
    /// `None`; `send` keeps working so in-flight replies can be delivered.
    fn stop_receiving(&self);
}

/// Fetches the body of a web page as text.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> anyhow::Result<String>;
}
