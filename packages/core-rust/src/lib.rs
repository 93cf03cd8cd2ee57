//! `feeder` core: chat message model, reply payloads, and the per-request
//! execution context threaded through the dispatch pipeline.

pub mod context;
pub mod messages;
pub mod types;

pub use context::{CancelCause, RequestContext};
pub use messages::{Chat, Message, MessageEntity, Reply, ReplyMarkup, Update, User};
pub use types::{ActorId, ChatId};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
