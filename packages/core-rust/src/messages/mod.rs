//! Chat message model shared by transports, the dispatch pipeline and handlers.
//!
//! - [`update`]: inbound updates, messages, senders, chats and command parsing
//! - [`reply`]: outbound reply payloads

pub mod reply;
pub mod update;

pub use reply::{Reply, ReplyMarkup};
pub use update::{Chat, Message, MessageEntity, Update, User, BOT_COMMAND_ENTITY};
