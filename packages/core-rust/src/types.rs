use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity that owns per-actor ordering guarantees (the sending user).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub i64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Address a reply is delivered to.
///
/// For private chats the platform uses the user id as the chat id, so an
/// `ActorId` converts losslessly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<ActorId> for ChatId {
    fn from(actor: ActorId) -> Self {
        Self(actor.0)
    }
}
