//! Inbound chat types.
//!
//! The shapes follow the Telegram Bot API JSON objects so transports can
//! decode updates straight into them. Only the fields the dispatcher and the
//! command handler read are modelled; unknown fields are ignored on decode.

use serde::{Deserialize, Serialize};

use crate::types::{ActorId, ChatId};

/// Entity type marking a `/command` span inside message text.
pub const BOT_COMMAND_ENTITY: &str = "bot_command";

/// One item from the transport's update stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    /// Absent for update kinds the dispatcher does not handle (edits, callbacks, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}

/// The sending identity of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
}

/// The conversation a message belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    /// `private`, `group`, `supergroup` or `channel`.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// A special span of message text. Offsets and lengths count UTF-16 code units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub message_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat: Option<Chat>,
    #[serde(default)]
    pub date: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<MessageEntity>,
}

impl Message {
    /// Builds a plain text message from `user` in that user's private chat.
    ///
    /// Entities for a leading `/command` are derived automatically, the way
    /// the platform would report them.
    #[must_use]
    pub fn private_text(message_id: i64, user_id: i64, text: impl Into<String>) -> Self {
        let text = text.into();
        let entities = leading_command_entity(&text).into_iter().collect();
        Self {
            message_id,
            from: Some(User {
                id: user_id,
                is_bot: false,
                first_name: String::new(),
                username: None,
                language_code: None,
            }),
            chat: Some(Chat {
                id: user_id,
                kind: "private".to_string(),
                title: None,
                username: None,
            }),
            date: 0,
            text: Some(text),
            entities,
        }
    }

    /// Identity the per-actor ordering guarantees are keyed on.
    #[must_use]
    pub fn actor(&self) -> Option<ActorId> {
        self.from.as_ref().map(|user| ActorId(user.id))
    }

    /// Where a reply to this message should go: the chat, or the sender's
    /// private chat when the chat is unknown.
    #[must_use]
    pub fn reply_address(&self) -> Option<ChatId> {
        self.chat
            .as_ref()
            .map(|chat| ChatId(chat.id))
            .or_else(|| self.actor().map(ChatId::from))
    }

    #[must_use]
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }

    /// Returns the raw `/command@bot` span if the message starts with one.
    fn command_span(&self) -> Option<&str> {
        let entity = self.entities.first()?;
        if entity.kind != BOT_COMMAND_ENTITY || entity.offset != 0 {
            return None;
        }
        let text = self.text();
        let end = utf16_to_byte_offset(text, entity.length)?;
        Some(&text[..end])
    }

    /// Name of the leading bot command without the `/` prefix and without an
    /// `@botname` suffix. `None` when the message is not a command.
    #[must_use]
    pub fn command(&self) -> Option<&str> {
        let span = self.command_span()?;
        let name = span.strip_prefix('/').unwrap_or(span);
        let name = name.split_once('@').map_or(name, |(name, _bot)| name);
        (!name.is_empty()).then_some(name)
    }

    /// Text following the leading command, trimmed. Empty when there is none.
    #[must_use]
    pub fn command_arguments(&self) -> &str {
        match self.command_span() {
            Some(span) => self.text()[span.len()..].trim(),
            None => "",
        }
    }
}

/// Converts a UTF-16 code unit offset into a byte offset within `text`.
/// Returns `None` if the offset lands past the end or inside a surrogate pair.
fn utf16_to_byte_offset(text: &str, utf16_offset: usize) -> Option<usize> {
    let mut units = 0;
    for (byte_index, ch) in text.char_indices() {
        if units == utf16_offset {
            return Some(byte_index);
        }
        if units > utf16_offset {
            return None;
        }
        units += ch.len_utf16();
    }
    (units == utf16_offset).then_some(text.len())
}

fn leading_command_entity(text: &str) -> Option<MessageEntity> {
    if !text.starts_with('/') {
        return None;
    }
    let span = text.split_whitespace().next()?;
    Some(MessageEntity {
        kind: BOT_COMMAND_ENTITY.to_string(),
        offset: 0,
        length: span.encode_utf16().count(),
    })
}
