//! Outbound reply payloads produced by handlers.

use serde::{Deserialize, Serialize};

use crate::types::ChatId;

/// How the client's custom keyboard should look after the reply.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyMarkup {
    /// Hide any custom keyboard left by a previous reply.
    #[default]
    RemoveKeyboard,
    /// Offer the given answers as a one-time keyboard, one answer per row.
    Keyboard(Vec<String>),
}

/// A reply to send back through the transport.
///
/// An empty `text` means "send nothing"; the runtime skips such replies.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reply {
    pub chat_id: Option<ChatId>,
    pub text: String,
    #[serde(default)]
    pub markup: ReplyMarkup,
}

impl Reply {
    /// A reply that sends nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Plain text reply that also removes any custom keyboard.
    #[must_use]
    pub fn text(chat_id: Option<ChatId>, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            markup: ReplyMarkup::RemoveKeyboard,
        }
    }

    /// Text reply offering `answers` as keyboard buttons. With no answers the
    /// keyboard is removed instead.
    #[must_use]
    pub fn with_answers(
        chat_id: Option<ChatId>,
        text: impl Into<String>,
        answers: Vec<String>,
    ) -> Self {
        let markup = if answers.is_empty() {
            ReplyMarkup::RemoveKeyboard
        } else {
            ReplyMarkup::Keyboard(answers)
        };
        Self {
            chat_id,
            text: text.into(),
            markup,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_reply_sends_nothing() {
        let reply = Reply::empty();
        assert!(reply.is_empty());
        assert!(reply.chat_id.is_none());
    }

    #[test]
    fn text_reply_removes_keyboard() {
        let reply = Reply::text(Some(ChatId(5)), "hi");
        assert_eq!(reply.chat_id, Some(ChatId(5)));
        assert_eq!(reply.markup, ReplyMarkup::RemoveKeyboard);
        assert!(!reply.is_empty());
    }

    #[test]
    fn answers_become_keyboard() {
        let reply = Reply::with_answers(Some(ChatId(5)), "pick", vec!["a".into(), "b".into()]);
        assert_eq!(
            reply.markup,
            ReplyMarkup::Keyboard(vec!["a".to_string(), "b".to_string()])
        );

        let reply = Reply::with_answers(Some(ChatId(5)), "pick", Vec::new());
        assert_eq!(reply.markup, ReplyMarkup::RemoveKeyboard);
    }

    #[test]
    fn reply_without_address_is_allowed() {
        let reply = Reply::text(None, "orphan");
        assert!(reply.chat_id.is_none());
    }
}
