//! The bot's business handler: answers chat commands.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use anyhow::Context as _;
use feeder_core::{Message, Reply};
use tower::Service;

use super::request::{DispatchError, Request};
use crate::traits::PageFetcher;

pub const WELCOME_TEXT: &str = "Welcome to Feeder!\n\n\
Send /summary followed by a link and I will show you how the page begins.\n\
Use /help to see everything I can do.";

pub const HELP_TEXT: &str = "Available Commands:

/start - Show welcome message
/help - Display this help message
/summary <url> - Show the beginning of a web page
";

pub const UNKNOWN_COMMAND_TEXT: &str =
    "❓ Unknown command.\n\nUse /help to see the list of available commands.";

pub const SUMMARY_USAGE_TEXT: &str = "Usage: /summary <url>";

/// Longest page excerpt returned by `/summary`, in characters.
pub const SUMMARY_MAX_CHARS: usize = 100;

/// Routes a message to the command it names.
#[derive(Clone)]
pub struct CommandHandler {
    fetcher: Arc<dyn PageFetcher>,
}

impl CommandHandler {
    #[must_use]
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }
}

impl std::fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler").finish_non_exhaustive()
    }
}

impl Service<Request> for CommandHandler {
    type Response = Reply;
    type Error = DispatchError;
    type Future = Pin<Box<dyn Future<Output = Result<Reply, DispatchError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let fetcher = Arc::clone(&self.fetcher);
        Box::pin(async move {
            let msg = req.message()?;
            tracing::debug!(message_id = msg.message_id, "handling message");

            match msg.command() {
                Some(command) => handle_command(&req, msg, command, fetcher.as_ref()).await,
                None => Err(anyhow::anyhow!("not implemented").into()),
            }
        })
    }
}

async fn handle_command(
    req: &Request,
    msg: &Message,
    command: &str,
    fetcher: &dyn PageFetcher,
) -> Result<Reply, DispatchError> {
    let chat = msg.reply_address();
    match command {
        "start" => Ok(Reply::text(chat, WELCOME_TEXT)),
        "help" => Ok(Reply::text(chat, HELP_TEXT)),
        "summary" => {
            let url = msg.command_arguments();
            if url.is_empty() {
                return Ok(Reply::text(chat, SUMMARY_USAGE_TEXT));
            }
            let page = req
                .ctx
                .run_until_done(fetcher.fetch_page(url))
                .await
                .map_err(DispatchError::cancelled_during_execution)?
                .with_context(|| format!("failed to fetch page {url}"))?;
            Ok(Reply::text(chat, excerpt(&page, SUMMARY_MAX_CHARS)))
        }
        _ => Ok(Reply::text(chat, UNKNOWN_COMMAND_TEXT)),
    }
}

/// First `max_chars` characters of `text`.
fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use feeder_core::{CancelCause, ChatId, ReplyMarkup, RequestContext};
    use tower::ServiceExt;

    use super::*;
    use crate::service::request::{ErrorKind, WaitStage};

    struct StaticPage(String);

    #[async_trait]
    impl PageFetcher for StaticPage {
        async fn fetch_page(&self, _url: &str) -> anyhow::Result<String> {
            Ok(self.0.clone())
        }
    }

    struct Unreachable;

    #[async_trait]
    impl PageFetcher for Unreachable {
        async fn fetch_page(&self, url: &str) -> anyhow::Result<String> {
            anyhow::bail!("connection refused: {url}")
        }
    }

    struct Hanging;

    #[async_trait]
    impl PageFetcher for Hanging {
        async fn fetch_page(&self, _url: &str) -> anyhow::Result<String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(String::new())
        }
    }

    fn handler(fetcher: impl PageFetcher + 'static) -> CommandHandler {
        CommandHandler::new(Arc::new(fetcher))
    }

    async fn send(handler: CommandHandler, text: &str) -> Result<Reply, DispatchError> {
        handler
            .oneshot(Request::new(
                RequestContext::new(),
                Message::private_text(1, 123, text),
            ))
            .await
    }

    #[tokio::test]
    async fn start_and_help() {
        let reply = send(handler(Unreachable), "/start").await.unwrap();
        assert_eq!(reply.text, WELCOME_TEXT);
        assert_eq!(reply.chat_id, Some(ChatId(123)));
        assert_eq!(reply.markup, ReplyMarkup::RemoveKeyboard);

        let reply = send(handler(Unreachable), "/help").await.unwrap();
        assert_eq!(reply.text, HELP_TEXT);
    }

    #[tokio::test]
    async fn command_addressed_to_bot_is_recognized() {
        let reply = send(handler(Unreachable), "/help@feeder_bot").await.unwrap();
        assert_eq!(reply.text, HELP_TEXT);
    }

    #[tokio::test]
    async fn unknown_command() {
        let reply = send(handler(Unreachable), "/frobnicate").await.unwrap();
        assert_eq!(
            reply.text,
            "❓ Unknown command.\n\nUse /help to see the list of available commands."
        );
    }

    #[tokio::test]
    async fn plain_text_is_not_implemented() {
        let err = send(handler(Unreachable), "hello there").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HandlerFailure);
        assert_eq!(err.to_string(), "not implemented");
    }

    #[tokio::test]
    async fn summary_returns_page_excerpt() {
        let page = "a".repeat(250);
        let reply = send(handler(StaticPage(page)), "/summary https://example.com")
            .await
            .unwrap();
        assert_eq!(reply.text.chars().count(), SUMMARY_MAX_CHARS);
    }

    #[tokio::test]
    async fn summary_keeps_short_pages_whole() {
        let reply = send(handler(StaticPage("<p>héllo</p>".into())), "/summary https://example.com")
            .await
            .unwrap();
        assert_eq!(reply.text, "<p>héllo</p>");
    }

    #[tokio::test]
    async fn summary_without_url_explains_usage() {
        let reply = send(handler(Unreachable), "/summary   ").await.unwrap();
        assert_eq!(reply.text, SUMMARY_USAGE_TEXT);
    }

    #[tokio::test]
    async fn summary_fetch_failure_is_handler_failure() {
        let err = send(handler(Unreachable), "/summary http://localhost:1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HandlerFailure);
        assert!(err.to_string().contains("failed to fetch page"));
    }

    #[tokio::test(start_paused = true)]
    async fn summary_honors_request_deadline() {
        let ctx = RequestContext::with_timeout(Duration::from_millis(100));
        let err = handler(Hanging)
            .oneshot(Request::new(
                ctx,
                Message::private_text(1, 5, "/summary https://slow.example"),
            ))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Cancelled {
                stage: WaitStage::Execution,
                cause: CancelCause::DeadlineExceeded,
            }
        ));
    }

    #[tokio::test]
    async fn missing_message_is_invalid() {
        let err = handler(Unreachable)
            .oneshot(Request::without_message(RequestContext::new()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn excerpt_counts_characters_not_bytes() {
        assert_eq!(excerpt("ééé", 2), "éé");
        assert_eq!(excerpt("ab", 5), "ab");
        assert_eq!(excerpt("", 3), "");
    }
}
