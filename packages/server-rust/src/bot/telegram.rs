//! Telegram Bot API transport: `getUpdates` long polling and `sendMessage`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use feeder_core::{Reply, ReplyMarkup, Update};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::service::config::ConfigError;
use crate::traits::Transport;

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Seconds the server holds a `getUpdates` call open when nothing arrives.
pub const POLL_TIMEOUT_SECS: u64 = 30;

/// Pause after a failed poll before trying again.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Extra client-side slack on top of the long-poll timeout.
const POLL_SLACK: Duration = Duration::from_secs(10);

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors talking to the Bot API.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{method} request failed: {source}")]
    Http {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} rejected by telegram: {description}")]
    Api {
        method: &'static str,
        description: String,
    },
    #[error("failed to decode {method} response: {source}")]
    Decode {
        method: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("reply has no chat to send to")]
    NoChat,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct GetUpdatesParams {
    offset: i64,
    timeout: u64,
    allowed_updates: &'static [&'static str],
}

#[derive(Debug, Serialize)]
struct SendMessageParams<'a> {
    chat_id: i64,
    text: &'a str,
    reply_markup: WireMarkup<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireMarkup<'a> {
    Keyboard(ReplyKeyboardMarkup<'a>),
    Remove(ReplyKeyboardRemove),
}

#[derive(Debug, Serialize)]
struct ReplyKeyboardMarkup<'a> {
    keyboard: Vec<[KeyboardButton<'a>; 1]>,
    one_time_keyboard: bool,
    resize_keyboard: bool,
}

#[derive(Debug, Serialize)]
struct KeyboardButton<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct ReplyKeyboardRemove {
    remove_keyboard: bool,
    selective: bool,
}

impl<'a> WireMarkup<'a> {
    fn from_markup(markup: &'a ReplyMarkup) -> Self {
        match markup {
            ReplyMarkup::Keyboard(answers) if !answers.is_empty() => {
                Self::Keyboard(ReplyKeyboardMarkup {
                    keyboard: answers
                        .iter()
                        .map(|answer| [KeyboardButton { text: answer }])
                        .collect(),
                    one_time_keyboard: true,
                    resize_keyboard: true,
                })
            }
            _ => Self::Remove(ReplyKeyboardRemove {
                remove_keyboard: true,
                selective: false,
            }),
        }
    }
}

fn send_params(reply: &Reply) -> Result<SendMessageParams<'_>, TransportError> {
    let chat = reply.chat_id.ok_or(TransportError::NoChat)?;
    Ok(SendMessageParams {
        chat_id: chat.0,
        text: &reply.text,
        reply_markup: WireMarkup::from_markup(&reply.markup),
    })
}

fn decode<T: DeserializeOwned>(method: &'static str, body: &str) -> Result<T, TransportError> {
    let response: ApiResponse<T> =
        serde_json::from_str(body).map_err(|source| TransportError::Decode { method, source })?;
    match (response.ok, response.result) {
        (true, Some(result)) => Ok(result),
        (ok, _) => Err(TransportError::Api {
            method,
            description: response.description.unwrap_or_else(|| {
                if ok {
                    "missing result".to_string()
                } else {
                    "unknown error".to_string()
                }
            }),
        }),
    }
}

// ---------------------------------------------------------------------------
// TelegramTransport
// ---------------------------------------------------------------------------

/// Bot API client speaking the long-polling protocol.
pub struct TelegramTransport {
    client: reqwest::Client,
    /// `{api_url}/bot{token}`; never logged.
    endpoint: String,
    offset: AtomicI64,
    buffered: Mutex<VecDeque<Update>>,
    stopped: CancellationToken,
}

impl std::fmt::Debug for TelegramTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramTransport")
            .field("offset", &self.offset.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl TelegramTransport {
    /// # Errors
    ///
    /// Returns `ConfigError` if the token is empty or `api_url` is not an
    /// absolute http(s) URL.
    pub fn new(api_url: &str, token: &str) -> Result<Self, ConfigError> {
        if token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        let url = reqwest::Url::parse(api_url).map_err(|e| ConfigError::InvalidApiUrl {
            url: api_url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidApiUrl {
                url: api_url.to_string(),
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/bot{}", api_url.trim_end_matches('/'), token.trim()),
            offset: AtomicI64::new(0),
            buffered: Mutex::new(VecDeque::new()),
            stopped: CancellationToken::new(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.endpoint)
    }

    async fn call<P, T>(
        &self,
        method: &'static str,
        params: &P,
        timeout: Duration,
    ) -> Result<T, TransportError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        // The request URL embeds the token.
        let http = |source: reqwest::Error| TransportError::Http {
            method,
            source: source.without_url(),
        };
        let body = self
            .client
            .post(self.method_url(method))
            .json(params)
            .timeout(timeout)
            .send()
            .await
            .map_err(http)?
            .text()
            .await
            .map_err(http)?;
        decode(method, &body)
    }

    /// One long poll. Advances the offset past every returned update.
    async fn poll(&self) -> Result<Vec<Update>, TransportError> {
        let params = GetUpdatesParams {
            offset: self.offset.load(Ordering::Relaxed),
            timeout: POLL_TIMEOUT_SECS,
            allowed_updates: &["message"],
        };
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                &params,
                Duration::from_secs(POLL_TIMEOUT_SECS) + POLL_SLACK,
            )
            .await?;
        if let Some(last) = updates.iter().map(|u| u.update_id).max() {
            self.offset.fetch_max(last + 1, Ordering::Relaxed);
        }
        Ok(updates)
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn receive(&self) -> Option<Update> {
        let mut buffered = self.buffered.lock().await;
        loop {
            if self.stopped.is_cancelled() {
                return None;
            }
            if let Some(update) = buffered.pop_front() {
                return Some(update);
            }

            let polled = tokio::select! {
                biased;
                () = self.stopped.cancelled() => return None,
                polled = self.poll() => polled,
            };
            match polled {
                Ok(updates) => buffered.extend(updates),
                Err(err) => {
                    tracing::warn!(error = %err, "failed to poll updates, retrying");
                    tokio::select! {
                        biased;
                        () = self.stopped.cancelled() => return None,
                        () = tokio::time::sleep(RETRY_DELAY) => {}
                    }
                }
            }
        }
    }

    async fn send(&self, reply: &Reply) -> anyhow::Result<()> {
        let params = send_params(reply)?;
        let _sent: serde_json::Value = self.call("sendMessage", &params, SEND_TIMEOUT).await?;
        Ok(())
    }

    fn stop_receiving(&self) {
        self.stopped.cancel();
    }
}
