//! HTTP page fetcher backing the `/summary` command.

use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;

use crate::traits::PageFetcher;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Fetches pages with a plain GET and returns the body as text.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpPageFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

impl Default for HttpPageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(&self, url: &str) -> anyhow::Result<String> {
        let url = reqwest::Url::parse(url).with_context(|| format!("invalid url {url:?}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("unsupported url scheme {}", url.scheme());
        }

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .context("failed to perform request")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("page request failed with status code: {}", status.as_u16());
        }

        response.text().await.context("failed to read page body")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_malformed_url() {
        let err = HttpPageFetcher::new().fetch_page("not a url").await.unwrap_err();
        assert!(err.to_string().contains("invalid url"));
    }

    #[tokio::test]
    async fn rejects_non_http_scheme() {
        let err = HttpPageFetcher::new()
            .fetch_page("file:///etc/passwd")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unsupported url scheme file");
    }

    #[tokio::test]
    async fn connection_failure_is_an_error() {
        // Port 9 (discard) is closed on test machines; the request fails fast.
        let fetcher = HttpPageFetcher::with_timeout(Duration::from_secs(2));
        let err = fetcher.fetch_page("http://127.0.0.1:9/").await.unwrap_err();
        assert!(err.to_string().contains("failed to perform request"));
    }
}
