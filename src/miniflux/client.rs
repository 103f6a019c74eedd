use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::error::MinifluxError;
use super::types::{EntriesPage, EntryStatus, Feed, UpdateEntriesRequest};

/// Header Miniflux reads the API token from.
const AUTH_HEADER: &str = "X-Auth-Token";

/// Path segment every v1 endpoint lives under.
const API_VERSION_SEGMENT: &str = "/v1";

/// Per-request deadline used unless overridden with [`Client::with_timeout`].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024; // 16MB

/// Normalize a server address to the v1 API base.
///
/// Trailing slashes are stripped before the version segment is appended, so
/// `https://host`, `https://host/` and `https://host/v1` all map to
/// `https://host/v1`. Applying it twice yields the same value.
pub fn normalize_base_url(server_url: &str) -> String {
    let trimmed = server_url.trim().trim_end_matches('/');
    if trimmed.ends_with(API_VERSION_SEGMENT) {
        trimmed.to_string()
    } else {
        format!("{}{}", trimmed, API_VERSION_SEGMENT)
    }
}

/// Build the HTTP client used for Miniflux requests.
pub fn build_http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(concat!("fluxsync/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(2)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
}

/// Stateless adapter over the Miniflux v1 REST API.
///
/// Holds only fixed configuration (base URL, token, deadline), so it is cheap
/// to clone and safe to share. Every operation attaches the `X-Auth-Token`
/// header, honours the per-request deadline and aborts as soon as `cancel`
/// fires. Nothing is retried here; see [`MinifluxError::is_retryable`].
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    timeout: Duration,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Client {
    pub fn new(http: reqwest::Client, server_url: &str, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: normalize_base_url(server_url),
            api_key: SecretString::from(api_key.into()),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Override the per-request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Effective API base, always ending in `/v1`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Check liveness and credentials against `GET /me`.
    ///
    /// Succeeds on any 2xx. A rejected token surfaces as
    /// `RequestFailed { status: 401 }`.
    pub async fn test_connection(&self, cancel: &CancellationToken) -> Result<(), MinifluxError> {
        self.execute(self.http.get(self.endpoint("/me")), cancel)
            .await?;
        tracing::debug!(base_url = %self.base_url, "Miniflux connection verified");
        Ok(())
    }

    /// List every feed on the account, in the order the server returns them.
    pub async fn get_feeds(&self, cancel: &CancellationToken) -> Result<Vec<Feed>, MinifluxError> {
        let body = self
            .execute(self.http.get(self.endpoint("/feeds")), cancel)
            .await?;
        let feeds: Vec<Feed> = serde_json::from_slice(&body)?;
        tracing::debug!(count = feeds.len(), "Fetched Miniflux feeds");
        Ok(feeds)
    }

    /// Fetch one bounded page of entries filtered by `status`.
    ///
    /// There is no implicit pagination: `limit` caps the page and
    /// `EntriesPage::total` reports how many matched on the server.
    pub async fn get_entries(
        &self,
        status: EntryStatus,
        limit: u32,
        cancel: &CancellationToken,
    ) -> Result<EntriesPage, MinifluxError> {
        let url = format!(
            "{}?status={}&limit={}",
            self.endpoint("/entries"),
            status.as_str(),
            limit
        );
        let body = self.execute(self.http.get(url), cancel).await?;
        let page: EntriesPage = serde_json::from_slice(&body)?;
        tracing::debug!(
            status = %status,
            limit = limit,
            total = page.total,
            received = page.entries.len(),
            "Fetched Miniflux entries"
        );
        Ok(page)
    }

    /// Set the status of every entry in `ids` with a single `PUT /entries`.
    ///
    /// An empty `ids` slice is a no-op and sends nothing.
    pub async fn update_entries(
        &self,
        ids: &[i64],
        status: EntryStatus,
        cancel: &CancellationToken,
    ) -> Result<(), MinifluxError> {
        if ids.is_empty() {
            return Ok(());
        }

        let body = serde_json::to_vec(&UpdateEntriesRequest {
            entry_ids: ids,
            status,
        })?;
        let request = self
            .http
            .put(self.endpoint("/entries"))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);

        self.execute(request, cancel).await?;
        tracing::debug!(count = ids.len(), status = %status, "Updated Miniflux entry status");
        Ok(())
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Send an authenticated request and return the body of a 2xx response.
    ///
    /// The deadline covers both the exchange and reading the body.
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, MinifluxError> {
        let request = request
            .header(AUTH_HEADER, self.api_key.expose_secret())
            .header(reqwest::header::ACCEPT, "application/json");

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                tracing::debug!(status = status.as_u16(), "Miniflux returned non-success status");
                return Err(MinifluxError::RequestFailed {
                    status: status.as_u16(),
                });
            }
            read_limited_bytes(response, MAX_RESPONSE_SIZE).await
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(MinifluxError::Cancelled),
            result = tokio::time::timeout(self.timeout, exchange) => match result {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!(timeout = ?self.timeout, "Miniflux request exceeded deadline");
                    Err(MinifluxError::Timeout(self.timeout))
                }
            },
        }
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, MinifluxError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(MinifluxError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(MinifluxError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
