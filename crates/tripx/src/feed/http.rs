//! 📡 The HTTP feed: one GET per cycle, no retries, no drama.
//!
//! 🎬 INT. TRANSIT API GATEWAY -- EVERY 120 SECONDS
//! A request walks in. It shows its API key. The gateway squints at it.
//! Sometimes the gateway hands over every trip in the region. Sometimes it says 503 and goes
//! back to its crossword. We take either answer with grace.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::{debug, trace, warn};

use super::{FeedEntity, FeedMessage, FeedSource};

/// 📡 FeedConfig -- lives here, next to the thing it configures. Socks near feet.
///
/// 🔒 Credentials come from one of two places: inline `url`/`api_key`, or a
/// `credentials_file` with the endpoint on line one and the key on line two.
/// Inline values win when both are present.
#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    /// 📡 Base endpoint, scheme and all. Optional only because the credentials file can supply it.
    #[serde(default)]
    pub url: Option<String>,
    /// 🛣️ Appended to the endpoint. The trip-updates route.
    #[serde(default = "default_feed_path")]
    pub path: String,
    /// 🔒 Sent as `x-api-key`. Please do not commit this. Please.
    #[serde(default)]
    pub api_key: Option<String>,
    /// 🔒 Two lines: endpoint, then key.
    #[serde(default)]
    pub credentials_file: Option<PathBuf>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_feed_path() -> String {
    "/gtfs-rt/tripupdates".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl FeedConfig {
    /// 🔑 Work out the endpoint and API key, reading the credentials file if we have to.
    pub async fn resolve_credentials(&self) -> Result<(String, Option<String>)> {
        let (file_url, file_key) = match &self.credentials_file {
            Some(path) => {
                let contents = tokio::fs::read_to_string(path).await.context(format!(
                    "💀 The credentials file '{}' would not open. The endpoint and key are in there \
                     somewhere, we just can't get at them.",
                    path.display()
                ))?;
                let mut lines = contents.lines().map(str::trim);
                let url = lines.next().filter(|l| !l.is_empty()).map(String::from);
                let key = lines.next().filter(|l| !l.is_empty()).map(String::from);
                (url, key)
            }
            None => (None, None),
        };

        let Some(url) = self.url.clone().or(file_url) else {
            bail!(
                "💀 No feed endpoint configured. Set feed.url, or point feed.credentials_file at a \
                 file whose first line is the endpoint."
            );
        };
        Ok((url, self.api_key.clone().or(file_key)))
    }
}

/// 🚌 HttpFeed -- a reqwest client, a URL, and maybe a key. Reused across every cycle
/// because a fresh client per request would redo the TLS handshake every two minutes for days.
pub struct HttpFeed {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

// 🎭 manual Debug so the API key never ends up in a log line
impl std::fmt::Debug for HttpFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFeed")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HttpFeed {
    /// 🚀 Resolve credentials and build the client. Does not touch the network.
    pub async fn new(config: FeedConfig) -> Result<Self> {
        let (endpoint, api_key) = config.resolve_credentials().await?;
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("💀 The HTTP client refused to be born. Probably TLS. It's always TLS.")?;
        let url = format!("{}{}", endpoint.trim_end_matches('/'), config.path);
        debug!("📡 feed will poll {url}");
        Ok(Self {
            client,
            url,
            api_key,
        })
    }
}

#[async_trait]
impl FeedSource for HttpFeed {
    async fn fetch_updates(&mut self) -> Result<Vec<FeedEntity>> {
        let mut request = self.client.get(&self.url).header(ACCEPT, "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!("⚠️ Requesting {} failed before we got a status: {err}", self.url);
                return Ok(Vec::new());
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!("⚠️ Requesting {} failed with code {}", self.url, status.as_u16());
            return Ok(Vec::new());
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                warn!("⚠️ The response body from {} got lost in transit: {err}", self.url);
                return Ok(Vec::new());
            }
        };
        trace!("📬 {} bytes of trip updates arrived", body.len());

        // 💀 a 200 with a body we can't read is not a bad day, it's a broken contract
        let message: FeedMessage = serde_json::from_str(&body).context(format!(
            "💀 The feed at {} answered 200 and then said something we could not parse as trip \
             updates. Either the schema changed or someone is serving us a login page.",
            self.url
        ))?;
        Ok(message.entity)
    }
}
