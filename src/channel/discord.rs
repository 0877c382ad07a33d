//! Discord publish channel
//!
//! Reports are published as bot messages carrying one embed, with the map
//! image uploaded alongside and referenced as `attachment://<file>`.
//!
//! # Payload Format
//!
//! Create and update send `multipart/form-data` with a `payload_json` part and
//! a `files[0]` part:
//!
//! ```json
//! {
//!   "embeds": [{
//!     "title": "Alpha",
//!     "description": "**Status**: Online :green_circle:\n ...",
//!     "color": 3066993,
//!     "fields": [{ "name": "Players:", "value": "Bob\nAna", "inline": false }],
//!     "image": { "url": "attachment://de_dust2.png" },
//!     "timestamp": "2024-01-01T12:00:00Z"
//!   }],
//!   "attachments": [{ "id": 0, "filename": "de_dust2.png" }]
//! }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use serverwatch::channel::{DiscordChannel, DiscordConfig, PublishChannel};
//!
//! let channel = DiscordChannel::new(DiscordConfig::new("bot-token", 123456789))?;
//! let id = channel.create(&report).await?;
//! ```

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;

use super::{ChannelError, ChannelResult, PublishChannel, ReportHandle};
use crate::models::ReportId;
use crate::report::Report;

/// Discord REST API root
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Discord channel configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token, sent as `Authorization: Bot <token>`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
    /// Channel the reports are posted to
    pub channel_id: u64,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Client-side request budget
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_requests_per_second() -> u32 {
    5
}

impl fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &"<redacted>")
            .field("channel_id", &self.channel_id)
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .field("requests_per_second", &self.requests_per_second)
            .finish()
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self::new("", 0)
    }
}

impl DiscordConfig {
    pub fn new(token: impl Into<String>, channel_id: u64) -> Self {
        Self {
            token: token.into(),
            channel_id,
            api_base: default_api_base(),
            timeout_secs: default_timeout(),
            requests_per_second: default_requests_per_second(),
        }
    }

    /// Point the channel at another API root (mock servers in tests)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_requests_per_second(mut self, requests_per_second: u32) -> Self {
        self.requests_per_second = requests_per_second;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.token.trim().is_empty() {
            return Err("Discord token cannot be empty".to_string());
        }

        if self.channel_id == 0 {
            return Err("Discord channel_id must be set".to_string());
        }

        let url = url::Url::parse(&self.api_base)
            .map_err(|e| format!("Invalid Discord api_base '{}': {e}", self.api_base))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err("Discord api_base must use http or https".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        if self.requests_per_second == 0 {
            return Err("requests_per_second must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct MessageReply {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RateLimitReply {
    retry_after: Option<f64>,
}

/// Publishes reports as Discord bot messages
pub struct DiscordChannel {
    config: DiscordConfig,
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl DiscordChannel {
    /// Create a new Discord channel
    pub fn new(config: DiscordConfig) -> ChannelResult<Self> {
        config.validate().map_err(ChannelError::InvalidConfig)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .build()
            .map_err(|e| ChannelError::Other(format!("Failed to create HTTP client: {e}")))?;

        let rate = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            config,
            client,
            rate_limiter,
        })
    }

    pub fn channel_id(&self) -> u64 {
        self.config.channel_id
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/channels/{}/messages",
            self.config.api_base.trim_end_matches('/'),
            self.config.channel_id
        )
    }

    fn message_url(&self, id: ReportId) -> String {
        format!("{}/{}", self.messages_url(), id)
    }

    /// Build the `payload_json` body for a report
    ///
    /// `attachment` is the uploaded file name the embed image points at.
    pub fn build_payload(report: &Report, attachment: Option<&str>) -> serde_json::Value {
        let mut embed = serde_json::json!({
            "title": report.title,
            "description": report.description,
            "color": report.color,
            "fields": report.fields,
            "timestamp": report.timestamp.to_rfc3339(),
        });

        if let Some(name) = attachment {
            embed["image"] = serde_json::json!({ "url": format!("attachment://{name}") });
        }

        let attachments: Vec<serde_json::Value> = attachment
            .iter()
            .map(|name| serde_json::json!({ "id": 0, "filename": name }))
            .collect();

        serde_json::json!({
            "embeds": [embed],
            "attachments": attachments,
        })
    }

    /// Multipart body with the embed and, when readable, the asset file
    async fn build_form(&self, report: &Report) -> ChannelResult<Form> {
        let file = match report.attachment_name() {
            Some(name) => match tokio::fs::read(&report.asset).await {
                Ok(data) => Some((name, data)),
                Err(e) => {
                    tracing::warn!(
                        asset = %report.asset.display(),
                        error = %e,
                        "Asset unreadable, publishing without image"
                    );
                    None
                }
            },
            None => None,
        };

        let payload = Self::build_payload(report, file.as_ref().map(|(name, _)| name.as_str()));
        let mut form = Form::new().part(
            "payload_json",
            Part::text(serde_json::to_string(&payload)?).mime_str("application/json")?,
        );

        if let Some((name, data)) = file {
            form = form.part(
                "files[0]",
                Part::bytes(data).file_name(name).mime_str("image/png")?,
            );
        }

        Ok(form)
    }

    /// Send an authorized request once the local rate budget allows it
    async fn send(&self, request: RequestBuilder) -> ChannelResult<Response> {
        self.rate_limiter.until_ready().await;

        let response = request
            .header("Authorization", format!("Bot {}", self.config.token))
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Map Discord error statuses onto [`ChannelError`]
    async fn check_status(response: Response) -> ChannelResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                let header_wait = retry_after_header(response.headers());
                let body = response.text().await.unwrap_or_default();
                let retry_after = header_wait.or_else(|| retry_after_body(&body));

                tracing::warn!(retry_after = ?retry_after, "Discord rate limit hit");
                Err(ChannelError::RateLimited { retry_after })
            }
            StatusCode::NOT_FOUND => Err(ChannelError::NotFound),
            _ => {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read response body".to_string());
                Err(ChannelError::Status {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}

/// Negative, NaN and out-of-range advice is ignored
fn seconds_to_duration(seconds: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(seconds).ok()
}

fn retry_after_header(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
        .and_then(seconds_to_duration)
}

fn retry_after_body(body: &str) -> Option<Duration> {
    serde_json::from_str::<RateLimitReply>(body)
        .ok()
        .and_then(|reply| reply.retry_after)
        .and_then(seconds_to_duration)
}

#[async_trait]
impl PublishChannel for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    async fn create(&self, report: &Report) -> ChannelResult<ReportId> {
        let form = self.build_form(report).await?;
        let response = self
            .send(self.client.post(self.messages_url()).multipart(form))
            .await?;

        let reply: MessageReply = response.json().await?;
        let id = reply
            .id
            .parse::<ReportId>()
            .map_err(|e| ChannelError::Other(format!("Invalid message id '{}': {e}", reply.id)))?;

        tracing::info!(report = %report.title, id = %id, "Discord message created");
        Ok(id)
    }

    async fn fetch(&self, id: ReportId) -> ChannelResult<ReportHandle> {
        self.send(self.client.get(self.message_url(id))).await?;
        Ok(ReportHandle { id })
    }

    async fn update(&self, handle: &ReportHandle, report: &Report) -> ChannelResult<()> {
        let form = self.build_form(report).await?;
        self.send(self.client.patch(self.message_url(handle.id)).multipart(form))
            .await?;

        tracing::debug!(report = %report.title, id = %handle.id, "Discord message updated");
        Ok(())
    }
}
