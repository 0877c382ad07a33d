//! Publish channels for status reports
//!
//! A publish channel is the external surface where reports live. The sync
//! engine only needs three operations from it: create a new report, fetch an
//! existing one by id, and edit it in place.
//!
//! ```text
//!   SyncEngine ──create──▶ ┌────────────────┐
//!              ──fetch───▶ │ PublishChannel │ ──▶ Discord REST
//!              ──update──▶ └────────────────┘
//! ```

pub mod discord;

use async_trait::async_trait;
use std::time::Duration;

use crate::models::ReportId;
use crate::report::Report;

pub use discord::{DiscordChannel, DiscordConfig};

/// Result type for channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors that can occur during channel operations
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The channel asked us to slow down
    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimited {
        /// Advised wait, if the channel supplied one
        retry_after: Option<Duration>,
    },

    /// The report no longer exists on the channel
    #[error("Report not found")]
    NotFound,

    /// Non-success HTTP status other than 404/429
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Invalid channel configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error
    #[error("Channel error: {0}")]
    Other(String),
}

impl ChannelError {
    /// Whether this error is a rate-limit signal
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Advised wait carried by a rate-limit signal
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Proof that a report exists on the channel, obtained through [`PublishChannel::fetch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportHandle {
    pub id: ReportId,
}

/// Trait for report publish channels
///
/// Implement this trait to publish reports somewhere other than Discord.
#[async_trait]
pub trait PublishChannel: Send + Sync {
    /// Get the channel name
    fn name(&self) -> &str;

    /// Publish a new report with its asset attached
    async fn create(&self, report: &Report) -> ChannelResult<ReportId>;

    /// Look up an existing report; [`ChannelError::NotFound`] if it was deleted
    async fn fetch(&self, id: ReportId) -> ChannelResult<ReportHandle>;

    /// Replace the content of an existing report
    async fn update(&self, handle: &ReportHandle, report: &Report) -> ChannelResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_accessors() {
        let err = ChannelError::RateLimited {
            retry_after: Some(Duration::from_millis(1500)),
        };
        assert!(err.is_rate_limited());
        assert_eq!(err.retry_after(), Some(Duration::from_millis(1500)));

        let err = ChannelError::NotFound;
        assert!(!err.is_rate_limited());
        assert_eq!(err.retry_after(), None);
    }

    #[test]
    fn test_status_display() {
        let err = ChannelError::Status {
            status: 403,
            body: "Missing Access".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 403: Missing Access");
    }
}
