//! Error classification for the serverwatch crate
//!
//! Every module returns its own error type; [`WatchErrorTrait`] maps each of
//! them onto an [`ErrorCategory`], which decides how the engine reacts.
//!
//! # Handling strategies
//!
//! | Category | Strategy |
//! |---|---|
//! | `Network` | endpoint shown offline, nothing to do |
//! | `Protocol` | report online with unknown map |
//! | `Geo` | unknown region label |
//! | `RateLimit` | one bounded retry |
//! | `Channel` | abandon the endpoint for this cycle |
//! | `Persistence` | skip the cycle, or log the orphaned report id |
//! | `Config` | refuse to start |
//!
//! # Usage
//!
//! ```rust
//! use serverwatch::channel::ChannelError;
//! use serverwatch::error::{ErrorCategory, WatchErrorTrait};
//!
//! let err = ChannelError::RateLimited { retry_after: None };
//! assert_eq!(err.category(), ErrorCategory::RateLimit);
//! ```

// Re-export domain-specific errors for convenience
pub use crate::channel::ChannelError;
pub use crate::utils::error::{GeoError, QueryError, StoreError};

/// Common trait for all serverwatch error types
pub trait WatchErrorTrait: std::error::Error {
    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Endpoint unreachable
    Network,
    /// Metadata query failed or returned garbage
    Protocol,
    /// Region lookup failed
    Geo,
    /// Channel asked us to slow down
    RateLimit,
    /// Channel rejected or failed a request
    Channel,
    /// Bindings could not be read or written
    Persistence,
    /// Configuration and validation errors
    Config,
}

impl ErrorCategory {
    /// Stable label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Protocol => "protocol",
            Self::Geo => "geo",
            Self::RateLimit => "rate_limit",
            Self::Channel => "channel",
            Self::Persistence => "persistence",
            Self::Config => "config",
        }
    }
}

impl WatchErrorTrait for QueryError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Io(_) | Self::Timeout(_) => ErrorCategory::Network,
            _ => ErrorCategory::Protocol,
        }
    }
}

impl WatchErrorTrait for GeoError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidUrl(_) => ErrorCategory::Config,
            _ => ErrorCategory::Geo,
        }
    }
}

impl WatchErrorTrait for StoreError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Persistence
    }
}

impl WatchErrorTrait for ChannelError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::InvalidConfig(_) => ErrorCategory::Config,
            _ => ErrorCategory::Channel,
        }
    }
}
