//! Retry utilities for rate-limited operations
//!
//! Channels answer bursts with a "slow down, retry after N seconds" signal.
//! The helpers here honour that signal a bounded number of times (once, by
//! default) and leave every other failure to the caller.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first call
    pub max_retries: u32,

    /// Wait used when the error carries no advised delay
    pub default_wait: Duration,

    /// Upper bound on any single wait
    pub max_wait: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            default_wait: Duration::from_secs(1),
            max_wait: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Create a configuration with a custom fallback wait
    pub fn with_default_wait(default_wait: Duration) -> Self {
        Self {
            default_wait,
            ..Default::default()
        }
    }

    /// Wait applied for an advised delay
    pub fn wait_for(&self, advised: Option<Duration>) -> Duration {
        advised.unwrap_or(self.default_wait).min(self.max_wait)
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAdvice {
    /// Give up and return the error
    Stop,
    /// Wait (the advised delay, or the configured default) and try again
    RetryAfter(Option<Duration>),
}

/// Result of an operation together with the number of retries it took
#[derive(Debug)]
pub struct Attempted<T, E> {
    pub result: Result<T, E>,
    pub retries: u32,
}

impl<T, E> Attempted<T, E> {
    pub fn retried(&self) -> bool {
        self.retries > 0
    }
}

/// Execute an operation, retrying only when `advise` asks for it
///
/// # Example
///
/// ```no_run
/// use serverwatch::utils::retry::{with_retry_if, RetryAdvice, RetryConfig};
///
/// # async fn example() {
/// let config = RetryConfig::default();
/// let attempted = with_retry_if(
///     &config,
///     || async { Err::<(), u32>(429) },
///     |status| if *status == 429 { RetryAdvice::RetryAfter(None) } else { RetryAdvice::Stop },
/// )
/// .await;
/// assert_eq!(attempted.retries, 1);
/// # }
/// ```
pub async fn with_retry_if<T, E, F, Fut, A>(
    config: &RetryConfig,
    mut operation: F,
    advise: A,
) -> Attempted<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    A: Fn(&E) -> RetryAdvice,
    E: std::fmt::Display,
{
    let mut retries = 0;

    loop {
        let error = match operation().await {
            Ok(value) => {
                if retries > 0 {
                    debug!(retries = retries, "Operation succeeded after retry");
                }
                return Attempted {
                    result: Ok(value),
                    retries,
                };
            }
            Err(e) => e,
        };

        let advised = match advise(&error) {
            RetryAdvice::RetryAfter(advised) if retries < config.max_retries => advised,
            _ => {
                return Attempted {
                    result: Err(error),
                    retries,
                }
            }
        };

        let delay = config.wait_for(advised);
        warn!(
            attempt = retries + 1,
            max_retries = config.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Retrying operation after delay"
        );
        tokio::time::sleep(delay).await;
        retries += 1;
    }
}
