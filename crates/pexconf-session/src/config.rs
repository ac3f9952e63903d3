//! Session configuration.

use std::time::Duration;

/// Timing parameters of a conference session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Bound on the initial token request and on each refresh.
    pub token_timeout: Duration,

    /// Bound on every other request (chat, participant calls, release).
    pub request_timeout: Duration,

    /// Reconnect delay used until the node sends a `retry:` hint.
    pub default_retry: Duration,

    /// Floor applied to every reconnect delay.
    pub min_reconnect_delay: Duration,

    /// Refresh early if the token expires within this margin.
    pub refresh_threshold: Duration,

    /// Tokens this close to expiry are refused until refreshed. Keep it
    /// below `refresh_threshold`.
    pub stale_threshold: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
            default_retry: Duration::from_secs(1),
            min_reconnect_delay: Duration::from_millis(500),
            refresh_threshold: Duration::from_secs(10),
            stale_threshold: Duration::from_secs(5),
        }
    }
}

impl SessionConfig {
    /// Builder: set the token request timeout.
    #[must_use]
    pub fn with_token_timeout(mut self, timeout: Duration) -> Self {
        self.token_timeout = timeout;
        self
    }

    /// Builder: set the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Builder: set the default reconnect delay.
    #[must_use]
    pub fn with_default_retry(mut self, retry: Duration) -> Self {
        self.default_retry = retry;
        self
    }

    /// Builder: set the reconnect delay floor.
    #[must_use]
    pub fn with_min_reconnect_delay(mut self, delay: Duration) -> Self {
        self.min_reconnect_delay = delay;
        self
    }

    /// Builder: set the early refresh margin.
    #[must_use]
    pub fn with_refresh_threshold(mut self, threshold: Duration) -> Self {
        self.refresh_threshold = threshold;
        self
    }

    /// Builder: set the stale token margin.
    #[must_use]
    pub fn with_stale_threshold(mut self, threshold: Duration) -> Self {
        self.stale_threshold = threshold;
        self
    }

    /// Delay before the next reconnect, given the latest `retry:` hint.
    pub fn reconnect_delay(&self, retry_hint: Option<Duration>) -> Duration {
        retry_hint
            .unwrap_or(self.default_retry)
            .max(self.min_reconnect_delay)
    }
}
