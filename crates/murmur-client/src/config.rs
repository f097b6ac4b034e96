//! Client configuration.

use std::time::Duration;

use murmur_core::RetryConfig;

/// Default REST base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Default push endpoint.
pub const DEFAULT_WS_URL: &str = "ws://localhost:8080/ws";

/// Delay before the push channel reconnects after losing its socket.
pub const DEFAULT_PUSH_RECONNECT_DELAY: Duration = Duration::from_millis(5000);

/// Everything needed to talk to one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// REST base URL, without a trailing slash.
    pub api_url: String,
    /// WebSocket URL of the STOMP endpoint.
    pub ws_url: String,
    /// Retry policy for every REST fetcher.
    pub retry: RetryConfig,
    /// Fixed delay between push reconnect attempts.
    pub push_reconnect_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_owned(),
            ws_url: DEFAULT_WS_URL.to_owned(),
            retry: RetryConfig::default(),
            push_reconnect_delay: DEFAULT_PUSH_RECONNECT_DELAY,
        }
    }
}

impl ClientConfig {
    /// Override the REST base URL. A trailing slash is dropped.
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.api_url = url.trim_end_matches('/').to_owned();
        self
    }

    /// Override the push endpoint.
    #[must_use]
    pub fn with_ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = url.into();
        self
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_localhost() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url, "http://localhost:8080");
        assert_eq!(config.ws_url, "ws://localhost:8080/ws");
        assert_eq!(config.push_reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.retry.max_retries, 5);
    }

    #[test]
    fn api_url_trailing_slash_is_trimmed() {
        let config = ClientConfig::default().with_api_url("https://chat.example/");
        assert_eq!(config.api_url, "https://chat.example");
    }
}
