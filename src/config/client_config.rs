use std::time::Duration;

/// Configuration for [`JanusClient`](crate::JanusClient).
///
/// The keepalive interval must stay strictly below the gateway's session
/// timeout (60 seconds on a stock deployment) or the gateway reclaims the
/// session between keepalives.
#[derive(Debug, Clone)]
pub struct JanusConfig {
    /// WebSocket URL of the gateway (e.g. "ws://localhost:8188/janus")
    pub url: String,

    /// Connection establishment timeout (Default: 10s)
    pub connection_timeout: Duration,

    /// Deadline for a direct reply to any single request (Default: 30s)
    pub request_timeout: Duration,

    /// Interval between keepalive envelopes per session (Default: 45s)
    pub keepalive_interval: Duration,

    /// Maximum number of in-flight transactions (Default: 1000)
    pub max_pending_transactions: usize,
}

impl JanusConfig {
    /// Create a configuration with default timings for the given gateway URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connection_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            keepalive_interval: Duration::from_secs(45),
            max_pending_transactions: 1000,
        }
    }

    /// Build the URL from its components, for callers that do not want to
    /// assemble the string themselves.
    pub fn for_host(host: &str, port: u16, secure: bool) -> Self {
        let scheme = if secure { "wss" } else { "ws" };
        Self::new(format!("{}://{}:{}/janus", scheme, host, port))
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if !self.url.starts_with("ws://") && !self.url.starts_with("wss://") {
            return Err(format!(
                "url must use the ws:// or wss:// scheme, got '{}'",
                self.url
            ));
        }

        if self.connection_timeout.is_zero() {
            return Err("connection_timeout must be greater than 0".to_string());
        }

        if self.request_timeout.is_zero() {
            return Err("request_timeout must be greater than 0".to_string());
        }

        if self.keepalive_interval.is_zero() {
            return Err("keepalive_interval must be greater than 0".to_string());
        }

        if self.max_pending_transactions == 0 {
            return Err("max_pending_transactions must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timings() {
        let config = JanusConfig::new("ws://localhost:8188/janus");
        assert_eq!(config.connection_timeout, Duration::from_secs(10));
        assert_eq!(config.keepalive_interval, Duration::from_secs(45));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_for_host_builds_url() {
        let config = JanusConfig::for_host("janus.example.org", 8989, true);
        assert_eq!(config.url, "wss://janus.example.org:8989/janus");
    }

    #[test]
    fn test_rejects_non_websocket_scheme() {
        let config = JanusConfig::new("http://localhost:8088/janus");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_keepalive() {
        let mut config = JanusConfig::new("ws://localhost:8188/janus");
        config.keepalive_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
