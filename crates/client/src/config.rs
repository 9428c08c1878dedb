//! Configuration types for the MCP client.

use parley_mcp::protocol::{ClientInfo, PROTOCOL_VERSION};
use rand::Rng;
use std::time::Duration;

/// Configuration for an MCP client connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Total time allowed per candidate endpoint.
    pub request_timeout: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
    /// Identity announced in `initialize`.
    pub client_info: ClientInfo,
    /// Protocol version announced in `initialize`.
    pub protocol_version: String,
    /// Try the last winning endpoint first on later calls.
    pub cache_endpoint: bool,
    /// Check the health endpoint before `initialize`.
    pub health_check: bool,
    /// Server push (SSE) listener settings.
    pub sse: SseConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("parley-client/", env!("CARGO_PKG_VERSION")).to_string(),
            client_info: ClientInfo {
                name: "parley-client".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            protocol_version: PROTOCOL_VERSION.to_string(),
            cache_endpoint: false,
            health_check: true,
            sse: SseConfig::default(),
        }
    }
}

/// Configuration for the SSE listener.
#[derive(Debug, Clone)]
pub struct SseConfig {
    /// Start the listener after a successful connect.
    pub enabled: bool,
    /// Capacity of the notification broadcast channel.
    pub channel_capacity: usize,
    /// Reconnect policy.
    pub retry: RetryConfig,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channel_capacity: 64,
            retry: RetryConfig::default(),
        }
    }
}

impl SseConfig {
    /// No push listener at all.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

/// Configuration for reconnect behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum consecutive failed attempts; `None` retries until cancelled.
    pub max_retries: Option<u32>,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub backoff_multiplier: f64,
    /// Relative jitter applied to each backoff (0.2 = ±20%).
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: None,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

impl RetryConfig {
    /// Create a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: Some(0),
            ..Default::default()
        }
    }

    /// Whether another attempt is allowed after `attempt` failures.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_retries.is_none_or(|max| attempt < max)
    }

    /// Calculate backoff duration for a given attempt, without jitter.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let backoff_ms = self.initial_backoff.as_millis() as f64
            * self.backoff_multiplier.powi(attempt.min(64) as i32);
        let backoff = Duration::from_millis(backoff_ms.min(u64::MAX as f64) as u64);
        std::cmp::min(backoff, self.max_backoff)
    }

    /// Backoff for `attempt` with random jitter applied.
    pub fn jittered_backoff(&self, attempt: u32) -> Duration {
        let base = self.backoff_for_attempt(attempt);
        if self.jitter <= 0.0 {
            return base;
        }
        let factor = rand::rng().random_range((1.0 - self.jitter)..=(1.0 + self.jitter));
        base.mul_f64(factor.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let config = RetryConfig::default();

        assert_eq!(config.backoff_for_attempt(0), Duration::from_millis(500));
        assert_eq!(config.backoff_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(config.backoff_for_attempt(2), Duration::from_millis(2000));
    }

    #[test]
    fn test_backoff_capped_at_max() {
        let config = RetryConfig::default();
        assert_eq!(config.backoff_for_attempt(10), Duration::from_secs(30));
        assert_eq!(config.backoff_for_attempt(1000), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let config = RetryConfig::default();
        for _ in 0..100 {
            let backoff = config.jittered_backoff(1);
            assert!(backoff >= Duration::from_millis(800));
            assert!(backoff <= Duration::from_millis(1200));
        }
    }

    #[test]
    fn test_allows() {
        assert!(RetryConfig::default().allows(1_000_000));
        assert!(!RetryConfig::no_retry().allows(0));

        let three = RetryConfig {
            max_retries: Some(3),
            ..Default::default()
        };
        assert!(three.allows(2));
        assert!(!three.allows(3));
    }

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::default();

        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.protocol_version, "2024-11-05");
        assert!(config.user_agent.starts_with("parley-client/"));
        assert!(!config.cache_endpoint);
        assert!(config.sse.enabled);
        assert_eq!(config.sse.channel_capacity, 64);
    }
}
