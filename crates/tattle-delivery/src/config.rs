//! Delivery worker configuration, resolved from the environment with
//! defaults.

use std::env;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_USER_AGENT: &str = "tattle-webhooks/0.1";
/// 14 days.
const DEFAULT_LOG_RETENTION_HOURS: i64 = 336;
const DEFAULT_RESPONSE_BODY_CAP: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    pub user_agent: String,
    /// Permit plain-HTTP targets. Dev/test only.
    pub allow_http: bool,
    /// Permit private/internal target hosts. Dev/test only.
    pub allow_internal_hosts: bool,
    /// Audit log entries older than this are purged.
    pub log_retention: chrono::Duration,
    /// Stored response bodies are cut off at this many characters. Parsing
    /// happens on the full body before the cut.
    pub response_body_cap: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            allow_http: false,
            allow_internal_hosts: false,
            log_retention: chrono::Duration::hours(DEFAULT_LOG_RETENTION_HOURS),
            response_body_cap: DEFAULT_RESPONSE_BODY_CAP,
        }
    }
}

impl DeliveryConfig {
    /// Read configuration from the environment.
    ///
    /// - `TATTLE_HTTP_TIMEOUT_SECS` (default 10)
    /// - `TATTLE_USER_AGENT` (default `tattle-webhooks/0.1`)
    /// - `TATTLE_ALLOW_HTTP` (default false)
    /// - `TATTLE_ALLOW_INTERNAL_HOSTS` (default false)
    /// - `TATTLE_LOG_RETENTION_HOURS` (default 336)
    /// - `TATTLE_RESPONSE_BODY_CAP` (default 65536)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = env_parse::<u64>("TATTLE_HTTP_TIMEOUT_SECS") {
            config.timeout = Duration::from_secs(secs);
        }
        if let Ok(agent) = env::var("TATTLE_USER_AGENT") {
            if !agent.is_empty() {
                config.user_agent = agent;
            }
        }
        if let Some(allow) = env_parse::<bool>("TATTLE_ALLOW_HTTP") {
            config.allow_http = allow;
        }
        if let Some(allow) = env_parse::<bool>("TATTLE_ALLOW_INTERNAL_HOSTS") {
            config.allow_internal_hosts = allow;
        }
        if let Some(hours) = env_parse::<i64>("TATTLE_LOG_RETENTION_HOURS") {
            config.log_retention = chrono::Duration::hours(hours);
        }
        if let Some(cap) = env_parse::<usize>("TATTLE_RESPONSE_BODY_CAP") {
            config.response_body_cap = cap;
        }

        config
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_allow_http(mut self, allow_http: bool) -> Self {
        self.allow_http = allow_http;
        self
    }

    pub fn with_allow_internal_hosts(mut self, allow: bool) -> Self {
        self.allow_internal_hosts = allow;
        self
    }

    pub fn with_log_retention(mut self, retention: chrono::Duration) -> Self {
        self.log_retention = retention;
        self
    }

    pub fn with_response_body_cap(mut self, cap: usize) -> Self {
        self.response_body_cap = cap;
        self
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = DeliveryConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.user_agent, "tattle-webhooks/0.1");
        assert!(!config.allow_http);
        assert_eq!(config.log_retention, chrono::Duration::hours(336));
        assert_eq!(config.response_body_cap, 64 * 1024);
    }

    #[test]
    fn builder_overrides() {
        let config = DeliveryConfig::default()
            .with_timeout(Duration::from_secs(3))
            .with_allow_http(true)
            .with_log_retention(chrono::Duration::hours(1));
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert!(config.allow_http);
        assert_eq!(config.log_retention, chrono::Duration::hours(1));
    }
}
