//! Configuration types for the dynamic DNS pipeline
//!
//! This module defines all configuration structures used throughout the crate.
//! The daemon fills them from environment variables; embedders may build them
//! directly or deserialize them.

use crate::dispatch::{BackpressurePolicy, DEFAULT_CAPACITY};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DyndnsConfig {
    /// Gateway polling (absent → polling disabled)
    #[serde(default)]
    pub poll: Option<PollConfig>,

    /// DNS provider credentials (absent → reconciliation disabled)
    #[serde(default)]
    pub provider: Option<ProviderConfig>,

    /// Record names to keep in sync, grouped by family
    #[serde(default)]
    pub records: RecordSets,

    /// Push endpoint (absent → push disabled)
    #[serde(default)]
    pub push: Option<PushConfig>,

    /// Health endpoints (absent → disabled)
    #[serde(default)]
    pub health: Option<HealthConfig>,

    /// Local IPv6 address whose host bits complete a routed prefix
    #[serde(default)]
    pub local_ipv6: Option<String>,

    /// Engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl DyndnsConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the reconciler will run
    pub fn reconciliation_enabled(&self) -> bool {
        self.provider.is_some() && !self.records.is_empty()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if let Some(poll) = &self.poll {
            poll.validate()?;
        }

        if let Some(provider) = &self.provider {
            provider.validate()?;
        }

        if let Some(local) = &self.local_ipv6 {
            local.parse::<crate::address::InterfaceId>()?;
        }

        for record in self.records.ipv4.iter().chain(&self.records.ipv6) {
            if record.is_empty() || !record.contains('.') || record.len() > 253 {
                return Err(crate::Error::config(format!(
                    "Invalid record name: '{}'",
                    record
                )));
            }
        }

        self.engine.validate()
    }
}

/// Record names grouped by the family they track
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSets {
    /// Names kept in sync with the IPv4 address (A records)
    #[serde(default)]
    pub ipv4: Vec<String>,
    /// Names kept in sync with the IPv6 address (AAAA records)
    #[serde(default)]
    pub ipv6: Vec<String>,
}

impl RecordSets {
    /// Build from comma-separated lists; blank entries are ignored
    pub fn from_lists(ipv4: &str, ipv6: &str) -> Self {
        Self {
            ipv4: split_list(ipv4),
            ipv6: split_list(ipv6),
        }
    }

    /// True when no record of either family is configured
    pub fn is_empty(&self) -> bool {
        self.ipv4.is_empty() && self.ipv6.is_empty()
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Gateway polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Gateway base URL (e.g., "http://fritz.box:49000")
    pub url: String,

    /// Interval between polls (in milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,

    /// Timeout for one gateway call (in milliseconds)
    #[serde(default = "default_gateway_timeout_ms")]
    pub timeout_ms: u64,
}

impl PollConfig {
    /// Validate the polling configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(crate::Error::config(format!(
                "Gateway URL must use HTTP or HTTPS scheme. Got: {}",
                self.url
            )));
        }
        if self.interval_ms == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        if self.timeout_ms == 0 {
            return Err(crate::Error::config("Gateway timeout must be > 0"));
        }
        Ok(())
    }

    /// Poll interval as a duration
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Gateway call timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// DNS provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare provider
    Cloudflare {
        /// API credentials
        credentials: CloudflareCredentials,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare { credentials } => credentials.validate(),
        }
    }
}

/// Cloudflare API credentials
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudflareCredentials {
    /// Scoped API token (preferred)
    Token(String),
    /// Deprecated global API key
    GlobalKey {
        /// Account e-mail
        email: String,
        /// Global API key
        key: String,
    },
}

impl CloudflareCredentials {
    /// Validate that no credential part is empty
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            CloudflareCredentials::Token(token) if token.is_empty() => {
                Err(crate::Error::config("Cloudflare API token cannot be empty"))
            }
            CloudflareCredentials::GlobalKey { email, key } if email.is_empty() || key.is_empty() => {
                Err(crate::Error::config(
                    "Cloudflare API e-mail and key are both required",
                ))
            }
            _ => Ok(()),
        }
    }
}

// Custom Debug implementation that hides secrets
impl std::fmt::Debug for CloudflareCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloudflareCredentials::Token(_) => f.debug_tuple("Token").field(&"<REDACTED>").finish(),
            CloudflareCredentials::GlobalKey { email, .. } => f
                .debug_struct("GlobalKey")
                .field("email", email)
                .field("key", &"<REDACTED>")
                .finish(),
        }
    }
}

/// Push endpoint configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Bind address (e.g., "0.0.0.0:8080")
    pub bind: String,
    /// Expected `username` query parameter
    #[serde(default)]
    pub username: String,
    /// Expected `password` query parameter
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for PushConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushConfig")
            .field("bind", &self.bind)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

/// Health endpoint configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Bind address
    pub bind: String,
    /// Optional `token` query parameter required on every request
    #[serde(default)]
    pub token: Option<String>,
}

impl std::fmt::Debug for HealthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthConfig")
            .field("bind", &self.bind)
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the dispatch queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// What producers do when the dispatch queue is full
    #[serde(default)]
    pub queue_policy: BackpressurePolicy,

    /// Timeout for each individual provider call (in milliseconds)
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,

    /// TTL given to newly created records (in seconds)
    #[serde(default = "default_record_ttl")]
    pub record_ttl: u32,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.queue_capacity == 0 {
            return Err(crate::Error::config("Queue capacity must be > 0"));
        }
        if self.provider_timeout_ms == 0 {
            return Err(crate::Error::config("Provider timeout must be > 0"));
        }
        Ok(())
    }

    /// Provider call timeout as a duration
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            queue_policy: BackpressurePolicy::default(),
            provider_timeout_ms: default_provider_timeout_ms(),
            record_ttl: default_record_ttl(),
        }
    }
}

fn default_queue_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_provider_timeout_ms() -> u64 {
    60_000
}

fn default_record_ttl() -> u32 {
    120
}

fn default_poll_interval_ms() -> u64 {
    300_000
}

fn default_gateway_timeout_ms() -> u64 {
    5_000
}

/// Parse a duration such as `300ms`, `5s`, `1m30s` or `2h`
///
/// A bare number is taken as seconds.
pub fn parse_duration(input: &str) -> Result<Duration, crate::Error> {
    let input = input.trim();
    if input.is_empty() {
        return Err(crate::Error::config("Empty duration"));
    }

    if let Ok(secs) = input.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let invalid = || crate::Error::config(format!("Invalid duration: '{}'", input));
    let too_long = || crate::Error::config(format!("Duration out of range: '{}'", input));

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).ok_or_else(invalid)?;
        if digits == 0 {
            return Err(invalid());
        }
        let value: u64 = rest[..digits].parse().map_err(|_| too_long())?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let part = match &rest[..unit_len] {
            "ms" => Some(Duration::from_millis(value)),
            "s" => Some(Duration::from_secs(value)),
            "m" => value.checked_mul(60).map(Duration::from_secs),
            "h" => value.checked_mul(3600).map(Duration::from_secs),
            _ => return Err(invalid()),
        };
        total = part
            .and_then(|part| total.checked_add(part))
            .ok_or_else(too_long)?;
        rest = &rest[unit_len..];
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_sets_from_lists() {
        let sets = RecordSets::from_lists("a.example.com, b.example.com,,", "");
        assert_eq!(sets.ipv4, vec!["a.example.com", "b.example.com"]);
        assert!(sets.ipv6.is_empty());
        assert!(!sets.is_empty());
        assert!(RecordSets::from_lists(" ", "").is_empty());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("300ms").unwrap(), Duration::from_millis(300));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("42").unwrap(), Duration::from_secs(42));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("5 minutes").is_err());
        assert!(parse_duration("s5").is_err());
        assert!(parse_duration("10").is_ok());
    }

    #[test]
    fn test_parse_duration_overflow() {
        assert!(matches!(
            parse_duration("5124095576030432h"),
            Err(crate::Error::Config(m)) if m.contains("out of range")
        ));
        assert!(parse_duration("307445734561825861m").is_err());
        assert!(parse_duration("18446744073709551615s1h").is_err());
        assert!(parse_duration("99999999999999999999999s").is_err());
        assert_eq!(
            parse_duration("18446744073709551615ms").unwrap(),
            Duration::from_millis(u64::MAX)
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = DyndnsConfig::new();
        assert!(config.validate().is_ok());
        assert!(!config.reconciliation_enabled());

        config.local_ipv6 = Some("not-an-address".to_string());
        assert!(config.validate().is_err());
        config.local_ipv6 = Some("::1:2:3:4".to_string());
        assert!(config.validate().is_ok());

        config.provider = Some(ProviderConfig::Cloudflare {
            credentials: CloudflareCredentials::Token(String::new()),
        });
        assert!(config.validate().is_err());

        config.provider = Some(ProviderConfig::Cloudflare {
            credentials: CloudflareCredentials::Token("token".to_string()),
        });
        config.records = RecordSets::from_lists("localhost", "");
        assert!(config.validate().is_err());

        config.records = RecordSets::from_lists("home.example.com", "");
        assert!(config.validate().is_ok());
        assert!(config.reconciliation_enabled());

        config.engine.queue_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_interval_in_millis() {
        let mut poll = PollConfig {
            url: "http://fritz.box:49000".to_string(),
            interval_ms: 500,
            timeout_ms: 5_000,
        };
        assert!(poll.validate().is_ok());
        assert_eq!(poll.interval(), Duration::from_millis(500));

        poll.interval_ms = 0;
        assert!(poll.validate().is_err());
    }

    #[test]
    fn test_secrets_not_in_debug() {
        let credentials = CloudflareCredentials::GlobalKey {
            email: "me@example.com".to_string(),
            key: "super-secret-key".to_string(),
        };
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("me@example.com"));
        assert!(!debug.contains("super-secret-key"));

        let push = PushConfig {
            bind: "0.0.0.0:8080".to_string(),
            username: "fritz".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{:?}", push).contains("hunter2"));
    }
}
