//! Environment configuration
//!
//! Everything the daemon needs comes from the process environment. The
//! lookup is injected so the mapping can be tested without touching the
//! real environment.

use anyhow::{Context, Result};
use dyndns_core::config::{
    CloudflareCredentials, EngineConfig, HealthConfig, PollConfig, ProviderConfig, PushConfig,
    parse_duration,
};
use dyndns_core::{BackpressurePolicy, DyndnsConfig, RecordSets};
use std::time::Duration;
use tracing::Level;

/// Poll interval used when `FRITZBOX_ENDPOINT_INTERVAL` cannot be parsed
const FALLBACK_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// Gateway call timeout used when `FRITZBOX_ENDPOINT_TIMEOUT` is absent or invalid
const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(5);

/// Daemon settings
#[derive(Debug)]
pub struct Settings {
    pub config: DyndnsConfig,
    pub log_level: Level,
    /// Problems worth logging once tracing is up
    pub warnings: Vec<String>,
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through `lookup`; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut warnings = Vec::new();

        let poll = match (get("FRITZBOX_ENDPOINT_URL"), get("FRITZBOX_ENDPOINT_INTERVAL")) {
            (Some(url), Some(interval)) => {
                let interval = parse_duration(&interval).unwrap_or_else(|e| {
                    warnings.push(format!(
                        "Failed to parse FRITZBOX_ENDPOINT_INTERVAL, using {:?}: {}",
                        FALLBACK_POLL_INTERVAL, e
                    ));
                    FALLBACK_POLL_INTERVAL
                });

                let timeout = match get("FRITZBOX_ENDPOINT_TIMEOUT") {
                    Some(raw) => parse_duration(&raw).unwrap_or_else(|e| {
                        warnings.push(format!(
                            "Failed to parse FRITZBOX_ENDPOINT_TIMEOUT, using {:?}: {}",
                            DEFAULT_GATEWAY_TIMEOUT, e
                        ));
                        DEFAULT_GATEWAY_TIMEOUT
                    }),
                    None => DEFAULT_GATEWAY_TIMEOUT,
                };

                Some(PollConfig {
                    url: url.trim_end_matches('/').to_string(),
                    interval_ms: millis(interval),
                    timeout_ms: millis(timeout),
                })
            }
            (Some(_), None) => {
                warnings.push("FRITZBOX_ENDPOINT_INTERVAL not set, polling disabled".to_string());
                None
            }
            (None, _) => None,
        };

        let credentials = match (
            get("CLOUDFLARE_API_TOKEN"),
            get("CLOUDFLARE_API_EMAIL"),
            get("CLOUDFLARE_API_KEY"),
        ) {
            (Some(token), _, _) => Some(CloudflareCredentials::Token(token)),
            (None, Some(email), Some(key)) => {
                warnings.push(
                    "CLOUDFLARE_API_EMAIL/CLOUDFLARE_API_KEY are deprecated, use CLOUDFLARE_API_TOKEN"
                        .to_string(),
                );
                Some(CloudflareCredentials::GlobalKey { email, key })
            }
            _ => None,
        };

        let records = RecordSets::from_lists(
            &get("CLOUDFLARE_ZONES_IPV4").unwrap_or_default(),
            &get("CLOUDFLARE_ZONES_IPV6").unwrap_or_default(),
        );

        let provider = match credentials {
            Some(credentials) if !records.is_empty() => {
                Some(ProviderConfig::Cloudflare { credentials })
            }
            Some(_) => {
                warnings.push(
                    "No CLOUDFLARE_ZONES_IPV4 or CLOUDFLARE_ZONES_IPV6 configured, Cloudflare updates disabled"
                        .to_string(),
                );
                None
            }
            None => {
                warnings.push("No Cloudflare credentials configured, Cloudflare updates disabled".to_string());
                None
            }
        };

        let push = get("DYNDNS_SERVER_BIND").map(|bind| PushConfig {
            bind,
            username: get("DYNDNS_SERVER_USERNAME").unwrap_or_default(),
            password: get("DYNDNS_SERVER_PASSWORD").unwrap_or_default(),
        });

        let health = get("METRICS_BIND").map(|bind| HealthConfig {
            bind,
            token: get("METRICS_TOKEN"),
        });

        let mut engine = EngineConfig::default();
        if let Some(raw) = get("DYNDNS_QUEUE_CAPACITY") {
            engine.queue_capacity = raw
                .parse()
                .with_context(|| format!("DYNDNS_QUEUE_CAPACITY '{}' is not a number", raw))?;
        }
        if let Some(raw) = get("DYNDNS_QUEUE_POLICY") {
            engine.queue_policy = raw.parse::<BackpressurePolicy>()?;
        }
        if let Some(raw) = get("DYNDNS_PROVIDER_TIMEOUT") {
            engine.provider_timeout_ms = millis(
                parse_duration(&raw)
                    .with_context(|| format!("DYNDNS_PROVIDER_TIMEOUT '{}' is invalid", raw))?,
            );
        }

        let log_level = parse_level(&get("DYNDNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()))?;

        let config = DyndnsConfig {
            poll,
            provider,
            records,
            push,
            health,
            local_ipv6: get("DEVICE_LOCAL_ADDRESS_IPV6"),
            engine,
        };

        Ok(Self {
            config,
            log_level,
            warnings,
        })
    }

    /// Validate the loaded configuration
    pub fn validate(&self) -> Result<()> {
        self.config.validate()?;

        if self.config.poll.is_none() && self.config.push.is_none() {
            anyhow::bail!(
                "Neither polling nor the push endpoint is configured. \
                Set FRITZBOX_ENDPOINT_URL and FRITZBOX_ENDPOINT_INTERVAL, or DYNDNS_SERVER_BIND"
            );
        }

        Ok(())
    }
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis().try_into().unwrap_or(u64::MAX)
}

fn parse_level(raw: &str) -> Result<Level> {
    match raw.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "DYNDNS_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            raw
        ),
    }
}
