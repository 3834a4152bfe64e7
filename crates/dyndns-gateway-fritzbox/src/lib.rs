// # FRITZ!Box Gateway Client
//
// `GatewayClient` implementation for AVM FRITZ!Box routers, using the
// unauthenticated UPnP IGD control endpoint (port 49000 by default).
//
// ## Calls
//
// Every call is a SOAP POST to `{url}/igdupnp/control/WANIPConn1`:
//
// | Trait method    | SOAP action                        | Fields read                                      |
// |-----------------|------------------------------------|--------------------------------------------------|
// | `ipv4()`        | `GetExternalIPAddress`             | `NewExternalIPAddress`                           |
// | `ipv6()`        | `X_AVM_DE_GetExternalIPv6Address`  | `NewExternalIPv6Address`, `NewValidLifetime`     |
// | `ipv6_prefix()` | `X_AVM_DE_GetIPv6Prefix`           | `NewIPv6Prefix`, `NewPrefixLength`, `NewValidLifetime` |
//
// A valid lifetime of 0 (or none at all) means IPv6 is disabled and is reported as "no
// address", not as an error. So is an IPv4 of `0.0.0.0` (WAN down).
//
// ## Constraints
//
// - ✅ One HTTP request per trait call, bounded by the configured timeout
// - ❌ NO retries (the next poll tick is the retry)
// - ❌ NO change detection (owned by the poller's `ChangeGate`)

pub mod soap;

use async_trait::async_trait;
use dyndns_core::config::PollConfig;
use dyndns_core::traits::GatewayClient;
use dyndns_core::{Error, Ipv6Prefix, Result};
use soap::Action;
use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

/// Default gateway URL
pub const DEFAULT_URL: &str = "http://fritz.box:49000";

/// Default timeout for one gateway call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// FRITZ!Box WAN address client
#[derive(Debug, Clone)]
pub struct FritzBox {
    /// Base URL without trailing slash
    url: String,

    client: reqwest::Client,
}

impl FritzBox {
    /// Create a client for the gateway at `url`
    ///
    /// # Errors
    ///
    /// - `Error::Config`: `url` is not an HTTP(S) URL
    /// - `Error::Http`: the HTTP client could not be built
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into().trim_end_matches('/').to_string();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(Error::config(format!(
                "Gateway URL must use HTTP or HTTPS scheme. Got: {}",
                url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { url, client })
    }

    /// Create a client from the polling configuration
    pub fn from_config(config: &PollConfig) -> Result<Self> {
        Self::new(config.url.clone(), config.timeout())
    }

    /// Gateway base URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Perform one SOAP action and return the response fields
    async fn call(&self, action: Action) -> Result<HashMap<String, String>> {
        tracing::debug!(action = action.name(), "Calling gateway");

        let response = self
            .client
            .post(format!("{}{}", self.url, soap::CONTROL_PATH))
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SoapAction", action.header())
            .body(action.envelope())
            .send()
            .await
            .map_err(|e| Error::source(format!("{} request failed: {}", action.name(), e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::source(format!("Failed to read {} response: {}", action.name(), e)))?;

        // Faults come back as 500 with a SOAP body; report the fault text
        let fields = soap::fields(&body);
        if let Some(fault) = fields.as_ref().ok().and_then(soap::fault) {
            return Err(Error::source(format!("{} failed: {}", action.name(), fault)));
        }

        if !status.is_success() {
            return Err(Error::source(format!(
                "{} failed with HTTP status {}",
                action.name(),
                status
            )));
        }

        fields
    }
}

#[async_trait]
impl GatewayClient for FritzBox {
    async fn ipv4(&self) -> Result<Option<Ipv4Addr>> {
        soap::parse_ipv4(&self.call(Action::ExternalIpv4).await?)
    }

    async fn ipv6(&self) -> Result<Option<Ipv6Addr>> {
        soap::parse_ipv6(&self.call(Action::ExternalIpv6).await?)
    }

    async fn ipv6_prefix(&self) -> Result<Option<Ipv6Prefix>> {
        soap::parse_prefix(&self.call(Action::Ipv6Prefix).await?)
    }

    fn gateway_name(&self) -> &'static str {
        "fritzbox"
    }
}
