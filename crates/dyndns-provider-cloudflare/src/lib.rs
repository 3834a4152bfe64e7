// # Cloudflare DNS Provider
//
// `DnsProvider` implementation for the Cloudflare API v4.
//
// ## Behaviour
//
// - ✅ One HTTP request per trait call
// - ✅ Scoped API token (Bearer) or legacy e-mail + global key
// - ✅ Zone discovery by walking the record name's parent domains
// - ✅ Full-replacement updates: content, TTL and proxy flag always sent
// - ✅ HTTP status mapped to specific errors (401/403, 404, 429, 5xx)
// - ❌ NO retry or backoff (a failure is surfaced as action status)
// - ❌ NO decision whether a write is needed (owned by `Reconciler`)
// - ❌ NO caching beyond a single request
//
// ## Security Requirements
//
// - Credentials NEVER appear in logs, errors or Debug output
// - Empty credentials are rejected at construction
//
// ## API Reference
//
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=...&name=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PATCH `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use dyndns_core::config::{CloudflareCredentials, ProviderConfig};
use dyndns_core::traits::{DnsProvider, DnsRecord, NewRecord, RecordType, RecordUpdate};
use dyndns_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// HTTP timeout for API requests; the reconciler applies its own deadline on top
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER: &str = "cloudflare";

/// Response envelope shared by every Cloudflare v4 endpoint
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiRecord {
    id: String,
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    content: String,
    #[serde(default)]
    ttl: u32,
    #[serde(default)]
    proxied: bool,
}

#[derive(Debug, Serialize)]
struct CreateBody<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
    proxied: bool,
}

#[derive(Debug, Serialize)]
struct UpdateBody<'a> {
    content: &'a str,
    ttl: u32,
    proxied: bool,
}

/// Cloudflare DNS provider
///
/// # Trust Level: Untrusted
///
/// Stateless and single-shot. Each trait method performs exactly one API
/// request, except [`DnsProvider::resolve_zone_id`] which may try several
/// parent domains.
pub struct CloudflareProvider {
    /// ⚠️ NEVER log this value
    credentials: CloudflareCredentials,

    /// API base URL without trailing slash
    api_base: String,

    client: reqwest::Client,
}

// Custom Debug implementation that hides the credentials
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("credentials", &self.credentials)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a provider talking to the public Cloudflare API
    pub fn new(credentials: CloudflareCredentials) -> Result<Self> {
        Self::with_api_base(credentials, CLOUDFLARE_API_BASE)
    }

    /// Create a provider talking to `api_base` (tests, API proxies)
    ///
    /// # Errors
    ///
    /// - `Error::Config`: empty credentials
    /// - `Error::Http`: the HTTP client could not be built
    pub fn with_api_base(
        credentials: CloudflareCredentials,
        api_base: impl Into<String>,
    ) -> Result<Self> {
        credentials.validate()?;

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            credentials,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Build a provider from its configuration block
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        match config {
            ProviderConfig::Cloudflare { credentials } => Self::new(credentials.clone()),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.api_base, path));

        match &self.credentials {
            CloudflareCredentials::Token(token) => builder.bearer_auth(token),
            CloudflareCredentials::GlobalKey { email, key } => builder
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", key),
        }
    }

    /// Send a request and unwrap the response envelope
    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<Option<T>> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::http(format!("Cloudflare request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read Cloudflare response: {}", e)))?;

        if !status.is_success() {
            return Err(status_error(status.as_u16(), &body));
        }

        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
            Error::provider(PROVIDER, format!("Failed to parse response: {}", e))
        })?;

        if !envelope.success {
            return Err(Error::provider(PROVIDER, describe(&envelope.errors)));
        }

        Ok(envelope.result)
    }

    async fn find_zone(&self, zone_name: &str) -> Result<Option<String>> {
        tracing::debug!(zone = %zone_name, "Looking up zone");

        let zones: Vec<Zone> = self
            .send(
                self.request(reqwest::Method::GET, "/zones")
                    .query(&[("name", zone_name)]),
            )
            .await?
            .unwrap_or_default();

        Ok(zones.into_iter().next().map(|z| z.id))
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// Walk from the full name towards its registrable domain until a zone
    /// answers: `a.b.example.com`, `b.example.com`, `example.com`
    async fn resolve_zone_id(&self, record_name: &str) -> Result<String> {
        let name = record_name.trim_end_matches('.');

        for candidate in parent_domains(name) {
            if let Some(zone_id) = self.find_zone(candidate).await? {
                tracing::debug!(record = %name, zone = %candidate, "Found zone");
                return Ok(zone_id);
            }
        }

        Err(Error::not_found(format!("No Cloudflare zone owns {}", name)))
    }

    async fn list_records(
        &self,
        zone_id: &str,
        record_type: RecordType,
        name: &str,
    ) -> Result<Vec<DnsRecord>> {
        let records: Vec<ApiRecord> = self
            .send(
                self.request(reqwest::Method::GET, &format!("/zones/{}/dns_records", zone_id))
                    .query(&[("type", record_type.as_str()), ("name", name)]),
            )
            .await?
            .unwrap_or_default();

        records
            .into_iter()
            .map(|r| {
                let record_type = match r.record_type.as_str() {
                    "A" => RecordType::A,
                    "AAAA" => RecordType::Aaaa,
                    other => {
                        return Err(Error::provider(
                            PROVIDER,
                            format!("Unexpected record type in listing: {}", other),
                        ));
                    }
                };

                Ok(DnsRecord {
                    id: r.id,
                    name: r.name,
                    record_type,
                    content: r.content,
                    ttl: r.ttl,
                    proxied: r.proxied,
                })
            })
            .collect()
    }

    async fn create_record(&self, zone_id: &str, record: &NewRecord) -> Result<()> {
        let body = CreateBody {
            record_type: record.record_type.as_str(),
            name: &record.name,
            content: &record.content,
            ttl: record.ttl,
            proxied: record.proxied,
        };

        self.send::<serde_json::Value>(
            self.request(reqwest::Method::POST, &format!("/zones/{}/dns_records", zone_id))
                .json(&body),
        )
        .await?;

        Ok(())
    }

    async fn update_record(&self, zone_id: &str, record_id: &str, update: &RecordUpdate) -> Result<()> {
        let body = UpdateBody {
            content: &update.content,
            ttl: update.ttl,
            proxied: update.proxied,
        };

        self.send::<serde_json::Value>(
            self.request(
                reqwest::Method::PATCH,
                &format!("/zones/{}/dns_records/{}", zone_id, record_id),
            )
            .json(&body),
        )
        .await?;

        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// `a.b.example.com` → `a.b.example.com`, `b.example.com`, `example.com`
fn parent_domains(name: &str) -> impl Iterator<Item = &str> {
    let labels = name.split('.').count();
    let mut rest = Some(name);

    std::iter::from_fn(move || {
        let current = rest?;
        rest = current.split_once('.').map(|(_, parent)| parent);
        Some(current)
    })
    .take(labels.saturating_sub(1).max(1))
}

/// Map an HTTP error status to a specific error
fn status_error(status: u16, body: &str) -> Error {
    let detail = serde_json::from_str::<Envelope<serde_json::Value>>(body)
        .map(|e| describe(&e.errors))
        .unwrap_or_else(|_| body.chars().take(200).collect());

    match status {
        401 | 403 => Error::auth(format!(
            "Invalid Cloudflare credentials or insufficient permissions ({}): {}",
            status, detail
        )),
        404 => Error::not_found(detail),
        429 => Error::rate_limited(format!("Cloudflare rate limit exceeded: {}", detail)),
        500..=599 => Error::provider(
            PROVIDER,
            format!("Cloudflare server error (transient) {}: {}", status, detail),
        ),
        _ => Error::provider(PROVIDER, format!("Unexpected status {}: {}", status, detail)),
    }
}

fn describe(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "no error details".to_string();
    }

    errors
        .iter()
        .map(|e| format!("{} ({})", e.message, e.code))
        .collect::<Vec<_>>()
        .join("; ")
}
