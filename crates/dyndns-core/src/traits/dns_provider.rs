// # DNS Provider Trait
//
// Defines the interface for looking up and writing DNS records via a
// provider API.
//
// ## Implementations
//
// - Cloudflare: `dyndns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use dyndns_core::DnsProvider;
// use dyndns_core::traits::RecordType;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//
//     let zone = provider.resolve_zone_id("home.example.com").await?;
//     let records = provider
//         .list_records(&zone, RecordType::A, "home.example.com")
//         .await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// DNS record types handled by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// A record (IPv4)
    #[serde(rename = "A")]
    A,
    /// AAAA record (IPv6)
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl RecordType {
    /// Wire name of the record type
    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An existing record as listed by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    /// The record ID (provider-specific)
    pub id: String,
    /// The record name
    pub name: String,
    /// The record type
    pub record_type: RecordType,
    /// Current content (address text)
    pub content: String,
    /// Time-to-live in seconds
    pub ttl: u32,
    /// Whether the provider proxies traffic for this record
    pub proxied: bool,
}

/// Attributes of a record to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub record_type: RecordType,
    pub name: String,
    pub content: String,
    pub ttl: u32,
    pub proxied: bool,
}

/// Full replacement attributes for an existing record
///
/// Every field is always sent. Providers reset omitted fields to their
/// defaults, so unchanged values must be resupplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordUpdate {
    pub content: String,
    pub ttl: u32,
    pub proxied: bool,
}

/// Trait for DNS provider implementations
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Parse provider-specific responses
/// - ✅ Return success or failure
///
/// ## Forbidden Capabilities
/// - ❌ Spawn tasks or threads
/// - ❌ Implement retry logic or backoff (failures are surfaced as status)
/// - ❌ Decide whether an update is needed (owned by `Reconciler`)
/// - ❌ Cache state beyond a single request
///
/// Every method is a single-shot call; the `Reconciler` bounds each one
/// with its own timeout.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Find the identifier of the zone owning `record_name`
    ///
    /// Called once per distinct record name at startup.
    async fn resolve_zone_id(&self, record_name: &str) -> Result<String, crate::Error>;

    /// List records of `record_type` named `name` in `zone_id`
    async fn list_records(
        &self,
        zone_id: &str,
        record_type: RecordType,
        name: &str,
    ) -> Result<Vec<DnsRecord>, crate::Error>;

    /// Create a record in `zone_id`
    async fn create_record(&self, zone_id: &str, record: &NewRecord) -> Result<(), crate::Error>;

    /// Overwrite an existing record in `zone_id`
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        update: &RecordUpdate,
    ) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    ///
    /// A static string identifying the provider (e.g., "cloudflare")
    fn provider_name(&self) -> &'static str;
}
