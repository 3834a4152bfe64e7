// # Gateway Client Trait
//
// Defines the interface for asking the residential gateway which public
// addresses it currently holds.
//
// ## Implementations
//
// - FRITZ!Box (TR-064 / UPnP SOAP): `dyndns-gateway-fritzbox` crate
//
// ## Usage
//
// ```rust,ignore
// use dyndns_core::GatewayClient;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let gateway = /* GatewayClient implementation */;
//
//     if let Some(ip) = gateway.ipv4().await? {
//         println!("WAN IPv4: {}", ip);
//     }
//
//     Ok(())
// }
// ```

use crate::address::Ipv6Prefix;
use async_trait::async_trait;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Trait for gateway client implementations
///
/// Each method performs one remote call and returns one of three result
/// shapes. `Ok(None)` means the gateway answered but has no address of that
/// kind (WAN down, or IPv6 disabled, signalled by a zero lifetime).
///
/// # Trust Level: Semi-Trusted
///
/// ## Allowed Capabilities
/// - ✅ Perform requests against the gateway's management endpoint
/// - ✅ Parse the gateway's response format
///
/// ## Forbidden Capabilities
/// - ❌ Decide whether an address changed (owned by `ChangeGate`)
/// - ❌ Retry or sleep (the poll interval is the retry)
/// - ❌ Spawn tasks
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Current WAN IPv4 address
    async fn ipv4(&self) -> Result<Option<Ipv4Addr>, crate::Error>;

    /// Current WAN IPv6 address of the gateway itself
    async fn ipv6(&self) -> Result<Option<Ipv6Addr>, crate::Error>;

    /// Currently routed (delegated) IPv6 prefix
    async fn ipv6_prefix(&self) -> Result<Option<Ipv6Prefix>, crate::Error>;

    /// Get the gateway name (for logging/debugging)
    fn gateway_name(&self) -> &'static str;
}
