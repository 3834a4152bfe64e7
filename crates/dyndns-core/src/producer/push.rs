//! Push listener
//!
//! Turns a dynamic-DNS report sent by the gateway into observed addresses
//! and hands them to the dispatch queue. The HTTP route and its credential
//! check live in the daemon; by the time a report reaches
//! [`PushListener::handle()`] it is authenticated.
//!
//! Reports are not deduplicated here. The reconciler's gate drops repeats.

use crate::address::{InterfaceId, Ipv6Prefix, ObservedAddress, synthesize};
use crate::dispatch::DispatchSender;
use crate::error::Result;
use crate::status::ProducerStatusHandle;
use serde::Deserialize;
use std::net::{Ipv4Addr, Ipv6Addr};
use tracing::{info, warn};

/// Address values of one push, as sent by the gateway
///
/// Any value may be absent or empty. `v6` is used when no local interface
/// identifier is configured, `prefix` (CIDR notation) otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PushReport {
    #[serde(default)]
    pub v4: Option<String>,
    #[serde(default)]
    pub v6: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
}

/// What one push produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushOutcome {
    /// Addresses handed to the reconciler, in enqueue order
    pub forwarded: Vec<ObservedAddress>,
    /// Names of supplied parameters that could not be parsed
    pub invalid: Vec<&'static str>,
}

/// Push producer
///
/// Cheap to clone; every inbound request gets its own copy.
#[derive(Debug, Clone)]
pub struct PushListener {
    queue: DispatchSender,
    interface_id: Option<InterfaceId>,
    status: ProducerStatusHandle,
}

impl PushListener {
    pub fn new(queue: DispatchSender, interface_id: Option<InterfaceId>) -> Self {
        Self {
            queue,
            interface_id,
            status: ProducerStatusHandle::new(),
        }
    }

    /// Handle to the push status
    pub fn status(&self) -> ProducerStatusHandle {
        self.status.clone()
    }

    /// Forward the addresses of an authenticated report
    ///
    /// IPv4 is enqueued before IPv6. Under the blocking queue policy this
    /// waits while the queue is full.
    ///
    /// # Returns
    ///
    /// - `Ok(PushOutcome)`: Every parsable value was enqueued
    /// - `Err(Error::QueueFull | Error::QueueClosed)`: A hand-off failed;
    ///   later values of the same report are not attempted
    pub async fn handle(&self, report: &PushReport) -> Result<PushOutcome> {
        info!("Received incoming dynamic DNS update");

        let mut outcome = PushOutcome::default();
        let mut addresses = Vec::with_capacity(2);

        if let Some(v4) = supplied(&report.v4) {
            match v4.parse::<Ipv4Addr>() {
                Ok(ip) => addresses.push(ObservedAddress::v4(ip)),
                Err(_) => {
                    warn!(v4 = %v4, "Ignoring unparsable IPv4 address");
                    outcome.invalid.push("v4");
                }
            }
        }

        match &self.interface_id {
            None => {
                if let Some(v6) = supplied(&report.v6) {
                    match v6.parse::<Ipv6Addr>() {
                        Ok(ip) => addresses.push(ObservedAddress::v6(ip)),
                        Err(_) => {
                            warn!(v6 = %v6, "Ignoring unparsable IPv6 address");
                            outcome.invalid.push("v6");
                        }
                    }
                }
            }
            Some(iid) => {
                if let Some(prefix) = supplied(&report.prefix) {
                    match prefix.parse::<Ipv6Prefix>() {
                        Ok(prefix) => {
                            let ip = synthesize(&prefix, iid);
                            info!(prefix = %prefix, ipv6 = %ip, "Synthesized address from pushed prefix");
                            addresses.push(ObservedAddress::v6(ip));
                        }
                        Err(e) => {
                            warn!(prefix = %prefix, error = %e, "Ignoring unparsable IPv6 prefix");
                            outcome.invalid.push("prefix");
                        }
                    }
                }
            }
        }

        for address in addresses {
            info!(ip = %address, family = %address.family(), "Forwarding update request");

            if let Err(e) = self.queue.enqueue(address).await {
                warn!(ip = %address, error = %e, "Could not hand off pushed address");
                self.status.record(false).await;
                return Err(e);
            }

            outcome.forwarded.push(address);
        }

        self.status.record(outcome.invalid.is_empty()).await;
        Ok(outcome)
    }

    /// Record a push turned away by the credential check
    pub async fn record_rejected(&self) {
        self.status.record(false).await;
    }
}

fn supplied(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
