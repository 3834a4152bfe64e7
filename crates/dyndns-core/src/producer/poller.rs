//! Gateway poller
//!
//! Samples the gateway once immediately and then once per interval. Each
//! sample runs through the poller's own [`ChangeGate`] before it is
//! enqueued, so an unchanged address never reaches the dispatch queue.
//!
//! Only families with at least one configured record are polled. For IPv6
//! the poller either takes the gateway's own WAN address, or, when a local
//! interface identifier is configured, the routed prefix merged with that
//! identifier.
//!
//! With [`PollMetrics`] attached, every cycle's duration is observed and
//! labelled by whether an address changed.

use crate::address::{Family, InterfaceId, ObservedAddress, synthesize};
use crate::config::RecordSets;
use crate::dispatch::DispatchSender;
use crate::error::Result;
use crate::gate::ChangeGate;
use crate::metrics::PollMetrics;
use crate::status::ProducerStatusHandle;
use crate::traits::GatewayClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Result of one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// Addresses that passed the gate and were enqueued
    pub enqueued: Vec<ObservedAddress>,
    /// Whether every enabled family was queried and handed off successfully
    pub succeeded: bool,
    /// Whether any address passed the change gate
    pub changed: bool,
}

/// Periodic gateway producer
pub struct Poller {
    gateway: Arc<dyn GatewayClient>,
    poll_v4: bool,
    poll_v6: bool,
    interface_id: Option<InterfaceId>,
    queue: DispatchSender,
    gate: ChangeGate,
    status: ProducerStatusHandle,
    metrics: Option<PollMetrics>,
    interval: Duration,
}

impl Poller {
    /// Create a poller for the families that have configured records
    pub fn new(
        gateway: Arc<dyn GatewayClient>,
        records: &RecordSets,
        interface_id: Option<InterfaceId>,
        queue: DispatchSender,
        interval: Duration,
    ) -> Self {
        Self {
            gateway,
            poll_v4: !records.ipv4.is_empty(),
            poll_v6: !records.ipv6.is_empty(),
            interface_id,
            queue,
            gate: ChangeGate::new(),
            status: ProducerStatusHandle::new(),
            metrics: None,
            interval,
        }
    }

    /// Observe every poll cycle on `metrics`
    pub fn with_metrics(mut self, metrics: PollMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Handle to this poller's status
    pub fn status(&self) -> ProducerStatusHandle {
        self.status.clone()
    }

    /// Run one poll cycle and record its status
    pub async fn poll_once(&mut self) -> PollOutcome {
        debug!(gateway = self.gateway.gateway_name(), "Polling WAN addresses from gateway");

        let started = Instant::now();
        let mut outcome = PollOutcome {
            enqueued: Vec::new(),
            succeeded: true,
            changed: false,
        };

        if self.poll_v4 {
            let sample = self.gateway.ipv4().await.map(|ip| ip.map(ObservedAddress::v4));
            self.handle_sample(Family::V4, sample, &mut outcome).await;
        }

        if self.poll_v6 {
            let sample = self.sample_v6().await;
            self.handle_sample(Family::V6, sample, &mut outcome).await;
        }

        self.status.record(outcome.succeeded).await;
        if let Some(metrics) = &self.metrics {
            metrics.observe(outcome.changed, started.elapsed());
        }
        outcome
    }

    /// Poll forever: once now, then once per interval
    ///
    /// Ends only when the reconciler side of the queue is gone.
    pub async fn run(mut self) {
        info!(
            gateway = self.gateway.gateway_name(),
            interval = ?self.interval,
            ipv4 = self.poll_v4,
            ipv6 = self.poll_v6,
            "Starting gateway polling"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // First tick completes immediately
            ticker.tick().await;
            self.poll_once().await;

            if self.queue.is_closed() {
                info!("Dispatch queue closed, stopping gateway polling");
                break;
            }
        }
    }

    async fn sample_v6(&self) -> Result<Option<ObservedAddress>> {
        match &self.interface_id {
            None => Ok(self.gateway.ipv6().await?.map(ObservedAddress::v6)),
            Some(iid) => {
                let Some(prefix) = self.gateway.ipv6_prefix().await? else {
                    return Ok(None);
                };
                let address = synthesize(&prefix, iid);
                debug!(prefix = %prefix, ipv6 = %address, "Synthesized address from routed prefix");
                Ok(Some(ObservedAddress::v6(address)))
            }
        }
    }

    async fn handle_sample(
        &mut self,
        family: Family,
        sample: Result<Option<ObservedAddress>>,
        outcome: &mut PollOutcome,
    ) {
        let address = match sample {
            Ok(Some(address)) => address,
            Ok(None) => {
                debug!(family = %family, "Gateway reports no address");
                return;
            }
            Err(e) => {
                warn!(family = %family, error = %e, "Failed to poll WAN address from gateway");
                outcome.succeeded = false;
                return;
            }
        };

        if !self.gate.should_propagate(&address) {
            debug!(ip = %address, "WAN address unchanged");
            return;
        }

        info!(ip = %address, family = %family, "New WAN address found");
        outcome.changed = true;

        match self.queue.enqueue(address).await {
            Ok(()) => outcome.enqueued.push(address),
            Err(e) => {
                // Forget the address so the next tick offers it again
                self.gate.reset(family);
                warn!(ip = %address, error = %e, "Could not hand off address");
                outcome.succeeded = false;
            }
        }
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("gateway", &self.gateway.gateway_name())
            .field("poll_v4", &self.poll_v4)
            .field("poll_v6", &self.poll_v6)
            .field("interval", &self.interval)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}
