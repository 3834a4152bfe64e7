//! Reconciliation engine
//!
//! The [`Reconciler`] is the single consumer of the dispatch queue. For every
//! address it receives it:
//!
//! 1. Passes it through its own [`ChangeGate`] (duplicates from several
//!    producers collapse here)
//! 2. Fans out to every [`Action`] of the same family, one after another
//! 3. Converges each action's records on the address with as few writes as
//!    possible
//! 4. Publishes the outcome of each attempt on its [`UpdateStatusBoard`]
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │   Poller    │──┐
//! └─────────────┘  │    ┌────────────────┐    ┌──────────────┐    ┌─────────────┐
//!                  ├───▶│ DispatchQueue  │───▶│  Reconciler  │───▶│ DnsProvider │
//! ┌─────────────┐  │    └────────────────┘    └──────────────┘    └─────────────┘
//! │PushListener │──┘                                 │
//! └─────────────┘                                    ▼
//!                                            ┌──────────────┐
//!                                            │ StatusBoard  │
//!                                            └──────────────┘
//! ```
//!
//! ## Known Limitation
//!
//! Failed provider calls are not retried. Because the consumer-side gate has
//! already recorded the address, a failed reconciliation of an address that
//! does not change again is only retried after the next genuine change (or
//! a restart).

use crate::address::{Family, ObservedAddress};
use crate::config::{EngineConfig, RecordSets};
use crate::dispatch::DispatchReceiver;
use crate::error::{Error, Result};
use crate::gate::ChangeGate;
use crate::status::UpdateStatusBoard;
use crate::traits::{DnsProvider, NewRecord, RecordUpdate};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

/// A configured reconciliation target
///
/// Built once at startup; never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// DNS record name (e.g., "home.example.com")
    pub record: String,
    /// Provider zone owning the record
    pub zone_id: String,
    /// Family of addresses this action tracks
    pub family: Family,
}

impl Action {
    /// Create an action
    pub fn new(record: impl Into<String>, zone_id: impl Into<String>, family: Family) -> Self {
        Self {
            record: record.into(),
            zone_id: zone_id.into(),
            family,
        }
    }
}

/// What one successful action reconciliation did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    /// No record existed; one was created
    Created,
    /// Records existed; some were rewritten, the rest already matched
    Existing {
        /// Records rewritten with the new address
        updated: usize,
        /// Records that already held the address
        unchanged: usize,
    },
}

/// Single consumer that converges DNS records on observed addresses
///
/// ## Lifecycle
///
/// 1. Build with [`Reconciler::initialize()`] (resolves zones) or
///    [`Reconciler::with_actions()`]
/// 2. Grab [`Reconciler::status()`] for the health-check responder
/// 3. Move into its own task with [`Reconciler::run()`]
///
/// ## Threading
///
/// The reconciler owns its gate and action list exclusively. Actions are
/// processed sequentially, so at most one provider call is in flight.
pub struct Reconciler {
    /// DNS provider for record lookups and writes
    provider: Arc<dyn DnsProvider>,

    /// Targets, IPv4 list first, then IPv6 list
    actions: Vec<Action>,

    /// Consumer-side last-observed state
    gate: ChangeGate,

    /// Per-action status, same order as `actions`
    status: UpdateStatusBoard,

    /// Deadline for each individual provider call
    call_timeout: Duration,

    /// TTL for newly created records
    record_ttl: u32,
}

impl Reconciler {
    /// Build the action list, resolving each distinct record's zone once
    ///
    /// # Returns
    ///
    /// - `Ok(Reconciler)`: Ready to run
    /// - `Err(Error::Config)`: A zone could not be resolved; reconciliation
    ///   cannot work without it
    pub async fn initialize(
        provider: Arc<dyn DnsProvider>,
        records: &RecordSets,
        config: &EngineConfig,
    ) -> Result<Self> {
        let call_timeout = config.provider_timeout();
        let mut zones: HashMap<&str, String> = HashMap::new();

        for record in records.ipv4.iter().chain(&records.ipv6) {
            if zones.contains_key(record.as_str()) {
                continue;
            }

            let zone_id = bounded(call_timeout, provider.resolve_zone_id(record))
                .await
                .map_err(|e| {
                    Error::config(format!("Failed to resolve zone for {}: {}", record, e))
                })?;

            debug!(record = %record, zone = %zone_id, "Resolved zone");
            zones.insert(record.as_str(), zone_id);
        }

        let mut actions = Vec::with_capacity(records.ipv4.len() + records.ipv6.len());
        for (list, family) in [(&records.ipv4, Family::V4), (&records.ipv6, Family::V6)] {
            for record in list {
                let zone_id = zones
                    .get(record.as_str())
                    .cloned()
                    .ok_or_else(|| Error::config(format!("No zone resolved for {}", record)))?;
                actions.push(Action::new(record.clone(), zone_id, family));
            }
        }

        info!(
            actions = actions.len(),
            provider = provider.provider_name(),
            "Reconciler initialized"
        );

        Ok(Self::with_actions(provider, actions, config))
    }

    /// Build from an already resolved action list
    pub fn with_actions(
        provider: Arc<dyn DnsProvider>,
        actions: Vec<Action>,
        config: &EngineConfig,
    ) -> Self {
        let status = UpdateStatusBoard::new(actions.iter().map(|a| (a.record.as_str(), a.family)));

        Self {
            provider,
            actions,
            gate: ChangeGate::new(),
            status,
            call_timeout: config.provider_timeout(),
            record_ttl: config.record_ttl,
        }
    }

    /// The configured actions
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Handle to the per-action status
    pub fn status(&self) -> UpdateStatusBoard {
        self.status.clone()
    }

    /// Consume the queue until every producer has gone away
    pub async fn run(mut self, queue: DispatchReceiver) {
        let mut stream = queue.into_stream();

        while let Some(address) = stream.next().await {
            self.process(address).await;
        }

        info!("Dispatch queue closed, reconciler stopped");
    }

    /// Consume the queue until it closes or `shutdown` fires
    ///
    /// An address already being reconciled is finished. Addresses still
    /// buffered in the queue are dropped.
    pub async fn run_with_shutdown(
        mut self,
        queue: DispatchReceiver,
        mut shutdown: tokio::sync::oneshot::Receiver<()>,
    ) {
        let mut stream = queue.into_stream();

        loop {
            tokio::select! {
                // Shutdown wins over buffered addresses
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown signal received, reconciler stopped");
                    break;
                }

                next = stream.next() => match next {
                    Some(address) => {
                        self.process(address).await;
                    }
                    None => {
                        info!("Dispatch queue closed, reconciler stopped");
                        break;
                    }
                },
            }
        }
    }

    /// Handle one address from the queue
    ///
    /// # Returns
    ///
    /// `false` if the consumer-side gate dropped the address as unchanged.
    pub async fn process(&mut self, address: ObservedAddress) -> bool {
        if !self.gate.should_propagate(&address) {
            debug!(ip = %address, "Address unchanged, skipping");
            return false;
        }

        info!(ip = %address, family = %address.family(), "Received update request");

        for (index, action) in self.actions.iter().enumerate() {
            if action.family != address.family() {
                continue;
            }

            let domain = format!("{}/{}", action.record, action.family);
            let succeeded = match self.reconcile(action, &address).await {
                Ok(Convergence::Created) => {
                    info!(domain = %domain, ip = %address, "Created DNS record");
                    true
                }
                Ok(Convergence::Existing { updated, unchanged }) => {
                    info!(domain = %domain, ip = %address, updated, unchanged, "DNS records converged");
                    true
                }
                Err(e) => {
                    error!(domain = %domain, ip = %address, error = %e, "Action failed");
                    false
                }
            };

            self.status.record(index, succeeded).await;
        }

        true
    }

    /// Converge one action's records on `address`
    ///
    /// Every record is attempted even if an earlier one fails; the first
    /// failure is returned.
    pub async fn reconcile(&self, action: &Action, address: &ObservedAddress) -> Result<Convergence> {
        let record_type = address.family().record_type();
        let content = address.ip().to_string();

        let records = self
            .call(self.provider.list_records(&action.zone_id, record_type, &action.record))
            .await
            .map_err(|e| Error::provider_query(format!("could not research DNS records: {}", e)))?;

        if records.is_empty() {
            let record = NewRecord {
                record_type,
                name: action.record.clone(),
                content,
                ttl: self.record_ttl,
                proxied: false,
            };

            self.call(self.provider.create_record(&action.zone_id, &record))
                .await
                .map_err(|e| Error::provider_write(format!("could not create DNS record: {}", e)))?;

            return Ok(Convergence::Created);
        }

        let mut updated = 0;
        let mut unchanged = 0;
        let mut first_error = None;

        for record in &records {
            if record.content == content {
                unchanged += 1;
                continue;
            }

            debug!(record = %action.record, record_id = %record.id, "Updating DNS record");

            let update = RecordUpdate {
                content: content.clone(),
                ttl: record.ttl,
                proxied: record.proxied,
            };

            match self
                .call(self.provider.update_record(&action.zone_id, &record.id, &update))
                .await
            {
                Ok(()) => updated += 1,
                Err(e) => {
                    warn!(record = %action.record, record_id = %record.id, error = %e, "Could not update DNS record");
                    first_error.get_or_insert(Error::provider_write(format!(
                        "could not update DNS record {}: {}",
                        record.id, e
                    )));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(Convergence::Existing { updated, unchanged }),
        }
    }

    async fn call<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        bounded(self.call_timeout, fut).await
    }
}

/// Run a provider call under its own deadline
async fn bounded<T>(limit: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(limit)),
    }
}
