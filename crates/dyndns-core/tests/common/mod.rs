//! Test doubles and common utilities for pipeline contract tests
//!
//! The doubles record every call with its start and end instant so tests
//! can check both what was sent and whether calls overlapped.

#![allow(dead_code)]

use dyndns_core::error::{Error, Result};
use dyndns_core::traits::{DnsProvider, DnsRecord, GatewayClient, NewRecord, RecordType, RecordUpdate};
use dyndns_core::{EngineConfig, Ipv6Prefix};
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// One provider call as observed by [`RecordingProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    ResolveZone { name: String },
    List { zone: String, record_type: RecordType, name: String },
    Create { zone: String, record: NewRecord },
    Update { zone: String, record_id: String, update: RecordUpdate },
}

impl ProviderCall {
    /// True for create and update calls
    pub fn is_write(&self) -> bool {
        matches!(self, ProviderCall::Create { .. } | ProviderCall::Update { .. })
    }

    pub fn zone(&self) -> Option<&str> {
        match self {
            ProviderCall::ResolveZone { .. } => None,
            ProviderCall::List { zone, .. }
            | ProviderCall::Create { zone, .. }
            | ProviderCall::Update { zone, .. } => Some(zone),
        }
    }
}

/// A call with the interval it was in flight
#[derive(Debug, Clone)]
pub struct TimedCall {
    pub call: ProviderCall,
    pub started: Instant,
    pub finished: Instant,
}

#[derive(Default)]
struct ProviderState {
    zones: HashMap<String, String>,
    records: HashMap<(String, RecordType, String), Vec<DnsRecord>>,
    failing_zones: HashSet<String>,
    failing_writes: HashSet<String>,
    calls: Vec<TimedCall>,
    next_id: usize,
}

/// In-memory DnsProvider that records every call
///
/// Zones are matched by exact record name. Records created through the
/// provider become visible to later list calls.
#[derive(Clone, Default)]
pub struct RecordingProvider {
    state: Arc<Mutex<ProviderState>>,
    delay: Duration,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every call for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Map a record name to its zone
    pub fn with_zone(self, name: &str, zone: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .zones
            .insert(name.to_string(), zone.to_string());
        self
    }

    /// Seed an existing record
    pub fn with_record(self, zone: &str, record: DnsRecord) -> Self {
        self.state
            .lock()
            .unwrap()
            .records
            .entry((zone.to_string(), record.record_type, record.name.clone()))
            .or_default()
            .push(record);
        self
    }

    /// Make every list/create/update call against `zone` fail
    pub fn failing_zone(self, zone: &str) -> Self {
        self.state.lock().unwrap().failing_zones.insert(zone.to_string());
        self
    }

    /// Make updates of `record_id` fail
    pub fn failing_update(self, record_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_writes
            .insert(record_id.to_string());
        self
    }

    /// All calls so far, in order
    pub fn calls(&self) -> Vec<TimedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls excluding startup zone resolution
    pub fn record_calls(&self) -> Vec<ProviderCall> {
        self.calls()
            .into_iter()
            .map(|c| c.call)
            .filter(|c| !matches!(c, ProviderCall::ResolveZone { .. }))
            .collect()
    }

    /// Create and update calls only
    pub fn writes(&self) -> Vec<ProviderCall> {
        self.record_calls().into_iter().filter(|c| c.is_write()).collect()
    }

    /// Highest number of calls ever in flight at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Current records for a name
    pub fn records(&self, zone: &str, record_type: RecordType, name: &str) -> Vec<DnsRecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .get(&(zone.to_string(), record_type, name.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    async fn enter(&self) -> Instant {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let started = Instant::now();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        started
    }

    fn leave(&self, call: ProviderCall, started: Instant) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.state.lock().unwrap().calls.push(TimedCall {
            call,
            started,
            finished: Instant::now(),
        });
    }

    fn zone_fails(&self, zone: &str) -> bool {
        self.state.lock().unwrap().failing_zones.contains(zone)
    }
}

#[async_trait::async_trait]
impl DnsProvider for RecordingProvider {
    async fn resolve_zone_id(&self, record_name: &str) -> Result<String> {
        let started = self.enter().await;
        let zone = self.state.lock().unwrap().zones.get(record_name).cloned();
        self.leave(
            ProviderCall::ResolveZone {
                name: record_name.to_string(),
            },
            started,
        );
        zone.ok_or_else(|| Error::not_found(format!("zone for {}", record_name)))
    }

    async fn list_records(
        &self,
        zone_id: &str,
        record_type: RecordType,
        name: &str,
    ) -> Result<Vec<DnsRecord>> {
        let started = self.enter().await;
        let records = self.records(zone_id, record_type, name);
        self.leave(
            ProviderCall::List {
                zone: zone_id.to_string(),
                record_type,
                name: name.to_string(),
            },
            started,
        );

        if self.zone_fails(zone_id) {
            return Err(Error::rate_limited("simulated"));
        }
        Ok(records)
    }

    async fn create_record(&self, zone_id: &str, record: &NewRecord) -> Result<()> {
        let started = self.enter().await;
        self.leave(
            ProviderCall::Create {
                zone: zone_id.to_string(),
                record: record.clone(),
            },
            started,
        );

        if self.zone_fails(zone_id) {
            return Err(Error::auth("simulated"));
        }

        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("created-{}", state.next_id);
        state
            .records
            .entry((zone_id.to_string(), record.record_type, record.name.clone()))
            .or_default()
            .push(DnsRecord {
                id,
                name: record.name.clone(),
                record_type: record.record_type,
                content: record.content.clone(),
                ttl: record.ttl,
                proxied: record.proxied,
            });
        Ok(())
    }

    async fn update_record(&self, zone_id: &str, record_id: &str, update: &RecordUpdate) -> Result<()> {
        let started = self.enter().await;
        self.leave(
            ProviderCall::Update {
                zone: zone_id.to_string(),
                record_id: record_id.to_string(),
                update: update.clone(),
            },
            started,
        );

        let mut state = self.state.lock().unwrap();
        if state.failing_zones.contains(zone_id) || state.failing_writes.contains(record_id) {
            return Err(Error::provider("recording", "simulated write failure"));
        }

        for records in state.records.values_mut() {
            for record in records.iter_mut().filter(|r| r.id == record_id) {
                record.content = update.content.clone();
                record.ttl = update.ttl;
                record.proxied = update.proxied;
            }
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

/// A provider whose record calls never answer
pub struct HangingProvider;

#[async_trait::async_trait]
impl DnsProvider for HangingProvider {
    async fn resolve_zone_id(&self, _record_name: &str) -> Result<String> {
        Ok("zone".to_string())
    }

    async fn list_records(&self, _: &str, _: RecordType, _: &str) -> Result<Vec<DnsRecord>> {
        std::future::pending().await
    }

    async fn create_record(&self, _: &str, _: &NewRecord) -> Result<()> {
        std::future::pending().await
    }

    async fn update_record(&self, _: &str, _: &str, _: &RecordUpdate) -> Result<()> {
        std::future::pending().await
    }

    fn provider_name(&self) -> &'static str {
        "hanging"
    }
}

/// One scripted gateway answer
pub type Scripted<T> = std::result::Result<Option<T>, String>;

/// Gateway double answering from per-method scripts
///
/// Each call pops the next answer; the last answer repeats once the script
/// runs out.
#[derive(Clone, Default)]
pub struct ScriptedGateway {
    v4: Arc<Mutex<VecDeque<Scripted<Ipv4Addr>>>>,
    v6: Arc<Mutex<VecDeque<Scripted<Ipv6Addr>>>>,
    prefix: Arc<Mutex<VecDeque<Scripted<Ipv6Prefix>>>>,
    v4_calls: Arc<AtomicUsize>,
    v6_calls: Arc<AtomicUsize>,
    prefix_calls: Arc<AtomicUsize>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn v4(self, answers: impl IntoIterator<Item = Scripted<Ipv4Addr>>) -> Self {
        self.v4.lock().unwrap().extend(answers);
        self
    }

    pub fn v6(self, answers: impl IntoIterator<Item = Scripted<Ipv6Addr>>) -> Self {
        self.v6.lock().unwrap().extend(answers);
        self
    }

    pub fn prefix(self, answers: impl IntoIterator<Item = Scripted<Ipv6Prefix>>) -> Self {
        self.prefix.lock().unwrap().extend(answers);
        self
    }

    pub fn v4_calls(&self) -> usize {
        self.v4_calls.load(Ordering::SeqCst)
    }

    pub fn v6_calls(&self) -> usize {
        self.v6_calls.load(Ordering::SeqCst)
    }

    pub fn prefix_calls(&self) -> usize {
        self.prefix_calls.load(Ordering::SeqCst)
    }
}

fn next_answer<T: Clone>(script: &Mutex<VecDeque<Scripted<T>>>) -> Result<Option<T>> {
    let mut script = script.lock().unwrap();
    let answer = if script.len() > 1 {
        script.pop_front()
    } else {
        script.front().cloned()
    };

    match answer {
        Some(Ok(value)) => Ok(value),
        Some(Err(message)) => Err(Error::source(message)),
        None => Ok(None),
    }
}

#[async_trait::async_trait]
impl GatewayClient for ScriptedGateway {
    async fn ipv4(&self) -> Result<Option<Ipv4Addr>> {
        self.v4_calls.fetch_add(1, Ordering::SeqCst);
        next_answer(&self.v4)
    }

    async fn ipv6(&self) -> Result<Option<Ipv6Addr>> {
        self.v6_calls.fetch_add(1, Ordering::SeqCst);
        next_answer(&self.v6)
    }

    async fn ipv6_prefix(&self) -> Result<Option<Ipv6Prefix>> {
        self.prefix_calls.fetch_add(1, Ordering::SeqCst);
        next_answer(&self.prefix)
    }

    fn gateway_name(&self) -> &'static str {
        "scripted"
    }
}

/// Engine settings for tests
pub fn engine_config() -> EngineConfig {
    EngineConfig::default()
}

/// An existing record
pub fn record(id: &str, name: &str, record_type: RecordType, content: &str, ttl: u32, proxied: bool) -> DnsRecord {
    DnsRecord {
        id: id.to_string(),
        name: name.to_string(),
        record_type,
        content: content.to_string(),
        ttl,
        proxied,
    }
}

/// Let spawned tasks run until the queue and reconciler go idle
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
