// # dyndns-core
//
// Core library for keeping managed DNS records in step with the public
// addresses of a residential gateway.
//
// ## Architecture Overview
//
// - **address**: Family-tagged observed addresses and IPv6 prefix synthesis
// - **gate**: Per-family change detection (`ChangeGate`)
// - **dispatch**: Bounded multi-producer / single-consumer hand-off queue
// - **producer**: The gateway `Poller` and the `PushListener`
// - **engine**: The `Reconciler`, the single consumer that talks to the DNS provider
// - **status**: Last-attempt status surfaced to health checks
// - **metrics**: Prometheus timings of poll cycles
// - **traits**: `GatewayClient` and `DnsProvider`, implemented by adapter crates
//
// ## Design Principles
//
// 1. **Ownership by task**: every piece of mutable state belongs to exactly one task
// 2. **Message passing**: the dispatch queue is the only cross-task channel
// 3. **Serialized writes**: at most one reconciliation is in flight at any time
// 4. **Idempotency**: records already holding the desired address are left alone

pub mod address;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod gate;
pub mod metrics;
pub mod producer;
pub mod status;
pub mod traits;

// Re-export core types for convenience
pub use address::{Family, InterfaceId, Ipv6Prefix, ObservedAddress, synthesize};
pub use config::{DyndnsConfig, EngineConfig, RecordSets};
pub use dispatch::{BackpressurePolicy, DispatchReceiver, DispatchSender};
pub use engine::{Action, Reconciler};
pub use error::{Error, Result};
pub use gate::ChangeGate;
pub use metrics::PollMetrics;
pub use producer::{Poller, PushListener, PushOutcome, PushReport};
pub use status::{ProducerStatusHandle, StatusBoard, StatusReport, UpdateStatusBoard};
pub use traits::{DnsProvider, GatewayClient};
