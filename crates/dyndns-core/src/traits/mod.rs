//! Collaborator traits for the pipeline
//!
//! The core never speaks a wire protocol itself. It consumes:
//!
//! - [`GatewayClient`]: Query the gateway for its public addresses
//! - [`DnsProvider`]: Look up, create and update records at the DNS provider

pub mod dns_provider;
pub mod gateway;

pub use dns_provider::{DnsProvider, DnsRecord, NewRecord, RecordType, RecordUpdate};
pub use gateway::GatewayClient;
