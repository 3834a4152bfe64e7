//! Prometheus instruments for the gateway poller
//!
//! Each poll cycle is observed once under
//! `dyndns_fritzbox_polling_execution_seconds`, labelled `changed="true"`
//! when at least one address passed the change gate during the cycle.

use crate::error::{Error, Result};
use prometheus::{HistogramOpts, HistogramVec, Registry};
use std::time::Duration;

/// Poll cycle timings
#[derive(Debug, Clone)]
pub struct PollMetrics {
    executions: HistogramVec,
}

impl PollMetrics {
    /// Create the instruments and register them on `registry`
    pub fn register(registry: &Registry) -> Result<Self> {
        let opts = HistogramOpts::new("execution_seconds", "Duration of gateway poll cycles")
            .namespace("dyndns")
            .subsystem("fritzbox_polling");
        let executions = HistogramVec::new(opts, &["changed"])
            .map_err(|e| Error::config(format!("Invalid poll metric: {}", e)))?;

        registry
            .register(Box::new(executions.clone()))
            .map_err(|e| Error::config(format!("Failed to register poll metric: {}", e)))?;

        // Export both series from the start
        for changed in ["true", "false"] {
            executions.with_label_values(&[changed]);
        }

        Ok(Self { executions })
    }

    /// Record one finished poll cycle
    pub fn observe(&self, changed: bool, elapsed: Duration) {
        let label = if changed { "true" } else { "false" };
        self.executions
            .with_label_values(&[label])
            .observe(elapsed.as_secs_f64());
    }
}
