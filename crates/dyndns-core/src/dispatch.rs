//! Bounded hand-off queue between producers and the reconciler
//!
//! Any number of [`DispatchSender`] clones feed exactly one
//! [`DispatchReceiver`]. Items from one sender arrive in the order they were
//! sent; items from concurrent senders interleave arbitrarily.
//!
//! What happens on a full queue is an explicit [`BackpressurePolicy`]:
//! the default blocks the producer until the reconciler catches up, so no
//! address change is ever dropped silently.

use crate::address::ObservedAddress;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

/// Default queue capacity
pub const DEFAULT_CAPACITY: usize = 10;

/// Behaviour of `enqueue` when the queue is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackpressurePolicy {
    /// Wait until the consumer frees a slot
    #[default]
    Block,
    /// Fail immediately with [`Error::QueueFull`]
    Reject,
}

impl FromStr for BackpressurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "block" => Ok(Self::Block),
            "reject" => Ok(Self::Reject),
            other => Err(Error::config(format!(
                "Unknown queue policy '{}'. Valid policies: block, reject",
                other
            ))),
        }
    }
}

/// Create a dispatch queue
///
/// A capacity of zero is raised to one.
pub fn channel(capacity: usize, policy: BackpressurePolicy) -> (DispatchSender, DispatchReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (DispatchSender { tx, policy }, DispatchReceiver { rx })
}

/// Producer half of the dispatch queue
#[derive(Debug, Clone)]
pub struct DispatchSender {
    tx: mpsc::Sender<ObservedAddress>,
    policy: BackpressurePolicy,
}

impl DispatchSender {
    /// Hand an address to the reconciler
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The address is queued
    /// - `Err(Error::QueueFull)`: Queue full under [`BackpressurePolicy::Reject`]
    /// - `Err(Error::QueueClosed)`: The reconciler is gone
    pub async fn enqueue(&self, address: ObservedAddress) -> Result<()> {
        match self.policy {
            BackpressurePolicy::Block => self
                .tx
                .send(address)
                .await
                .map_err(|_| Error::QueueClosed),
            BackpressurePolicy::Reject => self.tx.try_send(address).map_err(|e| match e {
                TrySendError::Full(_) => Error::QueueFull,
                TrySendError::Closed(_) => Error::QueueClosed,
            }),
        }
    }

    /// True once the reconciler side has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half of the dispatch queue
#[derive(Debug)]
pub struct DispatchReceiver {
    rx: mpsc::Receiver<ObservedAddress>,
}

impl DispatchReceiver {
    /// Wait for the next address; `None` once every sender is dropped
    pub async fn recv(&mut self) -> Option<ObservedAddress> {
        self.rx.recv().await
    }

    /// Convert into a stream of addresses
    pub fn into_stream(self) -> ReceiverStream<ObservedAddress> {
        ReceiverStream::new(self.rx)
    }

    /// Drain and drop everything until all senders are gone
    ///
    /// Keeps producers from stalling when reconciliation is disabled.
    pub async fn discard_all(mut self) {
        while let Some(address) = self.rx.recv().await {
            debug!(ip = %address, family = %address.family(), "Reconciliation disabled, discarding address");
        }
    }
}
