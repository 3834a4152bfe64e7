// # Status Surface
//
// Last-attempt status published for health checks.
//
// Each handle is written by exactly one owner (a producer task or the
// reconciler) and read by the health-check responder. Status reflects only
// the most recent attempt, never a history.
//
// ## JSON Format
//
// ```json
// {
//   "push": { "last": "2025-01-09T12:00:00Z", "succeeded": true },
//   "poll": null,
//   "updates": [
//     { "last": null, "domain": "home.example.com", "ipVersion": 4, "succeeded": true }
//   ]
// }
// ```

use crate::address::Family;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Aggregate status of one producer (poller or push listener)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProducerStatus {
    /// Time of the last attempt, `None` before the first one
    pub last: Option<DateTime<Utc>>,
    /// Whether the last attempt succeeded
    pub succeeded: bool,
}

impl Default for ProducerStatus {
    fn default() -> Self {
        Self {
            last: None,
            succeeded: true,
        }
    }
}

/// Status of one reconciliation target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatus {
    /// Time of the last attempt, `None` before the first one
    pub last: Option<DateTime<Utc>>,
    /// DNS record name
    pub domain: String,
    /// IP version (4 or 6)
    pub ip_version: u8,
    /// Whether the last attempt succeeded
    pub succeeded: bool,
}

/// Shared handle to one producer's status
#[derive(Debug, Clone, Default)]
pub struct ProducerStatusHandle {
    inner: Arc<RwLock<ProducerStatus>>,
}

impl ProducerStatusHandle {
    /// Create a handle with no attempt recorded yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of an attempt made now
    pub async fn record(&self, succeeded: bool) {
        let mut guard = self.inner.write().await;
        guard.last = Some(Utc::now());
        guard.succeeded = succeeded;
    }

    /// Copy of the current status
    pub async fn snapshot(&self) -> ProducerStatus {
        self.inner.read().await.clone()
    }
}

/// Shared per-target status, indexed like the reconciler's action list
#[derive(Debug, Clone, Default)]
pub struct UpdateStatusBoard {
    inner: Arc<RwLock<Vec<UpdateStatus>>>,
}

impl UpdateStatusBoard {
    /// Create a board with one healthy, never-attempted entry per target
    pub fn new<'a>(targets: impl IntoIterator<Item = (&'a str, Family)>) -> Self {
        let entries = targets
            .into_iter()
            .map(|(domain, family)| UpdateStatus {
                last: None,
                domain: domain.to_string(),
                ip_version: family.version(),
                succeeded: true,
            })
            .collect();

        Self {
            inner: Arc::new(RwLock::new(entries)),
        }
    }

    /// Record the outcome of an attempt on target `index`
    pub async fn record(&self, index: usize, succeeded: bool) {
        let mut guard = self.inner.write().await;
        if let Some(entry) = guard.get_mut(index) {
            entry.last = Some(Utc::now());
            entry.succeeded = succeeded;
        }
    }

    /// Copy of every entry
    pub async fn snapshot(&self) -> Vec<UpdateStatus> {
        self.inner.read().await.clone()
    }
}

/// Everything the health-check responder needs
///
/// Components that are disabled are `None`.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    pub push: Option<ProducerStatusHandle>,
    pub poll: Option<ProducerStatusHandle>,
    pub updates: Option<UpdateStatusBoard>,
}

impl StatusBoard {
    /// Take a consistent-enough snapshot of all components
    pub async fn report(&self) -> StatusReport {
        let push = match &self.push {
            Some(handle) => Some(handle.snapshot().await),
            None => None,
        };
        let poll = match &self.poll {
            Some(handle) => Some(handle.snapshot().await),
            None => None,
        };
        let updates = match &self.updates {
            Some(board) => board.snapshot().await,
            None => Vec::new(),
        };

        StatusReport {
            push,
            poll,
            updates,
        }
    }
}

/// Serializable status snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub push: Option<ProducerStatus>,
    pub poll: Option<ProducerStatus>,
    pub updates: Vec<UpdateStatus>,
}

impl StatusReport {
    /// Healthy when no enabled component's last attempt failed
    pub fn is_healthy(&self) -> bool {
        let producer_ok = |status: &Option<ProducerStatus>| {
            status.as_ref().is_none_or(|s| s.succeeded)
        };

        producer_ok(&self.poll)
            && producer_ok(&self.push)
            && self.updates.iter().all(|u| u.succeeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_producer_status_records_last_attempt() {
        let handle = ProducerStatusHandle::new();
        assert_eq!(handle.snapshot().await, ProducerStatus::default());

        handle.record(false).await;
        let status = handle.snapshot().await;
        assert!(!status.succeeded);
        assert!(status.last.is_some());

        handle.record(true).await;
        assert!(handle.snapshot().await.succeeded);
    }

    #[tokio::test]
    async fn test_board_health() {
        let updates = UpdateStatusBoard::new([("a.example.com", Family::V4), ("b.example.com", Family::V6)]);
        let poll = ProducerStatusHandle::new();
        let board = StatusBoard {
            push: None,
            poll: Some(poll.clone()),
            updates: Some(updates.clone()),
        };

        assert!(board.report().await.is_healthy());

        updates.record(1, false).await;
        let report = board.report().await;
        assert!(!report.is_healthy());
        assert!(report.updates[0].succeeded);
        assert_eq!(report.updates[1].ip_version, 6);

        updates.record(1, true).await;
        poll.record(false).await;
        assert!(!board.report().await.is_healthy());
    }

    #[tokio::test]
    async fn test_report_json_shape() {
        let board = StatusBoard {
            push: Some(ProducerStatusHandle::new()),
            poll: None,
            updates: Some(UpdateStatusBoard::new([("a.example.com", Family::V4)])),
        };

        let json = serde_json::to_value(board.report().await).unwrap();
        assert_eq!(json["poll"], serde_json::Value::Null);
        assert_eq!(json["push"]["succeeded"], true);
        assert_eq!(json["updates"][0]["domain"], "a.example.com");
        assert_eq!(json["updates"][0]["ipVersion"], 4);
    }
}
