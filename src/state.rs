//! Published dashboard state
//!
//! One writer per field group (activity, treasury, governance), any number of
//! readers. Each write replaces its group whole under the channel lock, so a
//! reader never sees a half-applied cycle. While the provider is marked
//! disconnected every group write is dropped, including one from a run that
//! was already in flight when the connection went away.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::activity::ActivityDigest;
use crate::governance::GovernanceSummary;
use crate::treasury::TreasurySummary;

/// Everything the dashboard shows
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub activity: ActivityDigest,
    /// Unix seconds of the last successful activity cycle
    pub activity_updated_at: Option<u64>,

    pub treasury: TreasurySummary,
    pub treasury_updated_at: Option<u64>,

    pub governance: GovernanceSummary,
    pub governance_updated_at: Option<u64>,

    /// Provider reachable
    pub connected: bool,
}

/// Write side of the published state
#[derive(Clone)]
pub struct StatePublisher {
    tx: Arc<watch::Sender<DashboardSnapshot>>,
}

/// Read side of the published state
#[derive(Clone)]
pub struct StateReader {
    rx: watch::Receiver<DashboardSnapshot>,
}

/// Create a connected publisher/reader pair
pub fn channel() -> (StatePublisher, StateReader) {
    let initial = DashboardSnapshot {
        connected: true,
        ..Default::default()
    };
    let (tx, rx) = watch::channel(initial);
    (StatePublisher { tx: Arc::new(tx) }, StateReader { rx })
}

impl StatePublisher {
    /// Returns whether the digest was published
    pub fn publish_activity(&self, digest: ActivityDigest, at: u64) -> bool {
        debug!(rows = digest.recent.len(), "Publishing activity");
        self.publish_connected("activity", |s| {
            s.activity = digest;
            s.activity_updated_at = Some(at);
        })
    }

    pub fn publish_treasury(&self, summary: TreasurySummary, at: u64) -> bool {
        debug!(tvl = %summary.total_value_locked, "Publishing treasury");
        self.publish_connected("treasury", |s| {
            s.treasury = summary;
            s.treasury_updated_at = Some(at);
        })
    }

    pub fn publish_governance(&self, summary: GovernanceSummary, at: u64) -> bool {
        debug!(headline = %summary.headline, "Publishing governance");
        self.publish_connected("governance", |s| {
            s.governance = summary;
            s.governance_updated_at = Some(at);
        })
    }

    fn publish_connected(&self, group: &str, apply: impl FnOnce(&mut DashboardSnapshot)) -> bool {
        let published = self.tx.send_if_modified(|s| {
            if !s.connected {
                return false;
            }
            apply(s);
            true
        });
        if !published {
            debug!(group, "Provider disconnected, dropping result");
        }
        published
    }

    pub fn set_connected(&self, connected: bool) {
        self.tx.send_if_modified(|s| {
            let changed = s.connected != connected;
            s.connected = connected;
            changed
        });
    }

    pub fn reader(&self) -> StateReader {
        StateReader {
            rx: self.tx.subscribe(),
        }
    }
}

impl StateReader {
    /// Clone of the current snapshot
    pub fn snapshot(&self) -> DashboardSnapshot {
        self.rx.borrow().clone()
    }

    /// Read a projection without cloning the whole snapshot
    pub fn with<R>(&self, f: impl FnOnce(&DashboardSnapshot) -> R) -> R {
        f(&self.rx.borrow())
    }

    /// Wait for the next publication; `false` once the publisher is gone
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::DeadlineSummary;

    #[test]
    fn test_groups_replace_independently() {
        let (publisher, reader) = channel();
        assert!(reader.snapshot().connected);
        assert_eq!(reader.snapshot().activity_updated_at, None);

        let governance = GovernanceSummary::new(
            Some(DeadlineSummary {
                proposal_id: 2,
                closes_at: 2_000,
            }),
            1_000,
        );
        publisher.publish_governance(governance.clone(), 1_000);
        publisher.publish_activity(ActivityDigest::default(), 1_001);

        let snapshot = reader.snapshot();
        assert_eq!(snapshot.governance, governance);
        assert_eq!(snapshot.governance_updated_at, Some(1_000));
        assert_eq!(snapshot.activity_updated_at, Some(1_001));
        assert_eq!(snapshot.treasury_updated_at, None);
    }

    #[test]
    fn test_writes_dropped_while_disconnected() {
        let (publisher, reader) = channel();
        publisher.set_connected(false);

        assert!(!publisher.publish_activity(ActivityDigest::default(), 5));
        assert!(!publisher.publish_governance(GovernanceSummary::default(), 5));
        let snapshot = reader.snapshot();
        assert_eq!(snapshot.activity_updated_at, None);
        assert_eq!(snapshot.governance_updated_at, None);

        publisher.set_connected(true);
        assert!(publisher.publish_activity(ActivityDigest::default(), 6));
        assert_eq!(reader.snapshot().activity_updated_at, Some(6));
    }

    #[tokio::test]
    async fn test_reader_observes_changes() {
        let (publisher, reader) = channel();
        let mut watcher = reader.clone();

        publisher.set_connected(false);
        assert!(watcher.changed().await);
        assert!(!watcher.with(|s| s.connected));

        drop(publisher);
        assert!(!watcher.changed().await);
    }
}
