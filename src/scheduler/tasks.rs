//! Refresh tasks run by the scheduler
//!
//! Each task owns its aggregator, a chain handle and the publisher for its
//! field group. A failed run publishes nothing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::TaskKind;
use crate::activity::ActivityAggregator;
use crate::chain::ChainReader;
use crate::error::Result;
use crate::governance::DeadlineSelector;
use crate::state::StatePublisher;
use crate::treasury::TreasuryScanner;
use crate::unix_now;

/// Wall clock in unix seconds
pub type Clock = fn() -> u64;

/// One schedulable refresh
#[async_trait]
pub trait RefreshTask: Send + Sync {
    fn kind(&self) -> TaskKind;

    /// Time between scheduled runs
    fn period(&self) -> Duration;

    /// Fetch, derive and publish. An error leaves the published state untouched.
    async fn run(&self) -> Result<()>;
}

pub struct ActivityTask {
    aggregator: ActivityAggregator,
    chain: Arc<dyn ChainReader>,
    publisher: StatePublisher,
    period: Duration,
    clock: Clock,
}

impl ActivityTask {
    pub fn new(
        aggregator: ActivityAggregator,
        chain: Arc<dyn ChainReader>,
        publisher: StatePublisher,
        period: Duration,
    ) -> Self {
        Self {
            aggregator,
            chain,
            publisher,
            period,
            clock: unix_now,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait]
impl RefreshTask for ActivityTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Activity
    }

    fn period(&self) -> Duration {
        self.period
    }

    async fn run(&self) -> Result<()> {
        let now = (self.clock)();
        let digest = self.aggregator.refresh(self.chain.as_ref(), now).await?;
        self.publisher.publish_activity(digest, now);
        Ok(())
    }
}

pub struct TreasuryTask {
    scanner: TreasuryScanner,
    chain: Arc<dyn ChainReader>,
    publisher: StatePublisher,
    period: Duration,
    clock: Clock,
}

impl TreasuryTask {
    pub fn new(
        scanner: TreasuryScanner,
        chain: Arc<dyn ChainReader>,
        publisher: StatePublisher,
        period: Duration,
    ) -> Self {
        Self {
            scanner,
            chain,
            publisher,
            period,
            clock: unix_now,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait]
impl RefreshTask for TreasuryTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Treasury
    }

    fn period(&self) -> Duration {
        self.period
    }

    async fn run(&self) -> Result<()> {
        let summary = self.scanner.refresh(self.chain.as_ref()).await?;
        self.publisher.publish_treasury(summary, (self.clock)());
        Ok(())
    }
}

pub struct GovernanceTask {
    selector: DeadlineSelector,
    chain: Arc<dyn ChainReader>,
    publisher: StatePublisher,
    period: Duration,
    clock: Clock,
}

impl GovernanceTask {
    pub fn new(
        selector: DeadlineSelector,
        chain: Arc<dyn ChainReader>,
        publisher: StatePublisher,
        period: Duration,
    ) -> Self {
        Self {
            selector,
            chain,
            publisher,
            period,
            clock: unix_now,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait]
impl RefreshTask for GovernanceTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Governance
    }

    fn period(&self) -> Duration {
        self.period
    }

    async fn run(&self) -> Result<()> {
        let now = (self.clock)();
        let summary = self.selector.refresh(self.chain.as_ref(), now).await;
        self.publisher.publish_governance(summary, now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityKind, ActivitySource};
    use crate::chain::InMemoryChain;
    use crate::state;

    fn fixed_now() -> u64 {
        1_000
    }

    #[tokio::test]
    async fn test_failed_run_keeps_published_state() {
        let (publisher, reader) = state::channel();
        let memory = Arc::new(InMemoryChain::new(10));
        let chain: Arc<dyn ChainReader> = memory.clone();
        let task = ActivityTask::new(
            ActivityAggregator::new(vec![ActivitySource::new(ActivityKind::Sold, None)]),
            chain,
            publisher,
            Duration::from_secs(30),
        )
        .with_clock(fixed_now);

        task.run().await.unwrap();
        let first = reader.snapshot();
        assert_eq!(first.activity_updated_at, Some(1_000));
        assert_eq!(first.activity.degraded_sources, vec![ActivityKind::Sold]);

        memory.fail_height(true).await;
        assert!(task.run().await.is_err());
        assert_eq!(reader.snapshot(), first);
    }

    #[tokio::test]
    async fn test_governance_publishes_headline() {
        let (publisher, reader) = state::channel();
        let task = GovernanceTask::new(
            DeadlineSelector::new(None),
            Arc::new(InMemoryChain::new(1)),
            publisher,
            Duration::from_secs(15),
        )
        .with_clock(fixed_now);

        task.run().await.unwrap();
        let snapshot = reader.snapshot();
        assert_eq!(snapshot.governance.headline, "No active proposals");
        assert_eq!(snapshot.governance_updated_at, Some(1_000));
    }
}
