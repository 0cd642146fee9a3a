//! Activity aggregator - one refresh cycle over every configured source
//!
//! Sources are fetched concurrently and tolerate each other's failure. Merge,
//! scoring and sorting run sequentially once every fetch has returned, and
//! the result is handed back as one digest for atomic publication.

use std::collections::HashSet;

use alloy_primitives::Address;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::normalizer::{normalize_events, NormalizeContext, NormalizerRegistry};
use super::score::{accumulate, ScoreEntry};
use super::{ActivityKind, ActivityRecord};
use crate::chain::ChainReader;
use crate::config::Config;
use crate::error::{ConfigurationError, Error, ReadError};
use crate::range::{compute_range, BlockRange, ACTIVITY_LOOKBACK};

/// Default number of recent activity rows
pub const RECENT_LIMIT: usize = 20;

/// Default number of leaderboard rows
pub const LEADERBOARD_LIMIT: usize = 10;

/// One polled event feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivitySource {
    pub kind: ActivityKind,
    /// Emitting contract; `None` leaves the source permanently empty
    pub address: Option<Address>,
}

impl ActivitySource {
    pub fn new(kind: ActivityKind, address: Option<Address>) -> Self {
        Self { kind, address }
    }
}

/// Published result of one activity cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivityDigest {
    /// Range scanned, `None` before the first cycle
    pub range: Option<BlockRange>,
    /// Most recent actions, newest first
    pub recent: Vec<ActivityRecord>,
    /// Highest scores over the whole window
    pub leaderboard: Vec<ScoreEntry>,
    /// Distinct actors in `recent`
    pub active_players: usize,
    /// Sources that contributed nothing because they failed
    pub degraded_sources: Vec<ActivityKind>,
}

/// Aggregates recent activity and the leaderboard
pub struct ActivityAggregator {
    sources: Vec<ActivitySource>,
    registry: NormalizerRegistry,
    lookback: u64,
    recent_limit: usize,
    leaderboard_limit: usize,
    viewer: Option<Address>,
    currency: String,
}

impl ActivityAggregator {
    pub fn new(sources: Vec<ActivitySource>) -> Self {
        Self {
            sources,
            registry: NormalizerRegistry::standard(),
            lookback: ACTIVITY_LOOKBACK,
            recent_limit: RECENT_LIMIT,
            leaderboard_limit: LEADERBOARD_LIMIT,
            viewer: None,
            currency: "ARC".to_string(),
        }
    }

    /// Sources, limits and viewer from the node configuration
    pub fn from_config(config: &Config) -> Self {
        let contracts = &config.contracts;
        let sources = vec![
            ActivitySource::new(ActivityKind::BoxOpened, contracts.loot_box),
            ActivitySource::new(ActivityKind::Staked, contracts.stake_badge),
            ActivitySource::new(ActivityKind::Harvested, contracts.stake_badge),
            ActivitySource::new(ActivityKind::Sold, contracts.trade_hub),
        ];

        Self::new(sources)
            .with_lookback(config.scan.activity_lookback)
            .with_limits(config.display.recent_limit, config.display.leaderboard_limit)
            .with_viewer(config.display.viewer)
            .with_currency(&config.display.currency)
    }

    pub fn with_registry(mut self, registry: NormalizerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_lookback(mut self, lookback: u64) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn with_limits(mut self, recent: usize, leaderboard: usize) -> Self {
        self.recent_limit = recent;
        self.leaderboard_limit = leaderboard;
        self
    }

    pub fn with_viewer(mut self, viewer: Option<Address>) -> Self {
        self.viewer = viewer;
        self
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = currency.to_string();
        self
    }

    pub fn sources(&self) -> &[ActivitySource] {
        &self.sources
    }

    /// Run one cycle.
    ///
    /// Only a failure to read the chain height fails the cycle; every other
    /// failure degrades the affected source to an empty contribution.
    pub async fn refresh(
        &self,
        chain: &dyn ChainReader,
        now: u64,
    ) -> Result<ActivityDigest, ReadError> {
        let height = chain.current_height().await?;
        let range = compute_range(height, self.lookback, None);
        let ctx = NormalizeContext {
            viewer: self.viewer,
            currency: &self.currency,
        };

        let fetches = self
            .sources
            .iter()
            .map(|source| self.fetch_source(*source, chain, range, &ctx, now));
        let results = join_all(fetches).await;

        let mut merged = Vec::new();
        let mut degraded_sources = Vec::new();
        for (source, result) in self.sources.iter().zip(results) {
            match result {
                Ok(records) => {
                    debug!(source = %source.kind, count = records.len(), "Source fetched");
                    merged.extend(records);
                }
                Err(e) => {
                    warn!(source = %source.kind, error = %e, "Activity source skipped");
                    degraded_sources.push(source.kind);
                }
            }
        }

        // Stable: equal timestamps keep source order, newest emission first.
        merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let leaderboard = accumulate(&merged).leaderboard(self.leaderboard_limit);
        let total = merged.len();
        merged.truncate(self.recent_limit);
        let active_players = merged
            .iter()
            .map(|r| r.actor)
            .collect::<HashSet<_>>()
            .len();

        info!(
            from = range.from,
            to = range.to,
            events = total,
            active_players,
            degraded = degraded_sources.len(),
            "Activity refreshed"
        );

        Ok(ActivityDigest {
            range: Some(range),
            recent: merged,
            leaderboard,
            active_players,
            degraded_sources,
        })
    }

    async fn fetch_source(
        &self,
        source: ActivitySource,
        chain: &dyn ChainReader,
        range: BlockRange,
        ctx: &NormalizeContext<'_>,
        now: u64,
    ) -> Result<Vec<ActivityRecord>, Error> {
        let address = source
            .address
            .ok_or(ConfigurationError::MissingAddress(source.kind.contract_name()))?;
        let normalizer = self
            .registry
            .get(source.kind)
            .ok_or(ConfigurationError::MissingNormalizer(source.kind.event_name()))?;

        let events = chain
            .logs_in_range(address, source.kind.event_name(), range)
            .await?;

        Ok(normalize_events(normalizer, &events, chain, ctx, now).await)
    }
}
