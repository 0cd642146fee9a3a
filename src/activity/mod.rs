//! Recent activity and leaderboard aggregation
//!
//! Handles:
//! - Normalizing BoxOpened / Staked / Harvested / ListingSold logs into one record type
//! - Per-actor scoring over the scanned window
//! - Merging independently fetched sources into one published digest

pub mod aggregator;
pub mod normalizer;
pub mod score;

use std::fmt;

use alloy_primitives::{Address, B256};
use chrono::{TimeZone, Utc};
use serde::Serialize;

use crate::amount::TokenAmount;

pub use aggregator::{ActivityAggregator, ActivityDigest, ActivitySource};
pub use normalizer::{EventNormalizer, NormalizerRegistry};
pub use score::{ScoreAccumulator, ScoreEntry};

/// What an actor did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Opened loot boxes and won a trophy
    BoxOpened,
    /// Staked ARC into the badge contract
    Staked,
    /// Harvested staking rewards
    Harvested,
    /// Bought a marketplace listing
    Sold,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 4] = [
        ActivityKind::BoxOpened,
        ActivityKind::Staked,
        ActivityKind::Harvested,
        ActivityKind::Sold,
    ];

    /// Log name emitted by the source contract
    pub fn event_name(&self) -> &'static str {
        match self {
            ActivityKind::BoxOpened => "BoxOpened",
            ActivityKind::Staked => "Staked",
            ActivityKind::Harvested => "Harvested",
            ActivityKind::Sold => "ListingSold",
        }
    }

    /// Contract that emits this kind
    pub fn contract_name(&self) -> &'static str {
        match self {
            ActivityKind::BoxOpened => "loot_box",
            ActivityKind::Staked | ActivityKind::Harvested => "stake_badge",
            ActivityKind::Sold => "trade_hub",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

/// One normalized on-chain action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityRecord {
    /// Who performed the action
    pub actor: Address,
    pub kind: ActivityKind,
    /// Box count for `BoxOpened`, ARC for everything else
    pub amount: TokenAmount,
    /// Trophy id won, for `BoxOpened`
    pub subject_id: Option<u64>,
    pub tx_ref: Option<B256>,
    /// Unix seconds
    pub timestamp: u64,
    /// Leaderboard contribution of this action
    pub score: TokenAmount,
    /// Human-readable line, relative to the viewing account
    pub summary: String,
}

impl ActivityRecord {
    /// Timestamp rendered for display
    pub fn pretty_time(&self) -> String {
        Utc.timestamp_opt(self.timestamp as i64, 0)
            .single()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| self.timestamp.to_string())
    }
}

/// Lowercase `0x` hex form of an address
pub fn address_hex(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

/// `0x1234...abcd`
pub fn short_address(address: &Address) -> String {
    let full = address_hex(address);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

/// "You" when the viewer performed the action, otherwise the short address
pub fn actor_label(actor: &Address, viewer: Option<&Address>) -> String {
    match viewer {
        Some(viewer) if viewer == actor => "You".to_string(),
        _ => short_address(actor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_address() {
        let addr: Address = "0xAbCdEf0000000000000000000000000000001234".parse().unwrap();
        assert_eq!(short_address(&addr), "0xabcd...1234");
    }

    #[test]
    fn test_actor_label_is_case_insensitive() {
        let actor: Address = "0x00000000000000000000000000000000000000aa".parse().unwrap();
        let viewer: Address = "0x00000000000000000000000000000000000000AA".parse().unwrap();
        assert_eq!(actor_label(&actor, Some(&viewer)), "You");
        assert_eq!(actor_label(&actor, None), "0x0000...00aa");
    }

    #[test]
    fn test_pretty_time() {
        let record = ActivityRecord {
            actor: Address::ZERO,
            kind: ActivityKind::Staked,
            amount: TokenAmount::ZERO,
            subject_id: None,
            tx_ref: None,
            timestamp: 0,
            score: TokenAmount::ZERO,
            summary: String::new(),
        };
        assert_eq!(record.pretty_time(), "1970-01-01 00:00:00 UTC");
    }
}
