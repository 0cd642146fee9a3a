//! Leaderboard scoring

use std::collections::BTreeMap;

use alloy_primitives::Address;
use serde::Serialize;

use super::ActivityRecord;
use crate::amount::TokenAmount;

/// One leaderboard row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreEntry {
    pub actor: Address,
    pub score: TokenAmount,
}

/// Folds records into per-actor totals.
///
/// Totals are rebuilt from scratch every cycle, so a missed or duplicated
/// event only skews the window it was seen in.
#[derive(Debug, Default)]
pub struct ScoreAccumulator {
    scores: BTreeMap<Address, TokenAmount>,
}

impl ScoreAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: &ActivityRecord) {
        let total = self.scores.entry(record.actor).or_default();
        *total = total.saturating_add(record.score);
    }

    pub fn scores(&self) -> &BTreeMap<Address, TokenAmount> {
        &self.scores
    }

    /// Top `limit` actors, highest score first; equal scores by address
    pub fn leaderboard(&self, limit: usize) -> Vec<ScoreEntry> {
        let mut entries: Vec<ScoreEntry> = self
            .scores
            .iter()
            .map(|(actor, score)| ScoreEntry {
                actor: *actor,
                score: *score,
            })
            .collect();
        entries.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.actor.cmp(&b.actor)));
        entries.truncate(limit);
        entries
    }
}

/// Per-actor totals over `records`
pub fn accumulate<'a, I>(records: I) -> ScoreAccumulator
where
    I: IntoIterator<Item = &'a ActivityRecord>,
{
    let mut acc = ScoreAccumulator::new();
    for record in records {
        acc.add(record);
    }
    acc
}
