//! Per-kind event normalizers
//!
//! Each source kind has its own normalizer that knows the argument layout of
//! its log. The registry dispatches by [`ActivityKind`], so one kind never
//! reads another kind's arguments.

use std::collections::HashMap;

use alloy_primitives::Address;
use tracing::{debug, warn};

use super::{actor_label, ActivityKind, ActivityRecord};
use crate::amount::TokenAmount;
use crate::chain::{ChainReader, FieldValue, RawEvent};

/// Display parameters shared by every normalizer in a cycle
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    /// Locally connected account, rendered as "You"
    pub viewer: Option<Address>,
    /// Currency symbol for ARC amounts
    pub currency: &'a str,
}

/// Converts one raw log of a single kind into an [`ActivityRecord`]
pub trait EventNormalizer: Send + Sync {
    fn kind(&self) -> ActivityKind;

    /// Primary actor; `None` drops the event
    fn actor(&self, raw: &RawEvent) -> Option<Address> {
        raw.arg(0).and_then(FieldValue::as_address)
    }

    /// Quantity carried by the event
    fn amount(&self, raw: &RawEvent) -> TokenAmount;

    fn subject_id(&self, _raw: &RawEvent) -> Option<u64> {
        None
    }

    /// Timestamp carried in the log itself, if any
    fn embedded_timestamp(&self, _raw: &RawEvent) -> Option<u64> {
        None
    }

    fn score_contribution(&self, amount: TokenAmount) -> TokenAmount;

    fn describe(
        &self,
        who: &str,
        amount: TokenAmount,
        subject_id: Option<u64>,
        currency: &str,
    ) -> String;

    /// Build the record once the timestamp is known.
    fn normalize(
        &self,
        raw: &RawEvent,
        ctx: &NormalizeContext<'_>,
        timestamp: u64,
    ) -> Option<ActivityRecord> {
        let actor = self.actor(raw)?;
        let amount = self.amount(raw);
        let subject_id = self.subject_id(raw);
        let who = actor_label(&actor, ctx.viewer.as_ref());

        Some(ActivityRecord {
            actor,
            kind: self.kind(),
            amount,
            subject_id,
            tx_ref: raw.tx_hash,
            timestamp,
            score: self.score_contribution(amount),
            summary: self.describe(&who, amount, subject_id, ctx.currency),
        })
    }
}

fn token_arg(raw: &RawEvent, index: usize) -> TokenAmount {
    raw.arg(index)
        .and_then(FieldValue::as_uint)
        .map(TokenAmount::from_u256)
        .unwrap_or(TokenAmount::ZERO)
}

/// `BoxOpened(user, trophyId, timestamp, boxCount)`
pub struct BoxOpenedNormalizer;

impl EventNormalizer for BoxOpenedNormalizer {
    fn kind(&self) -> ActivityKind {
        ActivityKind::BoxOpened
    }

    fn amount(&self, raw: &RawEvent) -> TokenAmount {
        let count = raw
            .arg(3)
            .and_then(FieldValue::as_u64_saturating)
            .unwrap_or(1);
        TokenAmount::from_whole(count)
    }

    fn subject_id(&self, raw: &RawEvent) -> Option<u64> {
        raw.arg(1).and_then(FieldValue::as_u64)
    }

    fn embedded_timestamp(&self, raw: &RawEvent) -> Option<u64> {
        raw.arg(2).and_then(FieldValue::as_u64).filter(|ts| *ts > 0)
    }

    fn score_contribution(&self, amount: TokenAmount) -> TokenAmount {
        amount
    }

    fn describe(
        &self,
        who: &str,
        amount: TokenAmount,
        subject_id: Option<u64>,
        _currency: &str,
    ) -> String {
        let trophy = subject_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "?".to_string());
        format!(
            "{} opened {} box(es) and won trophy #{}",
            who,
            amount.whole(),
            trophy
        )
    }
}

/// `Staked(user, amount)`
pub struct StakedNormalizer;

impl EventNormalizer for StakedNormalizer {
    fn kind(&self) -> ActivityKind {
        ActivityKind::Staked
    }

    fn amount(&self, raw: &RawEvent) -> TokenAmount {
        token_arg(raw, 1)
    }

    fn score_contribution(&self, amount: TokenAmount) -> TokenAmount {
        amount.tenth()
    }

    fn describe(&self, who: &str, amount: TokenAmount, _: Option<u64>, currency: &str) -> String {
        format!("{} staked {} {}", who, amount, currency)
    }
}

/// `Harvested(user, amount)`
pub struct HarvestedNormalizer;

impl EventNormalizer for HarvestedNormalizer {
    fn kind(&self) -> ActivityKind {
        ActivityKind::Harvested
    }

    fn amount(&self, raw: &RawEvent) -> TokenAmount {
        token_arg(raw, 1)
    }

    fn score_contribution(&self, amount: TokenAmount) -> TokenAmount {
        amount
    }

    fn describe(&self, who: &str, amount: TokenAmount, _: Option<u64>, currency: &str) -> String {
        format!("{} harvested {} {}", who, amount, currency)
    }
}

/// `ListingSold(buyer, listingId, amount, price)`
pub struct SoldNormalizer;

impl EventNormalizer for SoldNormalizer {
    fn kind(&self) -> ActivityKind {
        ActivityKind::Sold
    }

    fn amount(&self, raw: &RawEvent) -> TokenAmount {
        token_arg(raw, 3)
    }

    fn score_contribution(&self, amount: TokenAmount) -> TokenAmount {
        amount
    }

    fn describe(&self, who: &str, amount: TokenAmount, _: Option<u64>, currency: &str) -> String {
        format!("{} bought item for {} {}", who, amount, currency)
    }
}

/// Normalizers keyed by kind
pub struct NormalizerRegistry {
    normalizers: HashMap<ActivityKind, Box<dyn EventNormalizer>>,
}

impl NormalizerRegistry {
    pub fn new() -> Self {
        Self {
            normalizers: HashMap::new(),
        }
    }

    /// Registry with every built-in kind
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(BoxOpenedNormalizer));
        registry.register(Box::new(StakedNormalizer));
        registry.register(Box::new(HarvestedNormalizer));
        registry.register(Box::new(SoldNormalizer));
        registry
    }

    pub fn register(&mut self, normalizer: Box<dyn EventNormalizer>) {
        self.normalizers.insert(normalizer.kind(), normalizer);
    }

    pub fn get(&self, kind: ActivityKind) -> Option<&dyn EventNormalizer> {
        self.normalizers.get(&kind).map(|n| n.as_ref())
    }
}

impl Default for NormalizerRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Block timestamp lookups for one source in one cycle
pub struct BlockClock<'a> {
    chain: &'a dyn ChainReader,
    now: u64,
    cache: HashMap<u64, u64>,
}

impl<'a> BlockClock<'a> {
    pub fn new(chain: &'a dyn ChainReader, now: u64) -> Self {
        Self {
            chain,
            now,
            cache: HashMap::new(),
        }
    }

    /// Timestamp of `block`, or the wall clock if the read fails
    pub async fn resolve(&mut self, block: u64) -> u64 {
        if let Some(ts) = self.cache.get(&block) {
            return *ts;
        }
        match self.chain.block_timestamp(block).await {
            Ok(ts) => {
                self.cache.insert(block, ts);
                ts
            }
            Err(e) => {
                warn!(block, error = %e, "Block timestamp unavailable, using wall clock");
                self.now
            }
        }
    }
}

/// Normalize one source's logs, newest emission first.
///
/// Events without an actor are dropped. Timestamps come from the log when it
/// carries one, otherwise from its block.
pub async fn normalize_events(
    normalizer: &dyn EventNormalizer,
    events: &[RawEvent],
    chain: &dyn ChainReader,
    ctx: &NormalizeContext<'_>,
    now: u64,
) -> Vec<ActivityRecord> {
    let mut clock = BlockClock::new(chain, now);
    let mut records = Vec::with_capacity(events.len());

    for raw in events.iter().rev() {
        if normalizer.actor(raw).is_none() {
            debug!(
                kind = %normalizer.kind(),
                block = raw.block_number,
                "Dropping event without actor"
            );
            continue;
        }

        let timestamp = match normalizer.embedded_timestamp(raw) {
            Some(ts) => ts,
            None => clock.resolve(raw.block_number).await,
        };

        if let Some(record) = normalizer.normalize(raw, ctx, timestamp) {
            records.push(record);
        }
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::InMemoryChain;
    use alloy_primitives::U256;

    const WEI: u64 = 1_000_000_000_000_000_000;

    fn actor() -> Address {
        Address::repeat_byte(0xaa)
    }

    fn ctx(viewer: Option<Address>) -> NormalizeContext<'static> {
        NormalizeContext {
            viewer,
            currency: "ARC",
        }
    }

    fn raw(block_number: u64, args: Vec<FieldValue>) -> RawEvent {
        RawEvent {
            block_number,
            log_index: 0,
            tx_hash: None,
            args,
        }
    }

    fn arc(units: u64) -> FieldValue {
        FieldValue::Uint(U256::from(units) * U256::from(WEI))
    }

    #[test]
    fn test_box_opened_uses_embedded_fields() {
        let event = raw(
            9,
            vec![actor().into(), 7u64.into(), 1_234u64.into(), 3u64.into()],
        );
        let n = BoxOpenedNormalizer;
        assert_eq!(n.embedded_timestamp(&event), Some(1_234));

        let record = n.normalize(&event, &ctx(None), 1_234).unwrap();
        assert_eq!(record.kind, ActivityKind::BoxOpened);
        assert_eq!(record.subject_id, Some(7));
        assert_eq!(record.score, TokenAmount::from_whole(3));
        assert_eq!(
            record.summary,
            "0xaaaa...aaaa opened 3 box(es) and won trophy #7"
        );
    }

    #[test]
    fn test_box_opened_defaults_to_one_box() {
        let event = raw(9, vec![actor().into(), 2u64.into(), 0u64.into()]);
        let n = BoxOpenedNormalizer;
        assert_eq!(n.amount(&event), TokenAmount::from_whole(1));
        assert_eq!(n.embedded_timestamp(&event), None);
    }

    #[test]
    fn test_box_count_wider_than_u64_saturates() {
        let event = raw(
            9,
            vec![
                actor().into(),
                2u64.into(),
                1_234u64.into(),
                FieldValue::Uint(U256::MAX),
            ],
        );
        let record = BoxOpenedNormalizer.normalize(&event, &ctx(None), 1_234).unwrap();
        assert_eq!(record.amount.whole(), u64::MAX as u128);
        assert_eq!(record.score, TokenAmount::from_whole(u64::MAX));
        assert_eq!(
            record.summary,
            format!(
                "0xaaaa...aaaa opened {} box(es) and won trophy #2",
                u64::MAX
            )
        );
    }

    #[test]
    fn test_staked_scores_a_tenth() {
        let event = raw(1, vec![actor().into(), arc(50)]);
        let record = StakedNormalizer
            .normalize(&event, &ctx(Some(actor())), 10)
            .unwrap();
        assert_eq!(record.score, TokenAmount::from_whole(5));
        assert_eq!(record.summary, "You staked 50 ARC");
    }

    #[test]
    fn test_sold_reads_price_argument() {
        let event = raw(
            1,
            vec![
                actor().into(),
                4u64.into(),
                FieldValue::from(1u64),
                arc(12),
            ],
        );
        let record = SoldNormalizer.normalize(&event, &ctx(None), 10).unwrap();
        assert_eq!(record.amount, TokenAmount::from_whole(12));
        assert_eq!(record.summary, "0xaaaa...aaaa bought item for 12 ARC");
    }

    #[test]
    fn test_missing_actor_is_dropped() {
        let event = raw(1, vec![FieldValue::Text("oops".into()), arc(1)]);
        assert!(HarvestedNormalizer.normalize(&event, &ctx(None), 1).is_none());
        assert!(HarvestedNormalizer
            .normalize(&raw(1, vec![]), &ctx(None), 1)
            .is_none());
    }

    #[test]
    fn test_registry_dispatches_by_kind() {
        let registry = NormalizerRegistry::standard();
        for kind in ActivityKind::ALL {
            assert_eq!(registry.get(kind).map(|n| n.kind()), Some(kind));
        }
        assert!(NormalizerRegistry::new().get(ActivityKind::Sold).is_none());
    }

    #[tokio::test]
    async fn test_normalize_events_resolves_block_time_with_fallback() {
        let chain = InMemoryChain::new(10).with_block_time(3, 300);
        chain.fail_block_time(4).await;
        let events = vec![
            raw(3, vec![actor().into(), arc(1)]),
            raw(4, vec![actor().into(), arc(2)]),
            raw(5, vec![]),
        ];

        let records =
            normalize_events(&HarvestedNormalizer, &events, &chain, &ctx(None), 9_999).await;

        assert_eq!(records.len(), 2);
        // newest emission first
        assert_eq!(records[0].amount, TokenAmount::from_whole(2));
        assert_eq!(records[0].timestamp, 9_999);
        assert_eq!(records[1].timestamp, 300);
    }
}
