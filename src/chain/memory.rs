//! In-memory chain backend
//!
//! Serves a recorded chain snapshot (height, block timestamps, logs and view
//! call results) through [`ChainReader`]. Used by the daemon's fixture mode
//! and by tests, which can inject read failures and latency at runtime.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use alloy_primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::trace;

use super::{ChainReader, ContractCall, FieldValue, RawEvent};
use crate::error::{ReadError, Result};
use crate::range::BlockRange;

/// Serializable chain snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub height: u64,

    /// Block number → unix timestamp
    #[serde(default)]
    pub block_times: HashMap<u64, u64>,

    #[serde(default)]
    pub logs: Vec<LogFixture>,

    #[serde(default)]
    pub calls: Vec<CallFixture>,
}

/// Logs emitted by one contract for one event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFixture {
    pub address: Address,
    pub event: String,
    pub entries: Vec<RawEvent>,
}

/// A recorded view call result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallFixture {
    pub address: Address,
    pub call: ContractCall,
    pub result: FieldValue,
}

type LogKey = (Address, String);
type CallKey = (Address, ContractCall);

#[derive(Debug, Default)]
struct Faults {
    offline: bool,
    height: bool,
    logs: HashSet<LogKey>,
    unsupported: HashSet<LogKey>,
    calls: HashSet<CallKey>,
    block_times: HashSet<u64>,
}

#[derive(Debug, Default)]
struct ChainState {
    height: u64,
    block_times: HashMap<u64, u64>,
    logs: HashMap<LogKey, Vec<RawEvent>>,
    calls: HashMap<CallKey, FieldValue>,
    faults: Faults,
}

/// Chain backend holding everything in memory
#[derive(Debug, Default)]
pub struct InMemoryChain {
    state: RwLock<ChainState>,
    read_delay: Option<Duration>,
    height_reads: AtomicUsize,
}

impl InMemoryChain {
    pub fn new(height: u64) -> Self {
        Self {
            state: RwLock::new(ChainState {
                height,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn from_snapshot(snapshot: ChainSnapshot) -> Self {
        let mut chain = Self::new(snapshot.height);
        let state = chain.state.get_mut();
        state.block_times = snapshot.block_times;
        for fixture in snapshot.logs {
            state
                .logs
                .entry((fixture.address, fixture.event))
                .or_default()
                .extend(fixture.entries);
        }
        for fixture in snapshot.calls {
            state
                .calls
                .insert((fixture.address, fixture.call), fixture.result);
        }
        chain
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: ChainSnapshot = serde_json::from_str(json)?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Load a JSON snapshot file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn with_block_time(mut self, block: u64, timestamp: u64) -> Self {
        self.state.get_mut().block_times.insert(block, timestamp);
        self
    }

    pub fn with_event(mut self, address: Address, event: &str, entry: RawEvent) -> Self {
        self.state
            .get_mut()
            .logs
            .entry((address, event.to_string()))
            .or_default()
            .push(entry);
        self
    }

    pub fn with_call(mut self, address: Address, call: ContractCall, result: FieldValue) -> Self {
        self.state.get_mut().calls.insert((address, call), result);
        self
    }

    /// Delay every read, simulating provider latency
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Number of height reads served, one per aggregation cycle
    pub fn height_reads(&self) -> usize {
        self.height_reads.load(Ordering::SeqCst)
    }

    pub async fn set_height(&self, height: u64) {
        self.state.write().await.height = height;
    }

    pub async fn set_call(&self, address: Address, call: ContractCall, result: FieldValue) {
        self.state.write().await.calls.insert((address, call), result);
    }

    pub async fn set_offline(&self, offline: bool) {
        self.state.write().await.faults.offline = offline;
    }

    pub async fn fail_height(&self, fail: bool) {
        self.state.write().await.faults.height = fail;
    }

    pub async fn fail_logs(&self, address: Address, event: &str) {
        self.state
            .write()
            .await
            .faults
            .logs
            .insert((address, event.to_string()));
    }

    pub async fn reject_filter(&self, address: Address, event: &str) {
        self.state
            .write()
            .await
            .faults
            .unsupported
            .insert((address, event.to_string()));
    }

    pub async fn fail_call(&self, address: Address, call: ContractCall) {
        self.state.write().await.faults.calls.insert((address, call));
    }

    pub async fn fail_block_time(&self, block: u64) {
        self.state.write().await.faults.block_times.insert(block);
    }

    pub async fn clear_faults(&self) {
        self.state.write().await.faults = Faults::default();
    }

    async fn delay(&self) {
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ChainReader for InMemoryChain {
    async fn current_height(&self) -> std::result::Result<u64, ReadError> {
        self.delay().await;
        self.height_reads.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read().await;
        if state.faults.offline {
            return Err(ReadError::Unavailable);
        }
        if state.faults.height {
            return Err(ReadError::Timeout);
        }
        Ok(state.height)
    }

    async fn logs_in_range(
        &self,
        address: Address,
        event: &str,
        range: BlockRange,
    ) -> std::result::Result<Vec<RawEvent>, ReadError> {
        self.delay().await;
        let state = self.state.read().await;
        let key = (address, event.to_string());
        if state.faults.offline {
            return Err(ReadError::Unavailable);
        }
        if state.faults.unsupported.contains(&key) {
            return Err(ReadError::UnsupportedFilter(event.to_string()));
        }
        if state.faults.logs.contains(&key) {
            return Err(ReadError::Rpc(format!("eth_getLogs failed for {}", event)));
        }

        let mut entries: Vec<RawEvent> = state
            .logs
            .get(&key)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| range.contains(e.block_number))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        entries.sort_by_key(|e| (e.block_number, e.log_index));

        trace!(%address, event, count = entries.len(), "Served logs");
        Ok(entries)
    }

    async fn read_field(
        &self,
        address: Address,
        call: ContractCall,
    ) -> std::result::Result<FieldValue, ReadError> {
        self.delay().await;
        let state = self.state.read().await;
        if state.faults.offline {
            return Err(ReadError::Unavailable);
        }
        let key = (address, call);
        if state.faults.calls.contains(&key) {
            return Err(ReadError::Rpc(format!("call {} reverted", key.1.method)));
        }
        state
            .calls
            .get(&key)
            .cloned()
            .ok_or_else(|| ReadError::Rpc(format!("no result for {} on {}", key.1.method, address)))
    }

    async fn block_timestamp(&self, block: u64) -> std::result::Result<u64, ReadError> {
        self.delay().await;
        let state = self.state.read().await;
        if state.faults.offline {
            return Err(ReadError::Unavailable);
        }
        if state.faults.block_times.contains(&block) {
            return Err(ReadError::Timeout);
        }
        state
            .block_times
            .get(&block)
            .copied()
            .ok_or_else(|| ReadError::Rpc(format!("unknown block {}", block)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loot_box() -> Address {
        Address::repeat_byte(0x10)
    }

    fn entry(block_number: u64, log_index: u64) -> RawEvent {
        RawEvent {
            block_number,
            log_index,
            tx_hash: None,
            args: vec![],
        }
    }

    #[tokio::test]
    async fn test_logs_filtered_by_range_in_emission_order() {
        let chain = InMemoryChain::new(100)
            .with_event(loot_box(), "BoxOpened", entry(50, 1))
            .with_event(loot_box(), "BoxOpened", entry(10, 0))
            .with_event(loot_box(), "BoxOpened", entry(50, 0))
            .with_event(loot_box(), "BoxOpened", entry(5, 0));

        let logs = chain
            .logs_in_range(loot_box(), "BoxOpened", BlockRange { from: 10, to: 100 })
            .await
            .unwrap();

        let order: Vec<_> = logs.iter().map(|e| (e.block_number, e.log_index)).collect();
        assert_eq!(order, vec![(10, 0), (50, 0), (50, 1)]);
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let chain = InMemoryChain::new(100).with_block_time(7, 1_700);
        assert_eq!(chain.block_timestamp(7).await, Ok(1_700));

        chain.fail_block_time(7).await;
        assert_eq!(chain.block_timestamp(7).await, Err(ReadError::Timeout));

        chain.reject_filter(loot_box(), "BoxOpened").await;
        let err = chain
            .logs_in_range(loot_box(), "BoxOpened", BlockRange { from: 0, to: 100 })
            .await
            .unwrap_err();
        assert!(matches!(err, ReadError::UnsupportedFilter(_)));

        chain.clear_faults().await;
        chain.set_offline(true).await;
        assert_eq!(chain.current_height().await, Err(ReadError::Unavailable));
    }

    #[tokio::test]
    async fn test_snapshot_from_json() {
        let json = r#"{
            "height": 42,
            "block_times": { "40": 1000 },
            "logs": [{
                "address": "0x1010101010101010101010101010101010101010",
                "event": "Staked",
                "entries": [{
                    "block_number": 40,
                    "args": [
                        { "type": "address", "value": "0x00000000000000000000000000000000000000aa" },
                        { "type": "uint", "value": "0x64" }
                    ]
                }]
            }],
            "calls": [{
                "address": "0x1010101010101010101010101010101010101010",
                "call": { "method": "getProposalCount" },
                "result": { "type": "uint", "value": "0x0" }
            }]
        }"#;

        let chain = InMemoryChain::from_json(json).unwrap();
        assert_eq!(chain.current_height().await, Ok(42));
        assert_eq!(chain.block_timestamp(40).await, Ok(1000));

        let logs = chain
            .logs_in_range(loot_box(), "Staked", BlockRange { from: 0, to: 42 })
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].arg(1).and_then(FieldValue::as_u64), Some(100));

        let count = chain
            .read_field(loot_box(), ContractCall::new("getProposalCount"))
            .await
            .unwrap();
        assert_eq!(count.as_u64(), Some(0));
    }
}
