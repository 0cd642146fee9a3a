//! Chain read capabilities consumed by the aggregators
//!
//! The provider, ABI decoding and transaction flows live outside this crate.
//! Everything here reaches the chain through [`ChainReader`], whose calls may
//! fail or time out with a [`ReadError`].

pub mod memory;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ReadError;
use crate::range::BlockRange;

pub use memory::InMemoryChain;

/// A decoded event argument or contract return value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum FieldValue {
    Uint(U256),
    Address(Address),
    Bool(bool),
    Text(String),
    Tuple(Vec<FieldValue>),
}

impl FieldValue {
    pub fn as_uint(&self) -> Option<U256> {
        match self {
            FieldValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        let value = self.as_uint()?;
        let limbs = value.as_limbs();
        if limbs[1..].iter().any(|limb| *limb != 0) {
            return None;
        }
        Some(limbs[0])
    }

    /// Like [`as_u64`](Self::as_u64), clamping wider values to `u64::MAX`
    pub fn as_u64_saturating(&self) -> Option<u64> {
        let value = self.as_uint()?;
        let limbs = value.as_limbs();
        if limbs[1..].iter().any(|limb| *limb != 0) {
            return Some(u64::MAX);
        }
        Some(limbs[0])
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            FieldValue::Address(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::Tuple(items) => Some(items),
            _ => None,
        }
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::Uint(U256::from(value))
    }
}

impl From<U256> for FieldValue {
    fn from(value: U256) -> Self {
        FieldValue::Uint(value)
    }
}

impl From<Address> for FieldValue {
    fn from(value: Address) -> Self {
        FieldValue::Address(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// One log entry with its arguments in ABI order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub block_number: u64,
    #[serde(default)]
    pub log_index: u64,
    #[serde(default)]
    pub tx_hash: Option<B256>,
    #[serde(default)]
    pub args: Vec<FieldValue>,
}

impl RawEvent {
    /// Positional argument, if present
    pub fn arg(&self, index: usize) -> Option<&FieldValue> {
        self.args.get(index)
    }
}

/// A view call against a contract
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractCall {
    pub method: String,
    #[serde(default)]
    pub args: Vec<FieldValue>,
}

impl ContractCall {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, value: impl Into<FieldValue>) -> Self {
        self.args.push(value.into());
        self
    }
}

/// Read-only chain access
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Latest known block height
    async fn current_height(&self) -> Result<u64, ReadError>;

    /// Logs named `event` emitted by `address` inside `range`, in emission order
    async fn logs_in_range(
        &self,
        address: Address,
        event: &str,
        range: BlockRange,
    ) -> Result<Vec<RawEvent>, ReadError>;

    /// Current value of a view method
    async fn read_field(&self, address: Address, call: ContractCall)
        -> Result<FieldValue, ReadError>;

    /// Timestamp of a block, unix seconds
    async fn block_timestamp(&self, block: u64) -> Result<u64, ReadError>;
}
