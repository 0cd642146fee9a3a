//! Treasury reads: value locked per module and total ARC minted

use std::collections::BTreeMap;

use alloy_primitives::{Address, U256};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::amount::TokenAmount;
use crate::chain::{ChainReader, ContractCall, FieldValue};
use crate::config::Config;
use crate::error::{ConfigurationError, Error, ReadError};
use crate::range::{compute_range, MINT_LOOKBACK};

const TRANSFER_SINGLE: &str = "TransferSingle";

// TransferSingle(operator, from, to, id, value)
const TRANSFER_FROM_INDEX: usize = 1;
const TRANSFER_ID_INDEX: usize = 3;
const TRANSFER_VALUE_INDEX: usize = 4;

/// Published treasury state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TreasurySummary {
    pub total_value_locked: TokenAmount,
    /// ARC held by each module contract
    pub modules: BTreeMap<String, TokenAmount>,
    /// `None` when the mint scan failed
    pub total_minted: Option<TokenAmount>,
}

impl TreasurySummary {
    /// Total minted for display, `—` when unknown
    pub fn minted_label(&self) -> String {
        match self.total_minted {
            Some(amount) => amount.to_string(),
            None => "—".to_string(),
        }
    }
}

/// A contract whose ARC balance counts toward value locked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreasuryModule {
    pub name: String,
    pub address: Option<Address>,
}

/// Reads module balances and sums mints
pub struct TreasuryScanner {
    token: Option<Address>,
    modules: Vec<TreasuryModule>,
    mint_lookback: u64,
    deploy_block: Option<u64>,
}

impl TreasuryScanner {
    pub fn new(token: Option<Address>, modules: Vec<TreasuryModule>) -> Self {
        Self {
            token,
            modules,
            mint_lookback: MINT_LOOKBACK,
            deploy_block: None,
        }
    }

    /// Staking, loot, market and council balances
    pub fn from_config(config: &Config) -> Self {
        let contracts = &config.contracts;
        let module = |name: &str, address| TreasuryModule {
            name: name.to_string(),
            address,
        };
        let modules = vec![
            module("stake", contracts.stake_badge),
            module("loot", contracts.loot_box),
            module("market", contracts.trade_hub),
            module("dao", contracts.council),
        ];

        Self::new(contracts.arcade_token, modules)
            .with_mint_window(config.scan.mint_lookback, contracts.deploy_block)
    }

    pub fn with_mint_window(mut self, lookback: u64, deploy_block: Option<u64>) -> Self {
        self.mint_lookback = lookback;
        self.deploy_block = deploy_block;
        self
    }

    /// Run one cycle.
    ///
    /// Failing to resolve the token or its coin id fails the cycle. A failing
    /// module counts as zero and a failing mint scan leaves the total unknown.
    pub async fn refresh(&self, chain: &dyn ChainReader) -> Result<TreasurySummary, Error> {
        let token = self
            .token
            .ok_or(ConfigurationError::MissingAddress("arcade_token"))?;
        let coin_id = chain
            .read_field(token, ContractCall::new("ARCADE_COIN"))
            .await?
            .as_uint()
            .ok_or_else(|| ReadError::Decode("ARCADE_COIN is not a uint".into()))?;

        let mut modules = BTreeMap::new();
        for module in &self.modules {
            let balance = self.module_balance(chain, token, coin_id, module).await;
            modules.insert(module.name.clone(), balance);
        }
        let total_value_locked = modules.values().copied().sum();

        let total_minted = match self.total_minted(chain, token, coin_id).await {
            Ok(total) => Some(total),
            Err(e) => {
                warn!(error = %e, "Mint scan failed");
                None
            }
        };

        info!(
            tvl = %total_value_locked,
            minted = ?total_minted.map(|m| m.to_string()),
            "Treasury refreshed"
        );

        Ok(TreasurySummary {
            total_value_locked,
            modules,
            total_minted,
        })
    }

    async fn module_balance(
        &self,
        chain: &dyn ChainReader,
        token: Address,
        coin_id: U256,
        module: &TreasuryModule,
    ) -> TokenAmount {
        let Some(address) = module.address else {
            debug!(module = %module.name, "Module address not configured");
            return TokenAmount::ZERO;
        };

        let call = ContractCall::new("balanceOf").arg(address).arg(coin_id);
        match chain.read_field(token, call).await {
            Ok(value) => value
                .as_uint()
                .map(TokenAmount::from_u256)
                .unwrap_or(TokenAmount::ZERO),
            Err(e) => {
                warn!(module = %module.name, error = %e, "Balance read failed, counting zero");
                TokenAmount::ZERO
            }
        }
    }

    async fn total_minted(
        &self,
        chain: &dyn ChainReader,
        token: Address,
        coin_id: U256,
    ) -> Result<TokenAmount, Error> {
        let height = chain.current_height().await?;
        let range = compute_range(height, self.mint_lookback, self.deploy_block);
        let logs = chain.logs_in_range(token, TRANSFER_SINGLE, range).await?;

        let total = logs
            .iter()
            .filter(|log| {
                log.arg(TRANSFER_FROM_INDEX).and_then(FieldValue::as_address)
                    == Some(Address::ZERO)
                    && log.arg(TRANSFER_ID_INDEX).and_then(FieldValue::as_uint) == Some(coin_id)
            })
            .filter_map(|log| log.arg(TRANSFER_VALUE_INDEX).and_then(FieldValue::as_uint))
            .map(TokenAmount::from_u256)
            .sum();

        debug!(from = range.from, to = range.to, logs = logs.len(), "Mint scan complete");
        Ok(total)
    }
}
