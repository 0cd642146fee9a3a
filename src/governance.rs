//! Governance deadline tracking
//!
//! Finds the open council proposal whose voting window closes soonest. The
//! council is read proposal by proposal each cycle; there is no incremental
//! index, and a single failed read discards the whole cycle's result since a
//! partial scan could hide a sooner deadline.

use alloy_primitives::Address;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::chain::{ChainReader, ContractCall, FieldValue};
use crate::error::ReadError;

/// `getProposal` tuple index of the voting end time
const PROPOSAL_END_INDEX: usize = 3;
/// `getProposal` tuple index of the tallied flag
const PROPOSAL_TALLIED_INDEX: usize = 6;

pub const NO_ACTIVE_PROPOSALS: &str = "No active proposals";

/// Point-in-time read of one proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProposalSnapshot {
    pub id: u64,
    /// Voting end, unix seconds
    pub closes_at: u64,
    /// Tallied; no longer accepts votes
    pub is_finalized: bool,
}

impl ProposalSnapshot {
    /// Decode a `getProposal` return tuple
    pub fn from_field(id: u64, value: &FieldValue) -> Result<Self, ReadError> {
        let fields = value
            .as_tuple()
            .ok_or_else(|| ReadError::Decode(format!("proposal {} is not a tuple", id)))?;

        let closes_at = fields
            .get(PROPOSAL_END_INDEX)
            .and_then(FieldValue::as_u64)
            .ok_or_else(|| ReadError::Decode(format!("proposal {} has no end time", id)))?;
        let is_finalized = fields
            .get(PROPOSAL_TALLIED_INDEX)
            .and_then(FieldValue::as_bool)
            .ok_or_else(|| ReadError::Decode(format!("proposal {} has no tallied flag", id)))?;

        Ok(Self {
            id,
            closes_at,
            is_finalized,
        })
    }
}

/// The soonest-closing open proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeadlineSummary {
    pub proposal_id: u64,
    pub closes_at: u64,
}

impl DeadlineSummary {
    /// `1d 2h 3m`, days omitted when zero
    pub fn countdown(&self, now: u64) -> String {
        let diff = self.closes_at.saturating_sub(now);
        let days = diff / 86_400;
        let hours = (diff % 86_400) / 3_600;
        let mins = (diff % 3_600) / 60;
        if days > 0 {
            format!("{}d {}h {}m", days, hours, mins)
        } else {
            format!("{}h {}m", hours, mins)
        }
    }
}

/// Pick the open proposal closing soonest.
///
/// Open means `closes_at > now` and not finalized. Ties go to the lowest id.
pub fn select_nearest_deadline(
    proposals: &[ProposalSnapshot],
    now: u64,
) -> Option<DeadlineSummary> {
    proposals
        .iter()
        .filter(|p| p.closes_at > now && !p.is_finalized)
        .min_by_key(|p| (p.closes_at, p.id))
        .map(|p| DeadlineSummary {
            proposal_id: p.id,
            closes_at: p.closes_at,
        })
}

/// Published governance state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GovernanceSummary {
    pub next: Option<DeadlineSummary>,
    pub headline: String,
}

impl GovernanceSummary {
    pub fn new(next: Option<DeadlineSummary>, now: u64) -> Self {
        let headline = match next {
            Some(d) => format!(
                "Next vote: Proposal #{} closes in {}",
                d.proposal_id,
                d.countdown(now)
            ),
            None => NO_ACTIVE_PROPOSALS.to_string(),
        };
        Self { next, headline }
    }
}

impl Default for GovernanceSummary {
    fn default() -> Self {
        Self {
            next: None,
            headline: NO_ACTIVE_PROPOSALS.to_string(),
        }
    }
}

/// Reads every council proposal and selects the nearest deadline
pub struct DeadlineSelector {
    council: Option<Address>,
}

impl DeadlineSelector {
    pub fn new(council: Option<Address>) -> Self {
        Self { council }
    }

    /// Run one cycle. Never fails: any read error yields "no active proposals".
    pub async fn refresh(&self, chain: &dyn ChainReader, now: u64) -> GovernanceSummary {
        let Some(council) = self.council else {
            debug!("No council address configured");
            return GovernanceSummary::default();
        };

        match scan_proposals(chain, council).await {
            Ok(proposals) => {
                let next = select_nearest_deadline(&proposals, now);
                info!(
                    proposals = proposals.len(),
                    next = ?next.map(|d| d.proposal_id),
                    "Governance refreshed"
                );
                GovernanceSummary::new(next, now)
            }
            Err(e) => {
                warn!(error = %e, "Proposal scan failed, reporting no active proposals");
                GovernanceSummary::default()
            }
        }
    }
}

/// Read proposals `1..=getProposalCount()` in order, stopping at the first failure
pub async fn scan_proposals(
    chain: &dyn ChainReader,
    council: Address,
) -> Result<Vec<ProposalSnapshot>, ReadError> {
    let count = chain
        .read_field(council, ContractCall::new("getProposalCount"))
        .await?
        .as_u64()
        .ok_or_else(|| ReadError::Decode("proposal count is not a u64".to_string()))?;

    let mut proposals = Vec::with_capacity(count.min(1_024) as usize);
    for id in 1..=count {
        let value = chain
            .read_field(council, ContractCall::new("getProposal").arg(id))
            .await?;
        proposals.push(ProposalSnapshot::from_field(id, &value)?);
    }
    Ok(proposals)
}
