//! Block range selection for log scans

use serde::Serialize;

/// Lookback for the recent-activity scan (blocks)
pub const ACTIVITY_LOOKBACK: u64 = 5_000;

/// Lookback for the mint scan when no deployment block is configured (blocks)
pub const MINT_LOOKBACK: u64 = 100_000;

/// A deployment block is honoured only while it lies within
/// `lookback * DEPLOY_WINDOW_FACTOR` blocks of the chain head.
pub const DEPLOY_WINDOW_FACTOR: u64 = 10;

/// Inclusive block range `[from, to]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    /// Number of blocks covered
    pub fn len(&self) -> u64 {
        self.to.saturating_sub(self.from).saturating_add(1)
    }

    pub fn contains(&self, block: u64) -> bool {
        block >= self.from && block <= self.to
    }
}

/// Compute the range to scan ending at `current_block`.
pub fn compute_range(current_block: u64, lookback: u64, deploy_block: Option<u64>) -> BlockRange {
    let window = lookback.saturating_mul(DEPLOY_WINDOW_FACTOR);
    let from = match deploy_block {
        Some(deployed) if current_block.saturating_sub(deployed) <= window => {
            deployed.min(current_block)
        }
        _ => current_block.saturating_sub(lookback),
    };

    BlockRange {
        from,
        to: current_block,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_clamps_at_genesis() {
        let range = compute_range(1_200, ACTIVITY_LOOKBACK, None);
        assert_eq!(range, BlockRange { from: 0, to: 1_200 });
    }

    #[test]
    fn test_range_uses_lookback() {
        let range = compute_range(20_000, ACTIVITY_LOOKBACK, None);
        assert_eq!(range, BlockRange { from: 15_000, to: 20_000 });
        assert_eq!(range.len(), 5_001);
    }

    #[test]
    fn test_range_prefers_recent_deploy_block() {
        let range = compute_range(250_000, MINT_LOOKBACK, Some(40_000));
        assert_eq!(range.from, 40_000);
        assert_eq!(range.to, 250_000);
    }

    #[test]
    fn test_range_ignores_ancient_deploy_block() {
        let range = compute_range(5_000_000, MINT_LOOKBACK, Some(10));
        assert_eq!(range.from, 4_900_000);
    }

    #[test]
    fn test_range_deploy_block_ahead_of_head() {
        let range = compute_range(100, MINT_LOOKBACK, Some(500));
        assert_eq!(range, BlockRange { from: 100, to: 100 });
        assert!(range.contains(100));
    }

    #[test]
    fn test_range_bounds_hold_for_all_inputs() {
        for current in [0u64, 1, 4_999, 5_000, 5_001, u64::MAX] {
            for lookback in [0u64, 1, ACTIVITY_LOOKBACK, MINT_LOOKBACK, u64::MAX] {
                for deploy in [None, Some(0), Some(current), Some(u64::MAX)] {
                    let range = compute_range(current, lookback, deploy);
                    assert_eq!(range.to, current);
                    assert!(range.from <= range.to);
                }
            }
        }
    }
}
