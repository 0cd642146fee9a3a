//! Fixed-point token amounts
//!
//! ARC and trophy-count values are carried as 18-decimal fixed point on a
//! `u128`. Integer addition keeps score folding exact, so the order in
//! which sources arrive never changes a total.

use std::fmt;
use std::iter::Sum;

use alloy_primitives::U256;
use serde::{Serialize, Serializer};

/// Number of fractional digits (same as ETH)
pub const DECIMALS: usize = 18;

const UNIT: u128 = 10u128.pow(DECIMALS as u32);

/// An 18-decimal fixed-point amount
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenAmount(u128);

impl TokenAmount {
    pub const ZERO: TokenAmount = TokenAmount(0);

    /// Wrap a raw base-unit value
    pub const fn from_wei(wei: u128) -> Self {
        Self(wei)
    }

    /// Whole units, e.g. a box count
    pub const fn from_whole(units: u64) -> Self {
        Self(units as u128 * UNIT)
    }

    /// Convert an on-chain `uint256`, saturating above `u128::MAX`
    pub fn from_u256(value: U256) -> Self {
        let limbs = value.as_limbs();
        if limbs[2] != 0 || limbs[3] != 0 {
            return Self(u128::MAX);
        }
        Self(((limbs[1] as u128) << 64) | limbs[0] as u128)
    }

    pub const fn wei(&self) -> u128 {
        self.0
    }

    /// Integer part, truncated
    pub const fn whole(&self) -> u128 {
        self.0 / UNIT
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// One tenth, truncated at the last base unit
    pub const fn tenth(self) -> Self {
        Self(self.0 / 10)
    }
}

impl Sum for TokenAmount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Self::saturating_add)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / UNIT;
        let frac = self.0 % UNIT;
        if frac == 0 {
            return write!(f, "{}", whole);
        }
        let digits = format!("{:0width$}", frac, width = DECIMALS);
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
