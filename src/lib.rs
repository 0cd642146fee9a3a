//! arcade-pulse: activity, leaderboard, governance and treasury aggregation
//! for the Arcade contracts.
//!
//! Polls read-only chain views on fixed periods, derives the dashboard
//! figures and publishes them as one atomically replaced snapshot.

pub mod activity;
pub mod amount;
pub mod chain;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod governance;
pub mod range;
pub mod scheduler;
pub mod state;
pub mod treasury;

pub use config::Config;
pub use error::{Error, ReadError, Result};

/// Current unix time in seconds
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
