//! Dashboard - read-only HTTP JSON over the published state
//!
//! Provides:
//! - Recent activity and the leaderboard
//! - Next governance deadline
//! - Treasury value locked and total minted
//! - A manual refresh trigger and per-task state

pub mod routes;

use std::sync::Arc;

use alloy_primitives::Address;
use axum::{
    routing::{get, post},
    Router,
};

use crate::scheduler::PollScheduler;
use crate::state::StateReader;

/// Dashboard state shared across handlers
pub struct DashboardState {
    pub reader: StateReader,
    pub scheduler: Arc<PollScheduler>,
    /// Account labelled "You"
    pub viewer: Option<Address>,
}

pub type SharedState = Arc<DashboardState>;

impl DashboardState {
    pub fn new(
        reader: StateReader,
        scheduler: Arc<PollScheduler>,
        viewer: Option<Address>,
    ) -> Self {
        Self {
            reader,
            scheduler,
            viewer,
        }
    }
}

/// Create the dashboard router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/api/snapshot", get(routes::api_snapshot))
        .route("/api/activity", get(routes::api_activity))
        .route("/api/leaderboard", get(routes::api_leaderboard))
        .route("/api/governance", get(routes::api_governance))
        .route("/api/treasury", get(routes::api_treasury))
        .route("/api/tasks", get(routes::api_tasks))
        .route("/api/refresh", post(routes::api_refresh))
        // Health check
        .route("/health", get(routes::health))
        .with_state(state)
}
