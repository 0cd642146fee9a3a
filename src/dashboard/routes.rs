//! Dashboard HTTP routes
//!
//! Handlers for the JSON API endpoints

use std::collections::BTreeMap;

use alloy_primitives::Address;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

use super::SharedState;
use crate::activity::{actor_label, ActivityKind, ActivityRecord};
use crate::amount::TokenAmount;
use crate::governance::GovernanceSummary;
use crate::range::BlockRange;
use crate::scheduler::{TaskKind, TaskState};
use crate::state::DashboardSnapshot;

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    "OK"
}

/// GET /api/snapshot
pub async fn api_snapshot(State(state): State<SharedState>) -> Json<DashboardSnapshot> {
    Json(state.reader.snapshot())
}

#[derive(Serialize)]
pub struct ActivityRow {
    #[serde(flatten)]
    pub record: ActivityRecord,
    pub time: String,
}

#[derive(Serialize)]
pub struct ActivityResponse {
    pub range: Option<BlockRange>,
    pub active_players: usize,
    pub recent: Vec<ActivityRow>,
    pub degraded_sources: Vec<ActivityKind>,
    pub updated_at: Option<u64>,
}

/// GET /api/activity
pub async fn api_activity(State(state): State<SharedState>) -> Json<ActivityResponse> {
    let response = state.reader.with(|s| ActivityResponse {
        range: s.activity.range,
        active_players: s.activity.active_players,
        recent: s
            .activity
            .recent
            .iter()
            .map(|record| ActivityRow {
                time: record.pretty_time(),
                record: record.clone(),
            })
            .collect(),
        degraded_sources: s.activity.degraded_sources.clone(),
        updated_at: s.activity_updated_at,
    });
    Json(response)
}

#[derive(Debug, Serialize)]
pub struct LeaderboardRow {
    pub rank: usize,
    pub actor: Address,
    /// "You" or the short address
    pub label: String,
    pub score: TokenAmount,
}

/// GET /api/leaderboard
pub async fn api_leaderboard(State(state): State<SharedState>) -> Json<Vec<LeaderboardRow>> {
    let rows: Vec<LeaderboardRow> = state.reader.with(|s| {
        s.activity
            .leaderboard
            .iter()
            .enumerate()
            .map(|(i, entry)| LeaderboardRow {
                rank: i + 1,
                actor: entry.actor,
                label: actor_label(&entry.actor, state.viewer.as_ref()),
                score: entry.score,
            })
            .collect()
    });
    Json(rows)
}

#[derive(Serialize)]
pub struct GovernanceResponse {
    #[serde(flatten)]
    pub summary: GovernanceSummary,
    pub updated_at: Option<u64>,
}

/// GET /api/governance
pub async fn api_governance(State(state): State<SharedState>) -> Json<GovernanceResponse> {
    Json(state.reader.with(|s| GovernanceResponse {
        summary: s.governance.clone(),
        updated_at: s.governance_updated_at,
    }))
}

#[derive(Serialize)]
pub struct TreasuryResponse {
    pub total_value_locked: TokenAmount,
    pub modules: BTreeMap<String, TokenAmount>,
    /// Amount, or `—` when the mint scan failed
    pub total_minted: String,
    pub updated_at: Option<u64>,
}

/// GET /api/treasury
pub async fn api_treasury(State(state): State<SharedState>) -> Json<TreasuryResponse> {
    Json(state.reader.with(|s| TreasuryResponse {
        total_value_locked: s.treasury.total_value_locked,
        modules: s.treasury.modules.clone(),
        total_minted: s.treasury.minted_label(),
        updated_at: s.treasury_updated_at,
    }))
}

#[derive(Serialize)]
pub struct TaskStatus {
    pub task: TaskKind,
    pub state: TaskState,
}

#[derive(Serialize)]
pub struct TasksResponse {
    pub connected: bool,
    pub tasks: Vec<TaskStatus>,
}

/// GET /api/tasks
pub async fn api_tasks(State(state): State<SharedState>) -> Json<TasksResponse> {
    let tasks: Vec<TaskStatus> = state
        .scheduler
        .task_states()
        .await
        .into_iter()
        .map(|(task, state)| TaskStatus { task, state })
        .collect();

    Json(TasksResponse {
        connected: state.scheduler.is_connected(),
        tasks,
    })
}

/// POST /api/refresh?task=activity
#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    pub task: Option<TaskKind>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub started: Vec<TaskKind>,
}

pub async fn api_refresh(
    State(state): State<SharedState>,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<RefreshResponse>, (StatusCode, String)> {
    if !state.scheduler.is_connected() {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "Provider disconnected".to_string(),
        ));
    }

    let kinds = match query.task {
        Some(kind) => vec![kind],
        None => vec![TaskKind::Treasury, TaskKind::Activity, TaskKind::Governance],
    };

    let mut started = Vec::new();
    for kind in kinds {
        if state.scheduler.trigger(kind).await {
            started.push(kind);
        }
    }

    Ok(Json(RefreshResponse { started }))
}
