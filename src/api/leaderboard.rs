//! LeaderboardService — score submission and ranking queries
//!
//! Endpoints:
//! - POST /api/leaderboard/submit
//! - POST /api/leaderboard/init
//! - GET  /api/leaderboard
//! - GET  /api/leaderboard/season/{season_id}
//! - GET  /api/leaderboard/player/{player_id}
//! - GET  /api/leaderboard/tower
//! - GET  /api/leaderboard/seasons
//!
//! Submissions merge monotonically (a lower or equal score is a silent
//! no-op) and trigger a full dense re-rank of the season when the stored
//! score changes. When `season_id` is omitted the current active season is
//! used.

use std::sync::atomic::Ordering;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};
use crate::models::{InitOutcome, LeaderboardEntry, RankedEntry, Season, TowerRankEntry};

use super::ApiState;

/// Query limits are capped to keep full-board reads off the hot path.
const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/api/leaderboard/submit", post(submit_score))
        .route("/api/leaderboard/init", post(initialize_player))
        .route("/api/leaderboard", get(current_season_top))
        .route("/api/leaderboard/season/{season_id}", get(season_top))
        .route("/api/leaderboard/player/{player_id}", get(player_ranking))
        .route("/api/leaderboard/tower", get(tower_top))
        .route("/api/leaderboard/seasons", get(list_seasons))
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

async fn resolve_season(state: &ApiState, season_id: Option<i32>) -> Result<i32> {
    match season_id {
        Some(id) => Ok(id),
        None => {
            let season = state
                .storage
                .seasons
                .current()
                .await?
                .ok_or_else(|| ApiError::NotFound("no active season".to_string()))?;
            Ok(season.season_id)
        }
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct SubmitScoreRequest {
    pub player_id: String,
    pub season_id: Option<i32>,
    pub score: i64,
    #[serde(default)]
    pub tower_level: i32,
}

#[derive(Serialize)]
pub struct SubmitScoreResponse {
    pub entry: LeaderboardEntry,
    /// False when the submission was a monotonic no-op.
    pub updated: bool,
}

#[derive(Deserialize)]
pub struct InitPlayerRequest {
    pub player_id: String,
    pub season_id: Option<i32>,
}

#[derive(Serialize)]
pub struct InitPlayerResponse {
    pub status: &'static str,
    pub entry: LeaderboardEntry,
}

#[derive(Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct SeasonBoardResponse {
    pub season_id: i32,
    pub entries: Vec<RankedEntry>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn submit_score(
    State(state): State<ApiState>,
    Json(req): Json<SubmitScoreRequest>,
) -> Result<Json<SubmitScoreResponse>> {
    if req.score < 0 {
        return Err(ApiError::Validation("score must be non-negative".to_string()));
    }
    if req.tower_level < 0 {
        return Err(ApiError::Validation(
            "tower_level must be non-negative".to_string(),
        ));
    }

    let season_id = resolve_season(&state, req.season_id).await?;
    let submission = state
        .storage
        .leaderboard
        .submit_score(&req.player_id, season_id, req.score, req.tower_level)
        .await?;

    state.metrics.scores_submitted.fetch_add(1, Ordering::Relaxed);
    if submission.recomputed {
        state.metrics.rank_recomputes.fetch_add(1, Ordering::Relaxed);
    }

    Ok(Json(SubmitScoreResponse {
        entry: submission.entry,
        updated: submission.updated,
    }))
}

async fn initialize_player(
    State(state): State<ApiState>,
    Json(req): Json<InitPlayerRequest>,
) -> Result<Json<InitPlayerResponse>> {
    let season_id = resolve_season(&state, req.season_id).await?;
    let outcome = state
        .storage
        .leaderboard
        .initialize_player(&req.player_id, season_id)
        .await?;

    // Re-initialization is success-with-notice, never an error.
    let (status, entry) = match outcome {
        InitOutcome::Created(entry) => {
            state.metrics.rank_recomputes.fetch_add(1, Ordering::Relaxed);
            ("created", entry)
        }
        InitOutcome::AlreadyInitialized(entry) => ("already_initialized", entry),
    };

    Ok(Json(InitPlayerResponse { status, entry }))
}

async fn current_season_top(
    State(state): State<ApiState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<SeasonBoardResponse>> {
    let season_id = resolve_season(&state, None).await?;
    let entries = state
        .storage
        .leaderboard
        .season_top(season_id, clamp_limit(query.limit))
        .await?;
    Ok(Json(SeasonBoardResponse { season_id, entries }))
}

async fn season_top(
    State(state): State<ApiState>,
    Path(season_id): Path<i32>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<SeasonBoardResponse>> {
    state
        .storage
        .seasons
        .get(season_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("season {}", season_id)))?;
    let entries = state
        .storage
        .leaderboard
        .season_top(season_id, clamp_limit(query.limit))
        .await?;
    Ok(Json(SeasonBoardResponse { season_id, entries }))
}

async fn player_ranking(
    State(state): State<ApiState>,
    Path(player_id): Path<String>,
) -> Result<Json<Vec<RankedEntry>>> {
    let entries = state.storage.leaderboard.player_entries(&player_id).await?;
    if entries.is_empty() {
        return Err(ApiError::NotFound(format!(
            "player {} has no leaderboard entries",
            player_id
        )));
    }
    Ok(Json(entries))
}

async fn tower_top(
    State(state): State<ApiState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<TowerRankEntry>>> {
    Ok(Json(
        state
            .storage
            .leaderboard
            .tower_top(clamp_limit(query.limit))
            .await?,
    ))
}

async fn list_seasons(State(state): State<ApiState>) -> Result<Json<Vec<Season>>> {
    Ok(Json(state.storage.seasons.list().await?))
}
