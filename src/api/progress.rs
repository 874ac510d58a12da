//! ProgressService — level completion and tower state endpoints
//!
//! Endpoints:
//! - POST /api/progress/complete
//! - GET  /api/progress/player/{id}
//! - GET  /api/progress/player/{id}/summary
//! - GET  /api/progress/player/{id}/tower
//! - POST /api/progress/tower
//!
//! Progress persistence is authoritative: the coin award attached to a
//! completion is a separate ledger credit, and its failure is reported in
//! the response rather than rolling the progress write back.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ApiError, Result};
use crate::models::{ChapterSummary, ProgressRecord, TowerState, TowerStateUpdate};

use super::ApiState;

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/api/progress/complete", post(complete_level))
        .route("/api/progress/player/{id}", get(list_progress))
        .route("/api/progress/player/{id}/summary", get(progress_summary))
        .route("/api/progress/player/{id}/tower", get(get_tower_state))
        .route("/api/progress/tower", post(update_tower_state))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct CompleteLevelRequest {
    pub player_id: String,
    pub chapter_id: i32,
    pub level_number: i32,
    pub score: i64,
    #[serde(default)]
    pub coins_earned: i64,
}

#[derive(Serialize)]
pub struct CompleteLevelResponse {
    pub progress: ProgressRecord,
    /// Coins actually credited; zero when the credit failed or none were due.
    pub coins_awarded: i64,
    pub new_balance: Option<i64>,
    /// Set when the progress write succeeded but the coin credit did not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coin_credit_error: Option<String>,
}

#[derive(Serialize)]
pub struct LastCompletedLevel {
    pub chapter_id: i32,
    pub level_number: i32,
    pub best_score: i64,
    pub completion_date: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct ProgressSummaryResponse {
    pub player_id: String,
    pub player_name: String,
    pub total_levels_completed: i64,
    pub total_score: i64,
    pub chapters: Vec<ChapterSummary>,
    pub last_completed: Option<LastCompletedLevel>,
}

#[derive(Deserialize)]
pub struct UpdateTowerRequest {
    pub player_id: String,
    pub current_floor: i32,
    #[serde(default)]
    pub current_health: i32,
    #[serde(default)]
    pub excess_health: i32,
    #[serde(default)]
    pub shield_points: i32,
    #[serde(default)]
    pub power_points: i32,
}

// ============================================================================
// Handlers
// ============================================================================

async fn complete_level(
    State(state): State<ApiState>,
    Json(req): Json<CompleteLevelRequest>,
) -> Result<Json<CompleteLevelResponse>> {
    if req.score < 0 {
        return Err(ApiError::Validation("score must be non-negative".to_string()));
    }
    if req.coins_earned < 0 {
        return Err(ApiError::Validation(
            "coins_earned must be non-negative".to_string(),
        ));
    }

    let progress = state
        .storage
        .progress
        .record_completion(&req.player_id, req.chapter_id, req.level_number, req.score)
        .await?;

    // Coin credit is a separate atomic operation; a failure here must not
    // undo the progress write.
    let (coins_awarded, new_balance, coin_credit_error) = if req.coins_earned > 0 {
        match state.storage.ledger.credit(&req.player_id, req.coins_earned).await {
            Ok(balance) => (req.coins_earned, Some(balance), None),
            Err(e) => {
                warn!(
                    "Coin credit failed for {} after level completion: {}",
                    req.player_id, e
                );
                (0, None, Some(e.to_string()))
            }
        }
    } else {
        (0, None, None)
    };

    Ok(Json(CompleteLevelResponse {
        progress,
        coins_awarded,
        new_balance,
        coin_credit_error,
    }))
}

async fn list_progress(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ProgressRecord>>> {
    Ok(Json(state.storage.progress.list_for_player(&id).await?))
}

async fn progress_summary(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<ProgressSummaryResponse>> {
    let player = state
        .storage
        .players
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("player {}", id)))?;

    let records = state.storage.progress.list_for_player(&id).await?;
    let chapters = state.storage.progress.summarize(&id).await?;

    let last_completed = records
        .iter()
        .filter(|r| r.is_completed)
        .filter_map(|r| r.completion_date.map(|d| (r, d)))
        .max_by_key(|(_, d)| *d)
        .map(|(r, d)| LastCompletedLevel {
            chapter_id: r.chapter_id,
            level_number: r.level_number,
            best_score: r.best_score,
            completion_date: d,
        });

    Ok(Json(ProgressSummaryResponse {
        player_id: player.player_id,
        player_name: player.player_name,
        total_levels_completed: records.iter().filter(|r| r.is_completed).count() as i64,
        total_score: records.iter().map(|r| r.best_score).sum(),
        chapters,
        last_completed,
    }))
}

async fn get_tower_state(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<TowerState>> {
    let tower = state
        .storage
        .progress
        .tower_state(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("tower state for player {}", id)))?;
    Ok(Json(tower))
}

async fn update_tower_state(
    State(state): State<ApiState>,
    Json(req): Json<UpdateTowerRequest>,
) -> Result<Json<TowerState>> {
    if req.current_floor < 0 {
        return Err(ApiError::Validation(
            "current_floor must be non-negative".to_string(),
        ));
    }

    let tower = state
        .storage
        .progress
        .update_tower_state(
            &req.player_id,
            TowerStateUpdate {
                current_floor: req.current_floor,
                current_health: req.current_health,
                excess_health: req.excess_health,
                shield_points: req.shield_points,
                power_points: req.power_points,
            },
        )
        .await?;
    Ok(Json(tower))
}
