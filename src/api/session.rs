//! GameSessionService — session lifecycle endpoints
//!
//! Endpoints:
//! - POST /api/session/start
//! - POST /api/session/{id}/complete
//! - GET  /api/session/player/{id}
//! - GET  /api/session/player/{id}/stats

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ApiError, Result};
use crate::models::{
    GameSession, NewSession, SessionOutcome, SessionStats, GAME_MODE_CHAPTER, GAME_MODE_TOWER,
};

use super::ApiState;

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/api/session/start", post(start_session))
        .route("/api/session/{id}/complete", post(complete_session))
        .route("/api/session/player/{id}", get(player_sessions))
        .route("/api/session/player/{id}/stats", get(player_stats))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct StartSessionRequest {
    pub player_id: String,
    pub game_mode: Option<String>,
    pub chapter_id: Option<i32>,
    pub level_number: Option<i32>,
    pub tower_floor: Option<i32>,
}

#[derive(Deserialize)]
pub struct CompleteSessionRequest {
    pub final_score: i64,
    pub victory: bool,
    #[serde(default)]
    pub coins_earned: i64,
}

#[derive(Serialize)]
pub struct CompleteSessionResponse {
    pub session: GameSession,
    pub coins_awarded: i64,
    pub new_balance: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coin_credit_error: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn start_session(
    State(state): State<ApiState>,
    Json(req): Json<StartSessionRequest>,
) -> Result<Json<GameSession>> {
    let game_mode = req
        .game_mode
        .as_deref()
        .unwrap_or(GAME_MODE_CHAPTER)
        .trim()
        .to_lowercase();
    if game_mode != GAME_MODE_CHAPTER && game_mode != GAME_MODE_TOWER {
        return Err(ApiError::Validation(format!(
            "game_mode must be '{}' or '{}'",
            GAME_MODE_CHAPTER, GAME_MODE_TOWER
        )));
    }

    let session = state
        .storage
        .sessions
        .start(NewSession {
            player_id: req.player_id,
            game_mode,
            chapter_id: req.chapter_id,
            level_number: req.level_number,
            tower_floor: req.tower_floor,
        })
        .await?;
    Ok(Json(session))
}

async fn complete_session(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(req): Json<CompleteSessionRequest>,
) -> Result<Json<CompleteSessionResponse>> {
    if req.coins_earned < 0 {
        return Err(ApiError::Validation(
            "coins_earned must be non-negative".to_string(),
        ));
    }

    let session = state
        .storage
        .sessions
        .complete(
            id,
            SessionOutcome {
                final_score: req.final_score,
                victory: req.victory,
            },
        )
        .await?;

    // Coin award only on victory; credited separately from the session
    // write, so a failed credit is reported rather than rolled into it.
    let (coins_awarded, new_balance, coin_credit_error) = if req.victory && req.coins_earned > 0 {
        match state
            .storage
            .ledger
            .credit(&session.player_id, req.coins_earned)
            .await
        {
            Ok(balance) => (req.coins_earned, Some(balance), None),
            Err(e) => {
                warn!(
                    "Coin credit failed for {} after session {}: {}",
                    session.player_id, id, e
                );
                (0, None, Some(e.to_string()))
            }
        }
    } else {
        (0, None, None)
    };

    Ok(Json(CompleteSessionResponse {
        session,
        coins_awarded,
        new_balance,
        coin_credit_error,
    }))
}

async fn player_sessions(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<GameSession>>> {
    Ok(Json(state.storage.sessions.player_sessions(&id).await?))
}

async fn player_stats(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<SessionStats>> {
    Ok(Json(state.storage.sessions.player_stats(&id).await?))
}
