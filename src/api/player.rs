//! PlayerService — registration, login, profile, coin endpoints
//!
//! Endpoints:
//! - POST /api/player/register
//! - POST /api/player/login
//! - GET  /api/player/{id}
//! - GET  /api/player/{id}/profile
//! - PUT  /api/player/{id}/profile
//! - POST /api/player/{id}/coins
//! - GET  /api/player/{id}/upgrades
//! - DELETE /api/player/{id}

use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use tracing::info;

use crate::error::{ApiError, Result};
use crate::models::{NewPlayer, Player, PlayerWeapon, ProfileUpdate, TowerState};

use super::ApiState;

/// Balance every new account starts with.
const STARTING_COINS: i64 = 100;

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/api/player/register", post(register))
        .route("/api/player/login", post(login))
        .route("/api/player/{id}", get(get_player))
        .route("/api/player/{id}", delete(deactivate_player))
        .route("/api/player/{id}/profile", get(get_profile))
        .route("/api/player/{id}/profile", put(update_profile))
        .route("/api/player/{id}/coins", post(update_coins))
        .route("/api/player/{id}/upgrades", get(get_upgrades))
}

pub(crate) fn hash_password(password: &str) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Random `PLR` + 8 digit id, retried until unused.
async fn generate_player_id(state: &ApiState) -> Result<String> {
    loop {
        let digits: u32 = rand::thread_rng().gen_range(10_000_000..100_000_000);
        let candidate = format!("PLR{}", digits);
        if !state.storage.players.exists(&candidate).await? {
            return Ok(candidate);
        }
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub player_name: String,
    pub password: String,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub language_preference: Option<String>,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub player: Player,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub player: Player,
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub player_name: Option<String>,
    pub gender: Option<String>,
    pub language_preference: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateCoinsRequest {
    pub coins_change: i64,
}

#[derive(Serialize)]
pub struct UpdateCoinsResponse {
    pub success: bool,
    pub new_coins: i64,
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub player: Player,
    pub upgrades: HashMap<String, i32>,
    pub owned_weapons: Vec<PlayerWeapon>,
    pub tower_state: Option<TowerState>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn register(
    State(state): State<ApiState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>> {
    if req.player_name.trim().is_empty() {
        return Err(ApiError::Validation("player_name is required".to_string()));
    }
    if req.password.is_empty() {
        return Err(ApiError::Validation("password is required".to_string()));
    }
    if let Some(email) = req.email.as_deref() {
        if state.storage.players.get_by_email(email).await?.is_some() {
            return Err(ApiError::Store(
                crate::storage::repository::StoreError::Conflict(format!(
                    "email {} already registered",
                    email
                )),
            ));
        }
    }

    let player_id = generate_player_id(&state).await?;
    let player = state
        .storage
        .players
        .create(NewPlayer {
            player_id,
            player_name: req.player_name.trim().to_string(),
            password_hash: hash_password(&req.password),
            email: req.email,
            gender: req.gender,
            language_preference: req.language_preference,
            starting_coins: STARTING_COINS,
        })
        .await?;

    info!("Registered player {} ({})", player.player_name, player.player_id);
    Ok(Json(RegisterResponse {
        message: "Registration successful",
        player,
    }))
}

async fn login(
    State(state): State<ApiState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let player = state
        .storage
        .players
        .get_by_email(&req.email)
        .await?
        .ok_or(ApiError::AuthFailed)?;

    if player.password_hash != hash_password(&req.password) {
        return Err(ApiError::AuthFailed);
    }

    state.storage.players.touch_login(&player.player_id).await?;
    let player = state
        .storage
        .players
        .get(&player.player_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("player {}", player.player_id)))?;

    Ok(Json(LoginResponse {
        message: "Login successful",
        player,
    }))
}

async fn get_player(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Player>> {
    let player = state
        .storage
        .players
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("player {}", id)))?;
    Ok(Json(player))
}

async fn get_profile(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<ProfileResponse>> {
    let player = state
        .storage
        .players
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("player {}", id)))?;

    let upgrades = state
        .storage
        .ledger
        .upgrades(&id)
        .await?
        .into_iter()
        .map(|u| (u.upgrade_type, u.level))
        .collect();
    let owned_weapons = state.storage.ledger.owned_weapons(&id).await?;
    let tower_state = state.storage.progress.tower_state(&id).await?;

    Ok(Json(ProfileResponse {
        player,
        upgrades,
        owned_weapons,
        tower_state,
    }))
}

async fn update_profile(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<Player>> {
    let player = state
        .storage
        .players
        .update_profile(
            &id,
            ProfileUpdate {
                player_name: req.player_name.filter(|n| !n.trim().is_empty()),
                gender: req.gender,
                language_preference: req.language_preference,
            },
        )
        .await?;
    Ok(Json(player))
}

async fn update_coins(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateCoinsRequest>,
) -> Result<Json<UpdateCoinsResponse>> {
    let new_coins = state.storage.ledger.adjust_coins(&id, req.coins_change).await?;
    Ok(Json(UpdateCoinsResponse {
        success: true,
        new_coins,
    }))
}

async fn get_upgrades(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<HashMap<String, i32>>> {
    let upgrades = state
        .storage
        .ledger
        .upgrades(&id)
        .await?
        .into_iter()
        .map(|u| (u.upgrade_type, u.level))
        .collect();
    Ok(Json(upgrades))
}

async fn deactivate_player(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state.storage.players.deactivate(&id).await?;
    info!("Deactivated player {}", id);
    Ok(Json(serde_json::json!({ "success": true })))
}
