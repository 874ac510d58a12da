//! EconomyService — weapon shop and upgrade purchase endpoints
//!
//! Endpoints:
//! - GET  /api/economy/weapons
//! - GET  /api/economy/player/{id}/weapons
//! - POST /api/economy/purchase-upgrade
//! - POST /api/economy/purchase-weapon
//! - POST /api/economy/equip-weapon
//!
//! Purchases are atomic in the storage layer: the debit and the
//! entitlement grant land together or not at all.

use std::sync::atomic::Ordering;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, Result};
use crate::models::{PlayerWeapon, UpgradePurchase, Weapon, WeaponPurchase};

use super::ApiState;

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/api/economy/weapons", get(list_weapons))
        .route("/api/economy/player/{id}/weapons", get(player_weapons))
        .route("/api/economy/purchase-upgrade", post(purchase_upgrade))
        .route("/api/economy/purchase-weapon", post(purchase_weapon))
        .route("/api/economy/equip-weapon", post(equip_weapon))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct PurchaseUpgradeRequest {
    pub player_id: String,
    pub upgrade_type: String,
    pub target_level: i32,
    pub cost: i64,
}

#[derive(Deserialize)]
pub struct PurchaseWeaponRequest {
    pub player_id: String,
    pub weapon_name: String,
    /// Falls back to the catalog price when omitted.
    pub cost: Option<i64>,
}

#[derive(Deserialize)]
pub struct EquipWeaponRequest {
    pub player_id: String,
    pub weapon_name: String,
}

#[derive(Serialize)]
pub struct EquipWeaponResponse {
    pub success: bool,
    pub equipped_weapon: String,
}

#[derive(Serialize)]
pub struct PlayerWeaponsResponse {
    pub equipped_weapon: Option<String>,
    pub owned: Vec<PlayerWeapon>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_weapons(State(state): State<ApiState>) -> Result<Json<Vec<Weapon>>> {
    Ok(Json(state.storage.catalog.weapons().await?))
}

async fn player_weapons(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<PlayerWeaponsResponse>> {
    let player = state
        .storage
        .players
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("player {}", id)))?;
    let owned = state.storage.ledger.owned_weapons(&id).await?;
    Ok(Json(PlayerWeaponsResponse {
        equipped_weapon: player.equipped_weapon,
        owned,
    }))
}

async fn purchase_upgrade(
    State(state): State<ApiState>,
    Json(req): Json<PurchaseUpgradeRequest>,
) -> Result<Json<UpgradePurchase>> {
    let upgrade_type = req.upgrade_type.trim().to_lowercase();
    if upgrade_type.is_empty() {
        return Err(ApiError::Validation("upgrade_type is required".to_string()));
    }
    if req.target_level < 1 {
        return Err(ApiError::Validation(
            "target_level must be at least 1".to_string(),
        ));
    }

    let purchase = state
        .storage
        .ledger
        .purchase_upgrade(&req.player_id, &upgrade_type, req.target_level, req.cost)
        .await?;

    state.metrics.purchases.fetch_add(1, Ordering::Relaxed);
    info!(
        "Player {} upgraded {} to level {} (cost {})",
        req.player_id, purchase.upgrade_type, purchase.level, req.cost
    );
    Ok(Json(purchase))
}

async fn purchase_weapon(
    State(state): State<ApiState>,
    Json(req): Json<PurchaseWeaponRequest>,
) -> Result<Json<WeaponPurchase>> {
    let cost = match req.cost {
        Some(cost) => cost,
        None => {
            state
                .storage
                .catalog
                .weapon(&req.weapon_name)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("weapon {}", req.weapon_name)))?
                .price
        }
    };

    let purchase = state
        .storage
        .ledger
        .purchase_weapon(&req.player_id, &req.weapon_name, cost)
        .await?;

    state.metrics.purchases.fetch_add(1, Ordering::Relaxed);
    info!(
        "Player {} bought {} (cost {}, balance {})",
        req.player_id, purchase.weapon_name, cost, purchase.balance
    );
    Ok(Json(purchase))
}

async fn equip_weapon(
    State(state): State<ApiState>,
    Json(req): Json<EquipWeaponRequest>,
) -> Result<Json<EquipWeaponResponse>> {
    state
        .storage
        .ledger
        .equip_weapon(&req.player_id, &req.weapon_name)
        .await?;
    Ok(Json(EquipWeaponResponse {
        success: true,
        equipped_weapon: req.weapon_name,
    }))
}
