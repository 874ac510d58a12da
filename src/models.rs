//! Record types shared by the storage backends and the API layer.
//!
//! Records are flat and keyed by id; relations are expressed as id
//! references resolved with explicit lookups, never as owned
//! back-references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Maximum level an upgrade entitlement can reach.
pub const MAX_UPGRADE_LEVEL: i32 = 15;

// ============================================================================
// Players
// ============================================================================

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Player {
    pub player_id: String,
    pub player_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub language_preference: Option<String>,
    /// All-time highest tower floor reached. Only ever increases.
    pub tower_record: i32,
    /// Currency balance. Never negative.
    pub coins: i64,
    pub equipped_weapon: Option<String>,
    pub created_date: DateTime<Utc>,
    pub last_login_date: DateTime<Utc>,
    pub is_active: bool,
}

/// Fields required to create a player row.
#[derive(Debug, Clone)]
pub struct NewPlayer {
    pub player_id: String,
    pub player_name: String,
    pub password_hash: String,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub language_preference: Option<String>,
    pub starting_coins: i64,
}

/// Partial profile update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub player_name: Option<String>,
    pub gender: Option<String>,
    pub language_preference: Option<String>,
}

// ============================================================================
// Entitlements (upgrades + weapons)
// ============================================================================

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Upgrade {
    pub player_id: String,
    pub upgrade_type: String,
    /// Monotonically non-decreasing, capped at [`MAX_UPGRADE_LEVEL`].
    pub level: i32,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PlayerWeapon {
    pub player_id: String,
    pub weapon_name: String,
    pub purchase_date: DateTime<Utc>,
}

/// Catalog entry. Exactly one weapon carries `is_default = true` and is
/// usable without ownership.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Weapon {
    pub weapon_name: String,
    pub price: i64,
    pub description: Option<String>,
    pub is_default: bool,
}

/// Result of an atomic upgrade purchase.
#[derive(Debug, Clone, Serialize)]
pub struct UpgradePurchase {
    pub upgrade_type: String,
    pub level: i32,
    pub balance: i64,
}

/// Result of an atomic weapon purchase.
#[derive(Debug, Clone, Serialize)]
pub struct WeaponPurchase {
    pub weapon_name: String,
    pub balance: i64,
    pub owned_weapons: Vec<String>,
}

// ============================================================================
// Progress
// ============================================================================

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProgressRecord {
    pub player_id: String,
    pub chapter_id: i32,
    pub level_number: i32,
    /// Once true, never reverts.
    pub is_completed: bool,
    /// Monotonically non-decreasing.
    pub best_score: i64,
    pub completion_date: Option<DateTime<Utc>>,
    pub attempts: i32,
}

/// Per-chapter aggregate computed from progress records.
#[derive(Debug, Clone, Serialize)]
pub struct ChapterSummary {
    pub chapter_id: i32,
    pub chapter_name: String,
    pub levels_completed: i64,
    pub levels_attempted: i64,
    pub best_score: i64,
    pub completion_percentage: f64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TowerState {
    pub player_id: String,
    /// Current position in the tower; may decrease.
    pub current_floor: i32,
    /// High-water mark; only ever increases.
    pub highest_floor: i32,
    pub current_health: i32,
    pub excess_health: i32,
    pub shield_points: i32,
    pub power_points: i32,
    pub last_play_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TowerStateUpdate {
    pub current_floor: i32,
    pub current_health: i32,
    pub excess_health: i32,
    pub shield_points: i32,
    pub power_points: i32,
}

// ============================================================================
// Leaderboard
// ============================================================================

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LeaderboardEntry {
    pub entry_id: i64,
    pub player_id: String,
    pub season_id: i32,
    /// Monotonically non-decreasing; merged with strictly-greater wins.
    pub score: i64,
    pub tower_level: i32,
    /// Derived by the ranking engine; never client-supplied.
    pub rank: i32,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

/// Leaderboard entry joined with the player's display name.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RankedEntry {
    pub entry_id: i64,
    pub player_id: String,
    pub player_name: String,
    pub season_id: i32,
    pub score: i64,
    pub tower_level: i32,
    pub rank: i32,
    pub updated_date: DateTime<Utc>,
}

/// Tower leaderboard row, ranked by all-time tower record (season-free).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TowerRankEntry {
    pub rank: i32,
    pub player_id: String,
    pub player_name: String,
    pub tower_record: i32,
    pub last_login_date: DateTime<Utc>,
}

/// Outcome of a score submission.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreSubmission {
    pub entry: LeaderboardEntry,
    /// False when the submission was a monotonic no-op.
    pub updated: bool,
    /// True when the stored score changed and the season was re-ranked.
    pub recomputed: bool,
}

/// Outcome of idempotent leaderboard initialization.
#[derive(Debug, Clone)]
pub enum InitOutcome {
    Created(LeaderboardEntry),
    AlreadyInitialized(LeaderboardEntry),
}

impl InitOutcome {
    pub fn entry(&self) -> &LeaderboardEntry {
        match self {
            InitOutcome::Created(e) | InitOutcome::AlreadyInitialized(e) => e,
        }
    }
}

// ============================================================================
// Seasons
// ============================================================================

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Season {
    pub season_id: i32,
    pub season_number: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
}

// ============================================================================
// Chapters & levels (static catalog)
// ============================================================================

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Chapter {
    pub chapter_id: i32,
    pub chapter_name: String,
    pub description: Option<String>,
    pub is_unlocked: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LevelInfo {
    pub chapter_id: i32,
    pub level_number: i32,
    pub level_name: String,
    pub enemy_type: String,
    pub enemy_max_health: i32,
}

// ============================================================================
// Game sessions
// ============================================================================

pub const GAME_MODE_CHAPTER: &str = "chapter";
pub const GAME_MODE_TOWER: &str = "tower";

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct GameSession {
    pub session_id: i64,
    pub player_id: String,
    /// `"chapter"` or `"tower"`, validated at the API boundary.
    pub game_mode: String,
    pub chapter_id: Option<i32>,
    pub level_number: Option<i32>,
    pub tower_floor: Option<i32>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_completed: bool,
    pub final_score: Option<i64>,
    pub victory: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub player_id: String,
    pub game_mode: String,
    pub chapter_id: Option<i32>,
    pub level_number: Option<i32>,
    pub tower_floor: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub final_score: i64,
    pub victory: bool,
}

/// Aggregate over a player's completed sessions.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub total_games_played: i64,
    pub total_games_won: i64,
    pub total_score: i64,
    pub average_score: f64,
    pub win_rate: f64,
    pub chapter_games: i64,
    pub tower_games: i64,
    pub highest_tower_floor: i32,
}
