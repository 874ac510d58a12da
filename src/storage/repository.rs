//! Repository traits - abstraction layer for data access
//!
//! All API handlers interact with data through these traits, so the
//! PostgreSQL backend and the in-memory backend (tests, local runs) are
//! interchangeable.

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{
    Chapter, ChapterSummary, GameSession, InitOutcome, LeaderboardEntry, LevelInfo, NewPlayer,
    NewSession, Player, PlayerWeapon, ProfileUpdate, ProgressRecord, RankedEntry, ScoreSubmission,
    Season, SessionOutcome, SessionStats, TowerRankEntry, TowerState, TowerStateUpdate, Upgrade,
    UpgradePurchase, Weapon, WeaponPurchase,
};

/// Error type shared by all storage backends.
///
/// Domain validation failures are detected before any mutation; `Sqlx` is
/// the only variant signalling the store itself failed, and the only one a
/// caller may reasonably retry.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: i64, need: i64 },
    #[error("upgrade level {requested} out of range (max {max})")]
    LevelOutOfRange { requested: i32, max: i32 },
    #[error("downgrade rejected: level {current} -> {requested}")]
    DowngradeRejected { current: i32, requested: i32 },
    #[error("weapon already owned: {0}")]
    AlreadyOwned(String),
    #[error("weapon not owned: {0}")]
    NotOwned(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

pub type RepoResult<T> = Result<T, StoreError>;

// ============================================================================
// Player directory
// ============================================================================

#[async_trait]
pub trait PlayerRepo: Send + Sync {
    async fn create(&self, new: NewPlayer) -> RepoResult<Player>;
    async fn get(&self, player_id: &str) -> RepoResult<Option<Player>>;
    async fn get_by_email(&self, email: &str) -> RepoResult<Option<Player>>;
    async fn exists(&self, player_id: &str) -> RepoResult<bool>;
    async fn update_profile(&self, player_id: &str, update: ProfileUpdate) -> RepoResult<Player>;
    /// Marks a successful login (last_login_date, is_active).
    async fn touch_login(&self, player_id: &str) -> RepoResult<()>;
    /// Soft-retires the account; rows are never hard-deleted in normal flow.
    async fn deactivate(&self, player_id: &str) -> RepoResult<()>;
}

// ============================================================================
// Player ledger (currency + entitlements)
// ============================================================================

#[async_trait]
pub trait LedgerRepo: Send + Sync {
    /// Adds `amount` (>= 0) to the balance. Returns the new balance.
    async fn credit(&self, player_id: &str, amount: i64) -> RepoResult<i64>;
    /// Removes `amount` (>= 0) from the balance, failing with
    /// `InsufficientFunds` rather than underflowing. Returns the new balance.
    async fn debit(&self, player_id: &str, amount: i64) -> RepoResult<i64>;
    /// Applies a signed delta, flooring the result at zero. This is the
    /// lenient "update coins" client operation, distinct from strict debit.
    async fn adjust_coins(&self, player_id: &str, delta: i64) -> RepoResult<i64>;
    /// Atomically debits `cost` and raises the upgrade entitlement to
    /// `target_level`. Either both happen or neither does.
    async fn purchase_upgrade(
        &self,
        player_id: &str,
        upgrade_type: &str,
        target_level: i32,
        cost: i64,
    ) -> RepoResult<UpgradePurchase>;
    /// Atomically debits the price and records weapon ownership.
    async fn purchase_weapon(
        &self,
        player_id: &str,
        weapon_name: &str,
        cost: i64,
    ) -> RepoResult<WeaponPurchase>;
    /// Sets the equipped weapon; requires ownership unless the weapon is
    /// the catalog default.
    async fn equip_weapon(&self, player_id: &str, weapon_name: &str) -> RepoResult<()>;
    async fn upgrades(&self, player_id: &str) -> RepoResult<Vec<Upgrade>>;
    async fn owned_weapons(&self, player_id: &str) -> RepoResult<Vec<PlayerWeapon>>;
}

// ============================================================================
// Progress tracker
// ============================================================================

#[async_trait]
pub trait ProgressRepo: Send + Sync {
    /// Monotonic merge of a level completion: best score only grows, the
    /// completed flag never reverts, attempts always increment.
    async fn record_completion(
        &self,
        player_id: &str,
        chapter_id: i32,
        level_number: i32,
        score: i64,
    ) -> RepoResult<ProgressRecord>;
    async fn list_for_player(&self, player_id: &str) -> RepoResult<Vec<ProgressRecord>>;
    /// Read-side projection: per-chapter aggregates, no side effects.
    async fn summarize(&self, player_id: &str) -> RepoResult<Vec<ChapterSummary>>;
    async fn tower_state(&self, player_id: &str) -> RepoResult<Option<TowerState>>;
    /// Current floor is a position (set unconditionally); the highest-floor
    /// record and the player's tower record are high-water marks.
    async fn update_tower_state(
        &self,
        player_id: &str,
        update: TowerStateUpdate,
    ) -> RepoResult<TowerState>;
}

// ============================================================================
// Ranking engine storage
// ============================================================================

#[async_trait]
pub trait LeaderboardRepo: Send + Sync {
    /// Creates or monotonically merges the (player, season) entry, then
    /// recomputes the season's ranks if the stored score changed. The whole
    /// operation runs inside the season's critical section.
    async fn submit_score(
        &self,
        player_id: &str,
        season_id: i32,
        score: i64,
        tower_level: i32,
    ) -> RepoResult<ScoreSubmission>;
    /// Idempotently creates a zero-score entry for the season.
    async fn initialize_player(&self, player_id: &str, season_id: i32)
        -> RepoResult<InitOutcome>;
    async fn season_top(&self, season_id: i32, limit: i64) -> RepoResult<Vec<RankedEntry>>;
    async fn player_entries(&self, player_id: &str) -> RepoResult<Vec<RankedEntry>>;
    /// Season-independent board ranked by all-time tower record.
    async fn tower_top(&self, limit: i64) -> RepoResult<Vec<TowerRankEntry>>;
    async fn entry(&self, player_id: &str, season_id: i32)
        -> RepoResult<Option<LeaderboardEntry>>;
}

// ============================================================================
// Season authority (read side; rotation is externally managed)
// ============================================================================

#[async_trait]
pub trait SeasonRepo: Send + Sync {
    async fn current(&self) -> RepoResult<Option<Season>>;
    async fn get(&self, season_id: i32) -> RepoResult<Option<Season>>;
    async fn list(&self) -> RepoResult<Vec<Season>>;
}

// ============================================================================
// Static catalog (chapters, levels, weapons)
// ============================================================================

#[async_trait]
pub trait CatalogRepo: Send + Sync {
    async fn chapters(&self) -> RepoResult<Vec<Chapter>>;
    async fn chapter(&self, chapter_id: i32) -> RepoResult<Option<Chapter>>;
    async fn chapter_levels(&self, chapter_id: i32) -> RepoResult<Vec<LevelInfo>>;
    async fn weapons(&self) -> RepoResult<Vec<Weapon>>;
    async fn weapon(&self, weapon_name: &str) -> RepoResult<Option<Weapon>>;
}

// ============================================================================
// Game sessions
// ============================================================================

#[async_trait]
pub trait SessionRepo: Send + Sync {
    async fn start(&self, new: NewSession) -> RepoResult<GameSession>;
    async fn get(&self, session_id: i64) -> RepoResult<Option<GameSession>>;
    /// Finalizes a session. A tower-mode victory bumps the player's tower
    /// record; coin awards go through the ledger separately.
    async fn complete(&self, session_id: i64, outcome: SessionOutcome) -> RepoResult<GameSession>;
    async fn player_sessions(&self, player_id: &str) -> RepoResult<Vec<GameSession>>;
    async fn player_stats(&self, player_id: &str) -> RepoResult<SessionStats>;
}

// ============================================================================
// Unified Storage Manager
// ============================================================================

/// Central storage manager that holds all repositories.
pub struct StorageManager {
    pub players: Arc<dyn PlayerRepo>,
    pub ledger: Arc<dyn LedgerRepo>,
    pub progress: Arc<dyn ProgressRepo>,
    pub leaderboard: Arc<dyn LeaderboardRepo>,
    pub seasons: Arc<dyn SeasonRepo>,
    pub catalog: Arc<dyn CatalogRepo>,
    pub sessions: Arc<dyn SessionRepo>,
}
