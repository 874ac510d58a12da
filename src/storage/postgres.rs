//! PostgreSQL Storage - player data persistence
//!
//! All mutable game state lives in PostgreSQL. Uses `sqlx` for async
//! queries; multi-step atomic units (debit + entitlement grant, rank
//! recompute + persist) run inside explicit transactions.
//!
//! ## Tables
//! - players, upgrades, weapons, player_weapons
//! - player_progress, tower_progress
//! - seasons, leaderboard
//! - chapters, levels, game_sessions

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use tracing::{debug, info};

use crate::models::{
    Chapter, ChapterSummary, GameSession, InitOutcome, LeaderboardEntry, LevelInfo, NewPlayer,
    NewSession, Player, PlayerWeapon, ProfileUpdate, ProgressRecord, RankedEntry, ScoreSubmission,
    Season, SessionOutcome, SessionStats, TowerRankEntry, TowerState, TowerStateUpdate, Upgrade,
    UpgradePurchase, Weapon, WeaponPurchase, GAME_MODE_TOWER, MAX_UPGRADE_LEVEL,
};
use crate::ranking;

use super::migrations;
use super::repository::{
    CatalogRepo, LedgerRepo, LeaderboardRepo, PlayerRepo, ProgressRepo, RepoResult, SeasonRepo,
    SessionRepo, StoreError,
};

/// Advisory-lock class for per-season leaderboard recomputes. The second
/// lock key is the season id, so recomputes for different seasons can run
/// in parallel while one season's are serialized.
const SEASON_LOCK_CLASS: i32 = 0x4d54;

/// PostgreSQL connection pool wrapper
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

impl PostgresStore {
    /// Connect to PostgreSQL and run migrations
    pub async fn new(database_url: &str, max_connections: u32) -> RepoResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("PostgreSQL connected (max_connections={})", max_connections);

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Connect with an existing pool (for testing / shared pools)
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run all pending migrations
    pub async fn run_migrations(&self) -> RepoResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS _migrations (
                name VARCHAR(100) PRIMARY KEY,
                applied_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )",
        )
        .execute(&self.pool)
        .await?;

        for (name, sql) in migrations::get_migrations() {
            let applied: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM _migrations WHERE name = $1)")
                    .bind(name)
                    .fetch_one(&self.pool)
                    .await?;

            if !applied {
                info!("Running migration: {}", name);
                sqlx::raw_sql(sql).execute(&self.pool).await?;

                sqlx::query("INSERT INTO _migrations (name) VALUES ($1)")
                    .bind(name)
                    .execute(&self.pool)
                    .await?;

                info!("Migration applied: {}", name);
            } else {
                debug!("Migration already applied: {}", name);
            }
        }

        Ok(())
    }

    async fn require_exists(&self, player_id: &str) -> RepoResult<()> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM players WHERE player_id = $1)")
                .bind(player_id)
                .fetch_one(&self.pool)
                .await?;
        if exists {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("player {}", player_id)))
        }
    }
}

const PLAYER_COLUMNS: &str = "player_id, player_name, password_hash, email, gender, \
     language_preference, tower_record, coins, equipped_weapon, created_date, \
     last_login_date, is_active";

// ============================================================================
// PlayerRepo
// ============================================================================

#[async_trait]
impl PlayerRepo for PostgresStore {
    async fn create(&self, new: NewPlayer) -> RepoResult<Player> {
        let result = sqlx::query_as::<_, Player>(&format!(
            "INSERT INTO players (player_id, player_name, password_hash, email, gender,
                    language_preference, coins)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {}",
            PLAYER_COLUMNS
        ))
        .bind(&new.player_id)
        .bind(&new.player_name)
        .bind(&new.password_hash)
        .bind(&new.email)
        .bind(&new.gender)
        .bind(&new.language_preference)
        .bind(new.starting_coins)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(player) => {
                info!("Created player: {} ({})", player.player_name, player.player_id);
                Ok(player)
            }
            Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict(format!(
                "player {} already registered",
                new.player_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, player_id: &str) -> RepoResult<Option<Player>> {
        let row = sqlx::query_as::<_, Player>(&format!(
            "SELECT {} FROM players WHERE player_id = $1",
            PLAYER_COLUMNS
        ))
        .bind(player_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_by_email(&self, email: &str) -> RepoResult<Option<Player>> {
        let row = sqlx::query_as::<_, Player>(&format!(
            "SELECT {} FROM players WHERE email = $1",
            PLAYER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn exists(&self, player_id: &str) -> RepoResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM players WHERE player_id = $1)")
                .bind(player_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn update_profile(&self, player_id: &str, update: ProfileUpdate) -> RepoResult<Player> {
        let row = sqlx::query_as::<_, Player>(&format!(
            "UPDATE players SET
                player_name = COALESCE($2, player_name),
                gender = COALESCE($3, gender),
                language_preference = COALESCE($4, language_preference),
                last_login_date = NOW()
             WHERE player_id = $1
             RETURNING {}",
            PLAYER_COLUMNS
        ))
        .bind(player_id)
        .bind(&update.player_name)
        .bind(&update.gender)
        .bind(&update.language_preference)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("player {}", player_id)))?;
        Ok(row)
    }

    async fn touch_login(&self, player_id: &str) -> RepoResult<()> {
        let result =
            sqlx::query("UPDATE players SET last_login_date = NOW(), is_active = TRUE WHERE player_id = $1")
                .bind(player_id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("player {}", player_id)));
        }
        Ok(())
    }

    async fn deactivate(&self, player_id: &str) -> RepoResult<()> {
        let result = sqlx::query("UPDATE players SET is_active = FALSE WHERE player_id = $1")
            .bind(player_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("player {}", player_id)));
        }
        Ok(())
    }
}

// ============================================================================
// LedgerRepo
// ============================================================================

#[async_trait]
impl LedgerRepo for PostgresStore {
    async fn credit(&self, player_id: &str, amount: i64) -> RepoResult<i64> {
        if amount < 0 {
            return Err(StoreError::InvalidAmount(format!(
                "credit amount must be non-negative, got {}",
                amount
            )));
        }
        let new_coins: i64 = sqlx::query_scalar(
            "UPDATE players SET coins = coins + $2 WHERE player_id = $1 RETURNING coins",
        )
        .bind(player_id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("player {}", player_id)))?;
        Ok(new_coins)
    }

    async fn debit(&self, player_id: &str, amount: i64) -> RepoResult<i64> {
        if amount < 0 {
            return Err(StoreError::InvalidAmount(format!(
                "debit amount must be non-negative, got {}",
                amount
            )));
        }
        let mut tx = self.pool.begin().await?;

        let coins: i64 = sqlx::query_scalar("SELECT coins FROM players WHERE player_id = $1 FOR UPDATE")
            .bind(player_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("player {}", player_id)))?;

        if coins < amount {
            return Err(StoreError::InsufficientFunds {
                have: coins,
                need: amount,
            });
        }

        let new_coins: i64 = sqlx::query_scalar(
            "UPDATE players SET coins = coins - $2 WHERE player_id = $1 RETURNING coins",
        )
        .bind(player_id)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(new_coins)
    }

    async fn adjust_coins(&self, player_id: &str, delta: i64) -> RepoResult<i64> {
        let new_coins: i64 = sqlx::query_scalar(
            "UPDATE players SET coins = GREATEST(coins + $2, 0) WHERE player_id = $1 RETURNING coins",
        )
        .bind(player_id)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("player {}", player_id)))?;
        Ok(new_coins)
    }

    async fn purchase_upgrade(
        &self,
        player_id: &str,
        upgrade_type: &str,
        target_level: i32,
        cost: i64,
    ) -> RepoResult<UpgradePurchase> {
        if cost < 0 {
            return Err(StoreError::InvalidAmount(format!(
                "cost must be non-negative, got {}",
                cost
            )));
        }
        if target_level > MAX_UPGRADE_LEVEL {
            return Err(StoreError::LevelOutOfRange {
                requested: target_level,
                max: MAX_UPGRADE_LEVEL,
            });
        }

        let mut tx = self.pool.begin().await?;

        let coins: i64 = sqlx::query_scalar("SELECT coins FROM players WHERE player_id = $1 FOR UPDATE")
            .bind(player_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("player {}", player_id)))?;

        let current: i32 = sqlx::query_scalar(
            "SELECT level FROM upgrades WHERE player_id = $1 AND upgrade_type = $2 FOR UPDATE",
        )
        .bind(player_id)
        .bind(upgrade_type)
        .fetch_optional(&mut *tx)
        .await?
        .unwrap_or(0);

        if target_level < current {
            return Err(StoreError::DowngradeRejected {
                current,
                requested: target_level,
            });
        }
        if coins < cost {
            return Err(StoreError::InsufficientFunds {
                have: coins,
                need: cost,
            });
        }

        // Debit and grant in one transaction.
        let balance: i64 = sqlx::query_scalar(
            "UPDATE players SET coins = coins - $2 WHERE player_id = $1 RETURNING coins",
        )
        .bind(player_id)
        .bind(cost)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO upgrades (player_id, upgrade_type, level)
             VALUES ($1, $2, $3)
             ON CONFLICT (player_id, upgrade_type)
             DO UPDATE SET level = $3, updated_date = NOW()",
        )
        .bind(player_id)
        .bind(upgrade_type)
        .bind(target_level)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(UpgradePurchase {
            upgrade_type: upgrade_type.to_string(),
            level: target_level,
            balance,
        })
    }

    async fn purchase_weapon(
        &self,
        player_id: &str,
        weapon_name: &str,
        cost: i64,
    ) -> RepoResult<WeaponPurchase> {
        if cost < 0 {
            return Err(StoreError::InvalidAmount(format!(
                "cost must be non-negative, got {}",
                cost
            )));
        }
        let mut tx = self.pool.begin().await?;

        let is_default: bool =
            sqlx::query_scalar("SELECT is_default FROM weapons WHERE weapon_name = $1")
                .bind(weapon_name)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("weapon {}", weapon_name)))?;

        let owned: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM player_weapons WHERE player_id = $1 AND weapon_name = $2)",
        )
        .bind(player_id)
        .bind(weapon_name)
        .fetch_one(&mut *tx)
        .await?;

        if is_default || owned {
            return Err(StoreError::AlreadyOwned(weapon_name.to_string()));
        }

        let coins: i64 = sqlx::query_scalar("SELECT coins FROM players WHERE player_id = $1 FOR UPDATE")
            .bind(player_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("player {}", player_id)))?;

        if coins < cost {
            return Err(StoreError::InsufficientFunds {
                have: coins,
                need: cost,
            });
        }

        let balance: i64 = sqlx::query_scalar(
            "UPDATE players SET coins = coins - $2 WHERE player_id = $1 RETURNING coins",
        )
        .bind(player_id)
        .bind(cost)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO player_weapons (player_id, weapon_name) VALUES ($1, $2)")
            .bind(player_id)
            .bind(weapon_name)
            .execute(&mut *tx)
            .await?;

        let owned_weapons: Vec<String> = sqlx::query_scalar(
            "SELECT weapon_name FROM player_weapons WHERE player_id = $1 ORDER BY weapon_name",
        )
        .bind(player_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(WeaponPurchase {
            weapon_name: weapon_name.to_string(),
            balance,
            owned_weapons,
        })
    }

    async fn equip_weapon(&self, player_id: &str, weapon_name: &str) -> RepoResult<()> {
        let is_default: bool =
            sqlx::query_scalar("SELECT is_default FROM weapons WHERE weapon_name = $1")
                .bind(weapon_name)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("weapon {}", weapon_name)))?;

        if !is_default {
            let owned: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM player_weapons WHERE player_id = $1 AND weapon_name = $2)",
            )
            .bind(player_id)
            .bind(weapon_name)
            .fetch_one(&self.pool)
            .await?;
            if !owned {
                return Err(StoreError::NotOwned(weapon_name.to_string()));
            }
        }

        let result = sqlx::query("UPDATE players SET equipped_weapon = $2 WHERE player_id = $1")
            .bind(player_id)
            .bind(weapon_name)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("player {}", player_id)));
        }
        Ok(())
    }

    async fn upgrades(&self, player_id: &str) -> RepoResult<Vec<Upgrade>> {
        self.require_exists(player_id).await?;
        let rows = sqlx::query_as::<_, Upgrade>(
            "SELECT player_id, upgrade_type, level, created_date, updated_date
             FROM upgrades WHERE player_id = $1 ORDER BY upgrade_type",
        )
        .bind(player_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn owned_weapons(&self, player_id: &str) -> RepoResult<Vec<PlayerWeapon>> {
        self.require_exists(player_id).await?;
        let rows = sqlx::query_as::<_, PlayerWeapon>(
            "SELECT player_id, weapon_name, purchase_date
             FROM player_weapons WHERE player_id = $1 ORDER BY weapon_name",
        )
        .bind(player_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

// ============================================================================
// ProgressRepo
// ============================================================================

#[async_trait]
impl ProgressRepo for PostgresStore {
    async fn record_completion(
        &self,
        player_id: &str,
        chapter_id: i32,
        level_number: i32,
        score: i64,
    ) -> RepoResult<ProgressRecord> {
        self.require_exists(player_id).await?;
        let chapter_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM chapters WHERE chapter_id = $1)")
                .bind(chapter_id)
                .fetch_one(&self.pool)
                .await?;
        if !chapter_exists {
            return Err(StoreError::NotFound(format!("chapter {}", chapter_id)));
        }

        let row = sqlx::query_as::<_, ProgressRecord>(
            "INSERT INTO player_progress
                (player_id, chapter_id, level_number, is_completed, best_score, completion_date, attempts)
             VALUES ($1, $2, $3, TRUE, $4, NOW(), 1)
             ON CONFLICT (player_id, chapter_id, level_number) DO UPDATE SET
                attempts = player_progress.attempts + 1,
                best_score = GREATEST(player_progress.best_score, $4),
                completion_date = CASE
                    WHEN $4 > player_progress.best_score OR NOT player_progress.is_completed
                        THEN NOW()
                    ELSE player_progress.completion_date
                END,
                is_completed = TRUE
             RETURNING player_id, chapter_id, level_number, is_completed, best_score,
                       completion_date, attempts",
        )
        .bind(player_id)
        .bind(chapter_id)
        .bind(level_number)
        .bind(score)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn list_for_player(&self, player_id: &str) -> RepoResult<Vec<ProgressRecord>> {
        self.require_exists(player_id).await?;
        let rows = sqlx::query_as::<_, ProgressRecord>(
            "SELECT player_id, chapter_id, level_number, is_completed, best_score,
                    completion_date, attempts
             FROM player_progress WHERE player_id = $1
             ORDER BY chapter_id, level_number",
        )
        .bind(player_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn summarize(&self, player_id: &str) -> RepoResult<Vec<ChapterSummary>> {
        self.require_exists(player_id).await?;

        #[derive(FromRow)]
        struct SummaryRow {
            chapter_id: i32,
            chapter_name: String,
            levels_attempted: i64,
            levels_completed: i64,
            best_score: i64,
        }

        let rows = sqlx::query_as::<_, SummaryRow>(
            "SELECT pp.chapter_id,
                    COALESCE(c.chapter_name, 'Chapter ' || pp.chapter_id) AS chapter_name,
                    COUNT(*) AS levels_attempted,
                    COUNT(*) FILTER (WHERE pp.is_completed) AS levels_completed,
                    COALESCE(MAX(pp.best_score), 0) AS best_score
             FROM player_progress pp
             LEFT JOIN chapters c ON c.chapter_id = pp.chapter_id
             WHERE pp.player_id = $1
             GROUP BY pp.chapter_id, c.chapter_name
             ORDER BY pp.chapter_id",
        )
        .bind(player_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ChapterSummary {
                chapter_id: r.chapter_id,
                chapter_name: r.chapter_name,
                levels_completed: r.levels_completed,
                levels_attempted: r.levels_attempted,
                best_score: r.best_score,
                completion_percentage: if r.levels_attempted > 0 {
                    r.levels_completed as f64 / r.levels_attempted as f64 * 100.0
                } else {
                    0.0
                },
            })
            .collect())
    }

    async fn tower_state(&self, player_id: &str) -> RepoResult<Option<TowerState>> {
        self.require_exists(player_id).await?;
        let row = sqlx::query_as::<_, TowerState>(
            "SELECT player_id, current_floor, highest_floor, current_health, excess_health,
                    shield_points, power_points, last_play_date
             FROM tower_progress WHERE player_id = $1",
        )
        .bind(player_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_tower_state(
        &self,
        player_id: &str,
        update: TowerStateUpdate,
    ) -> RepoResult<TowerState> {
        self.require_exists(player_id).await?;
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, TowerState>(
            "INSERT INTO tower_progress
                (player_id, current_floor, highest_floor, current_health, excess_health,
                 shield_points, power_points, last_play_date)
             VALUES ($1, $2, $2, $3, $4, $5, $6, NOW())
             ON CONFLICT (player_id) DO UPDATE SET
                current_floor = $2,
                highest_floor = GREATEST(tower_progress.highest_floor, $2),
                current_health = $3,
                excess_health = $4,
                shield_points = $5,
                power_points = $6,
                last_play_date = NOW()
             RETURNING player_id, current_floor, highest_floor, current_health, excess_health,
                       shield_points, power_points, last_play_date",
        )
        .bind(player_id)
        .bind(update.current_floor)
        .bind(update.current_health)
        .bind(update.excess_health)
        .bind(update.shield_points)
        .bind(update.power_points)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE players SET tower_record = GREATEST(tower_record, $2) WHERE player_id = $1",
        )
        .bind(player_id)
        .bind(update.current_floor)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row)
    }
}

// ============================================================================
// LeaderboardRepo
// ============================================================================

const ENTRY_COLUMNS: &str =
    "entry_id, player_id, season_id, score, tower_level, rank, created_date, updated_date";

impl PostgresStore {
    /// Recomputes dense ranks for a season inside an open transaction. The
    /// caller must already hold the season's advisory lock.
    async fn recompute_ranks(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        season_id: i32,
    ) -> RepoResult<()> {
        let mut entries = sqlx::query_as::<_, LeaderboardEntry>(&format!(
            "SELECT {} FROM leaderboard WHERE season_id = $1",
            ENTRY_COLUMNS
        ))
        .bind(season_id)
        .fetch_all(&mut **tx)
        .await?;

        ranking::assign_ranks(&mut entries);

        for entry in &entries {
            sqlx::query("UPDATE leaderboard SET rank = $2 WHERE entry_id = $1")
                .bind(entry.entry_id)
                .bind(entry.rank)
                .execute(&mut **tx)
                .await?;
        }

        debug!("Recomputed ranks for season {} ({} entries)", season_id, entries.len());
        Ok(())
    }

    async fn require_season(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        season_id: i32,
    ) -> RepoResult<()> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM seasons WHERE season_id = $1)")
                .bind(season_id)
                .fetch_one(&mut **tx)
                .await?;
        if exists {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("season {}", season_id)))
        }
    }
}

#[async_trait]
impl LeaderboardRepo for PostgresStore {
    async fn submit_score(
        &self,
        player_id: &str,
        season_id: i32,
        score: i64,
        tower_level: i32,
    ) -> RepoResult<ScoreSubmission> {
        self.require_exists(player_id).await?;
        let mut tx = self.pool.begin().await?;

        // Serialize all rank recomputes for this season.
        sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
            .bind(SEASON_LOCK_CLASS)
            .bind(season_id)
            .execute(&mut *tx)
            .await?;

        Self::require_season(&mut tx, season_id).await?;

        let existing = sqlx::query_as::<_, LeaderboardEntry>(&format!(
            "SELECT {} FROM leaderboard WHERE player_id = $1 AND season_id = $2 FOR UPDATE",
            ENTRY_COLUMNS
        ))
        .bind(player_id)
        .bind(season_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (entry_id, score_changed, updated) = match existing {
            Some(entry) => {
                let score_changed = ranking::improves(entry.score, score);
                let tower_changed = tower_level > entry.tower_level;
                if score_changed || tower_changed {
                    sqlx::query(
                        "UPDATE leaderboard SET
                            score = GREATEST(score, $2),
                            tower_level = GREATEST(tower_level, $3),
                            updated_date = NOW()
                         WHERE entry_id = $1",
                    )
                    .bind(entry.entry_id)
                    .bind(score)
                    .bind(tower_level)
                    .execute(&mut *tx)
                    .await?;
                }
                (entry.entry_id, score_changed, score_changed || tower_changed)
            }
            None => {
                let entry_id: i64 = sqlx::query_scalar(
                    "INSERT INTO leaderboard (player_id, season_id, score, tower_level)
                     VALUES ($1, $2, $3, $4) RETURNING entry_id",
                )
                .bind(player_id)
                .bind(season_id)
                .bind(score)
                .bind(tower_level)
                .fetch_one(&mut *tx)
                .await?;
                (entry_id, true, true)
            }
        };

        if score_changed {
            Self::recompute_ranks(&mut tx, season_id).await?;
        }

        let entry = sqlx::query_as::<_, LeaderboardEntry>(&format!(
            "SELECT {} FROM leaderboard WHERE entry_id = $1",
            ENTRY_COLUMNS
        ))
        .bind(entry_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ScoreSubmission {
            entry,
            updated,
            recomputed: score_changed,
        })
    }

    async fn initialize_player(
        &self,
        player_id: &str,
        season_id: i32,
    ) -> RepoResult<InitOutcome> {
        self.require_exists(player_id).await?;
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
            .bind(SEASON_LOCK_CLASS)
            .bind(season_id)
            .execute(&mut *tx)
            .await?;

        Self::require_season(&mut tx, season_id).await?;

        let existing = sqlx::query_as::<_, LeaderboardEntry>(&format!(
            "SELECT {} FROM leaderboard WHERE player_id = $1 AND season_id = $2",
            ENTRY_COLUMNS
        ))
        .bind(player_id)
        .bind(season_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(entry) = existing {
            tx.commit().await?;
            return Ok(InitOutcome::AlreadyInitialized(entry));
        }

        let entry_id: i64 = sqlx::query_scalar(
            "INSERT INTO leaderboard (player_id, season_id, score, tower_level)
             VALUES ($1, $2, 0, 0) RETURNING entry_id",
        )
        .bind(player_id)
        .bind(season_id)
        .fetch_one(&mut *tx)
        .await?;

        Self::recompute_ranks(&mut tx, season_id).await?;

        let entry = sqlx::query_as::<_, LeaderboardEntry>(&format!(
            "SELECT {} FROM leaderboard WHERE entry_id = $1",
            ENTRY_COLUMNS
        ))
        .bind(entry_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(InitOutcome::Created(entry))
    }

    async fn season_top(&self, season_id: i32, limit: i64) -> RepoResult<Vec<RankedEntry>> {
        let rows = sqlx::query_as::<_, RankedEntry>(
            "SELECT l.entry_id, l.player_id, p.player_name, l.season_id, l.score,
                    l.tower_level, l.rank, l.updated_date
             FROM leaderboard l
             JOIN players p ON p.player_id = l.player_id
             WHERE l.season_id = $1
             ORDER BY l.rank ASC
             LIMIT $2",
        )
        .bind(season_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn player_entries(&self, player_id: &str) -> RepoResult<Vec<RankedEntry>> {
        let rows = sqlx::query_as::<_, RankedEntry>(
            "SELECT l.entry_id, l.player_id, p.player_name, l.season_id, l.score,
                    l.tower_level, l.rank, l.updated_date
             FROM leaderboard l
             JOIN players p ON p.player_id = l.player_id
             WHERE l.player_id = $1
             ORDER BY l.updated_date DESC",
        )
        .bind(player_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn tower_top(&self, limit: i64) -> RepoResult<Vec<TowerRankEntry>> {
        let rows = sqlx::query_as::<_, TowerRankEntry>(
            "SELECT CAST(ROW_NUMBER() OVER (ORDER BY tower_record DESC, player_id ASC) AS INT) AS rank,
                    player_id, player_name, tower_record, last_login_date
             FROM players
             WHERE tower_record > 0
             ORDER BY tower_record DESC, player_id ASC
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn entry(
        &self,
        player_id: &str,
        season_id: i32,
    ) -> RepoResult<Option<LeaderboardEntry>> {
        let row = sqlx::query_as::<_, LeaderboardEntry>(&format!(
            "SELECT {} FROM leaderboard WHERE player_id = $1 AND season_id = $2",
            ENTRY_COLUMNS
        ))
        .bind(player_id)
        .bind(season_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

// ============================================================================
// SeasonRepo / CatalogRepo
// ============================================================================

#[async_trait]
impl SeasonRepo for PostgresStore {
    async fn current(&self) -> RepoResult<Option<Season>> {
        let row = sqlx::query_as::<_, Season>(
            "SELECT season_id, season_number, start_date, end_date, is_active
             FROM seasons WHERE is_active = TRUE
             ORDER BY season_number DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get(&self, season_id: i32) -> RepoResult<Option<Season>> {
        let row = sqlx::query_as::<_, Season>(
            "SELECT season_id, season_number, start_date, end_date, is_active
             FROM seasons WHERE season_id = $1",
        )
        .bind(season_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list(&self) -> RepoResult<Vec<Season>> {
        let rows = sqlx::query_as::<_, Season>(
            "SELECT season_id, season_number, start_date, end_date, is_active
             FROM seasons ORDER BY season_number",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl CatalogRepo for PostgresStore {
    async fn chapters(&self) -> RepoResult<Vec<Chapter>> {
        let rows = sqlx::query_as::<_, Chapter>(
            "SELECT chapter_id, chapter_name, description, is_unlocked
             FROM chapters ORDER BY chapter_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn chapter(&self, chapter_id: i32) -> RepoResult<Option<Chapter>> {
        let row = sqlx::query_as::<_, Chapter>(
            "SELECT chapter_id, chapter_name, description, is_unlocked
             FROM chapters WHERE chapter_id = $1",
        )
        .bind(chapter_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn chapter_levels(&self, chapter_id: i32) -> RepoResult<Vec<LevelInfo>> {
        let rows = sqlx::query_as::<_, LevelInfo>(
            "SELECT chapter_id, level_number, level_name, enemy_type, enemy_max_health
             FROM levels WHERE chapter_id = $1 ORDER BY level_number",
        )
        .bind(chapter_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn weapons(&self) -> RepoResult<Vec<Weapon>> {
        let rows = sqlx::query_as::<_, Weapon>(
            "SELECT weapon_name, price, description, is_default
             FROM weapons ORDER BY weapon_name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn weapon(&self, weapon_name: &str) -> RepoResult<Option<Weapon>> {
        let row = sqlx::query_as::<_, Weapon>(
            "SELECT weapon_name, price, description, is_default
             FROM weapons WHERE weapon_name = $1",
        )
        .bind(weapon_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

// ============================================================================
// SessionRepo
// ============================================================================

const SESSION_COLUMNS: &str = "session_id, player_id, game_mode, chapter_id, level_number, \
     tower_floor, start_time, end_time, is_completed, final_score, victory";

#[async_trait]
impl SessionRepo for PostgresStore {
    async fn start(&self, new: NewSession) -> RepoResult<GameSession> {
        self.require_exists(&new.player_id).await?;
        let row = sqlx::query_as::<_, GameSession>(&format!(
            "INSERT INTO game_sessions (player_id, game_mode, chapter_id, level_number, tower_floor)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(&new.player_id)
        .bind(&new.game_mode)
        .bind(new.chapter_id)
        .bind(new.level_number)
        .bind(new.tower_floor)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get(&self, session_id: i64) -> RepoResult<Option<GameSession>> {
        let row = sqlx::query_as::<_, GameSession>(&format!(
            "SELECT {} FROM game_sessions WHERE session_id = $1",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn complete(&self, session_id: i64, outcome: SessionOutcome) -> RepoResult<GameSession> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, GameSession>(&format!(
            "UPDATE game_sessions SET
                end_time = NOW(), is_completed = TRUE, final_score = $2, victory = $3
             WHERE session_id = $1
             RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .bind(outcome.final_score)
        .bind(outcome.victory)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("session {}", session_id)))?;

        if row.game_mode == GAME_MODE_TOWER && outcome.victory {
            if let Some(floor) = row.tower_floor {
                sqlx::query(
                    "UPDATE players SET tower_record = GREATEST(tower_record, $2)
                     WHERE player_id = $1",
                )
                .bind(&row.player_id)
                .bind(floor)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(row)
    }

    async fn player_sessions(&self, player_id: &str) -> RepoResult<Vec<GameSession>> {
        self.require_exists(player_id).await?;
        let rows = sqlx::query_as::<_, GameSession>(&format!(
            "SELECT {} FROM game_sessions WHERE player_id = $1 ORDER BY start_time DESC",
            SESSION_COLUMNS
        ))
        .bind(player_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn player_stats(&self, player_id: &str) -> RepoResult<SessionStats> {
        self.require_exists(player_id).await?;

        #[derive(FromRow)]
        struct StatsRow {
            total_games: i64,
            total_wins: i64,
            total_score: i64,
            chapter_games: i64,
            tower_games: i64,
            highest_tower_floor: i32,
        }

        let row = sqlx::query_as::<_, StatsRow>(
            "SELECT COUNT(*) AS total_games,
                    COUNT(*) FILTER (WHERE victory) AS total_wins,
                    COALESCE(SUM(final_score), 0)::BIGINT AS total_score,
                    COUNT(*) FILTER (WHERE game_mode <> 'tower') AS chapter_games,
                    COUNT(*) FILTER (WHERE game_mode = 'tower') AS tower_games,
                    COALESCE(MAX(tower_floor) FILTER (WHERE game_mode = 'tower'), 0)
                        AS highest_tower_floor
             FROM game_sessions
             WHERE player_id = $1 AND is_completed",
        )
        .bind(player_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(SessionStats {
            total_games_played: row.total_games,
            total_games_won: row.total_wins,
            total_score: row.total_score,
            average_score: if row.total_games > 0 {
                row.total_score as f64 / row.total_games as f64
            } else {
                0.0
            },
            win_rate: if row.total_games > 0 {
                row.total_wins as f64 / row.total_games as f64 * 100.0
            } else {
                0.0
            },
            chapter_games: row.chapter_games,
            tower_games: row.tower_games,
            highest_tower_floor: row.highest_tower_floor,
        })
    }
}
