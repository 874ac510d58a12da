//! In-memory storage backend.
//!
//! Implements the same repository traits as [`super::postgres::PostgresStore`]
//! over flat maps behind a single `parking_lot::RwLock`. Used by the test
//! suite and for running the server without PostgreSQL.
//!
//! Atomicity: every mutating operation does all of its validation and all
//! of its writes under one write-lock acquisition, so the debit+grant pairs
//! and the read-all/recompute/write-all of a rank update are indivisible.
//! The single lock also serializes season recomputes, which subsumes the
//! per-season serialization the PostgreSQL backend gets from advisory locks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::models::{
    Chapter, ChapterSummary, GameSession, InitOutcome, LeaderboardEntry, LevelInfo, NewPlayer,
    NewSession, Player, PlayerWeapon, ProfileUpdate, ProgressRecord, RankedEntry, ScoreSubmission,
    Season, SessionOutcome, SessionStats, TowerRankEntry, TowerState, TowerStateUpdate, Upgrade,
    UpgradePurchase, Weapon, WeaponPurchase, GAME_MODE_TOWER, MAX_UPGRADE_LEVEL,
};
use crate::ranking;

use super::repository::{
    CatalogRepo, LedgerRepo, LeaderboardRepo, PlayerRepo, ProgressRepo, RepoResult, SeasonRepo,
    SessionRepo, StoreError,
};
use super::seed_data;

#[derive(Default)]
struct MemoryState {
    players: HashMap<String, Player>,
    /// Keyed by (player_id, upgrade_type).
    upgrades: HashMap<(String, String), Upgrade>,
    /// Keyed by (player_id, weapon_name).
    weapons_owned: HashMap<(String, String), PlayerWeapon>,
    /// Keyed by (player_id, chapter_id, level_number).
    progress: HashMap<(String, i32, i32), ProgressRecord>,
    tower: HashMap<String, TowerState>,
    /// Unique per (player_id, season_id).
    entries: Vec<LeaderboardEntry>,
    seasons: Vec<Season>,
    chapters: Vec<Chapter>,
    levels: Vec<LevelInfo>,
    weapons: Vec<Weapon>,
    sessions: HashMap<i64, GameSession>,
    next_entry_id: i64,
    next_session_id: i64,
}

pub struct MemoryStore {
    inner: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryState {
                next_entry_id: 1,
                next_session_id: 1,
                ..MemoryState::default()
            }),
        }
    }

    /// A store pre-populated with the default catalog and opening season.
    pub fn seeded() -> Self {
        let store = Self::new();
        {
            let mut state = store.inner.write();
            state.weapons = seed_data::default_weapons();
            state.chapters = seed_data::default_chapters();
            state.levels = seed_data::default_levels();
            state.seasons = seed_data::default_seasons();
        }
        store
    }

    /// Builds a [`super::repository::StorageManager`] whose repositories all
    /// share this store.
    pub fn into_manager(self) -> super::repository::StorageManager {
        let store = Arc::new(self);
        super::repository::StorageManager {
            players: store.clone(),
            ledger: store.clone(),
            progress: store.clone(),
            leaderboard: store.clone(),
            seasons: store.clone(),
            catalog: store.clone(),
            sessions: store,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn player_not_found(player_id: &str) -> StoreError {
    StoreError::NotFound(format!("player {}", player_id))
}

impl MemoryState {
    fn require_player(&self, player_id: &str) -> RepoResult<&Player> {
        self.players
            .get(player_id)
            .ok_or_else(|| player_not_found(player_id))
    }

    fn require_player_mut(&mut self, player_id: &str) -> RepoResult<&mut Player> {
        self.players
            .get_mut(player_id)
            .ok_or_else(|| player_not_found(player_id))
    }

    /// Recomputes dense ranks for one season's entries.
    fn recompute_ranks(&mut self, season_id: i32) {
        let mut season: Vec<LeaderboardEntry> = self
            .entries
            .iter()
            .filter(|e| e.season_id == season_id)
            .cloned()
            .collect();
        ranking::assign_ranks(&mut season);

        let ranks: HashMap<i64, i32> = season.iter().map(|e| (e.entry_id, e.rank)).collect();
        for entry in &mut self.entries {
            if let Some(rank) = ranks.get(&entry.entry_id) {
                entry.rank = *rank;
            }
        }
    }

    fn ranked_entry(&self, entry: &LeaderboardEntry) -> RankedEntry {
        let player_name = self
            .players
            .get(&entry.player_id)
            .map(|p| p.player_name.clone())
            .unwrap_or_default();
        RankedEntry {
            entry_id: entry.entry_id,
            player_id: entry.player_id.clone(),
            player_name,
            season_id: entry.season_id,
            score: entry.score,
            tower_level: entry.tower_level,
            rank: entry.rank,
            updated_date: entry.updated_date,
        }
    }
}

// ============================================================================
// PlayerRepo
// ============================================================================

#[async_trait]
impl PlayerRepo for MemoryStore {
    async fn create(&self, new: NewPlayer) -> RepoResult<Player> {
        let mut state = self.inner.write();
        if state.players.contains_key(&new.player_id) {
            return Err(StoreError::Conflict(format!(
                "player id {} already registered",
                new.player_id
            )));
        }
        if let Some(email) = new.email.as_deref() {
            if state
                .players
                .values()
                .any(|p| p.email.as_deref() == Some(email))
            {
                return Err(StoreError::Conflict(format!(
                    "email {} already registered",
                    email
                )));
            }
        }

        let now = Utc::now();
        let player = Player {
            player_id: new.player_id.clone(),
            player_name: new.player_name,
            password_hash: new.password_hash,
            email: new.email,
            gender: new.gender,
            language_preference: new.language_preference,
            tower_record: 0,
            coins: new.starting_coins,
            equipped_weapon: None,
            created_date: now,
            last_login_date: now,
            is_active: true,
        };
        state.players.insert(new.player_id, player.clone());
        Ok(player)
    }

    async fn get(&self, player_id: &str) -> RepoResult<Option<Player>> {
        Ok(self.inner.read().players.get(player_id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> RepoResult<Option<Player>> {
        Ok(self
            .inner
            .read()
            .players
            .values()
            .find(|p| p.email.as_deref() == Some(email))
            .cloned())
    }

    async fn exists(&self, player_id: &str) -> RepoResult<bool> {
        Ok(self.inner.read().players.contains_key(player_id))
    }

    async fn update_profile(&self, player_id: &str, update: ProfileUpdate) -> RepoResult<Player> {
        let mut state = self.inner.write();
        let player = state.require_player_mut(player_id)?;
        if let Some(name) = update.player_name {
            player.player_name = name;
        }
        if let Some(gender) = update.gender {
            player.gender = Some(gender);
        }
        if let Some(lang) = update.language_preference {
            player.language_preference = Some(lang);
        }
        player.last_login_date = Utc::now();
        Ok(player.clone())
    }

    async fn touch_login(&self, player_id: &str) -> RepoResult<()> {
        let mut state = self.inner.write();
        let player = state.require_player_mut(player_id)?;
        player.last_login_date = Utc::now();
        player.is_active = true;
        Ok(())
    }

    async fn deactivate(&self, player_id: &str) -> RepoResult<()> {
        let mut state = self.inner.write();
        let player = state.require_player_mut(player_id)?;
        player.is_active = false;
        Ok(())
    }
}

// ============================================================================
// LedgerRepo
// ============================================================================

#[async_trait]
impl LedgerRepo for MemoryStore {
    async fn credit(&self, player_id: &str, amount: i64) -> RepoResult<i64> {
        if amount < 0 {
            return Err(StoreError::InvalidAmount(format!(
                "credit amount must be non-negative, got {}",
                amount
            )));
        }
        let mut state = self.inner.write();
        let player = state.require_player_mut(player_id)?;
        player.coins += amount;
        Ok(player.coins)
    }

    async fn debit(&self, player_id: &str, amount: i64) -> RepoResult<i64> {
        if amount < 0 {
            return Err(StoreError::InvalidAmount(format!(
                "debit amount must be non-negative, got {}",
                amount
            )));
        }
        let mut state = self.inner.write();
        let player = state.require_player_mut(player_id)?;
        if player.coins < amount {
            return Err(StoreError::InsufficientFunds {
                have: player.coins,
                need: amount,
            });
        }
        player.coins -= amount;
        Ok(player.coins)
    }

    async fn adjust_coins(&self, player_id: &str, delta: i64) -> RepoResult<i64> {
        let mut state = self.inner.write();
        let player = state.require_player_mut(player_id)?;
        player.coins = (player.coins + delta).max(0);
        Ok(player.coins)
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

        let mut state = self.inner.write();
        state.require_player(player_id)?;

        let key = (player_id.to_string(), upgrade_type.to_string());
        let current = state.upgrades.get(&key).map(|u| u.level).unwrap_or(0);

        if target_level > MAX_UPGRADE_LEVEL {
            return Err(StoreError::LevelOutOfRange {
                requested: target_level,
                max: MAX_UPGRADE_LEVEL,
            });
        }
        if target_level < current {
            return Err(StoreError::DowngradeRejected {
                current,
                requested: target_level,
            });
        }

        let balance = state.require_player(player_id)?.coins;
        if balance < cost {
            return Err(StoreError::InsufficientFunds {
                have: balance,
                need: cost,
            });
        }

        // All validations passed: debit and grant together.
        let now = Utc::now();
        state.require_player_mut(player_id)?.coins -= cost;
        let upgrade = state
            .upgrades
            .entry(key)
            .or_insert_with(|| Upgrade {
                player_id: player_id.to_string(),
                upgrade_type: upgrade_type.to_string(),
                level: 0,
                created_date: now,
                updated_date: now,
            });
        upgrade.level = target_level;
        upgrade.updated_date = now;

        Ok(UpgradePurchase {
            upgrade_type: upgrade_type.to_string(),
            level: target_level,
            balance: balance - cost,
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

        let mut state = self.inner.write();
        state.require_player(player_id)?;

        let weapon = state
            .weapons
            .iter()
            .find(|w| w.weapon_name == weapon_name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("weapon {}", weapon_name)))?;

        let key = (player_id.to_string(), weapon_name.to_string());
        if weapon.is_default || state.weapons_owned.contains_key(&key) {
            return Err(StoreError::AlreadyOwned(weapon_name.to_string()));
        }

        let balance = state.require_player(player_id)?.coins;
        if balance < cost {
            return Err(StoreError::InsufficientFunds {
                have: balance,
                need: cost,
            });
        }

        state.require_player_mut(player_id)?.coins -= cost;
        state.weapons_owned.insert(
            key,
            PlayerWeapon {
                player_id: player_id.to_string(),
                weapon_name: weapon_name.to_string(),
                purchase_date: Utc::now(),
            },
        );

        let mut owned: Vec<String> = state
            .weapons_owned
            .keys()
            .filter(|(pid, _)| pid == player_id)
            .map(|(_, name)| name.clone())
            .collect();
        owned.sort();

        Ok(WeaponPurchase {
            weapon_name: weapon_name.to_string(),
            balance: balance - cost,
            owned_weapons: owned,
        })
    }

    async fn equip_weapon(&self, player_id: &str, weapon_name: &str) -> RepoResult<()> {
        let mut state = self.inner.write();
        state.require_player(player_id)?;

        let weapon = state
            .weapons
            .iter()
            .find(|w| w.weapon_name == weapon_name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("weapon {}", weapon_name)))?;

        let key = (player_id.to_string(), weapon_name.to_string());
        if !weapon.is_default && !state.weapons_owned.contains_key(&key) {
            return Err(StoreError::NotOwned(weapon_name.to_string()));
        }

        state.require_player_mut(player_id)?.equipped_weapon = Some(weapon_name.to_string());
        Ok(())
    }

    async fn upgrades(&self, player_id: &str) -> RepoResult<Vec<Upgrade>> {
        let state = self.inner.read();
        state.require_player(player_id)?;
        let mut upgrades: Vec<Upgrade> = state
            .upgrades
            .values()
            .filter(|u| u.player_id == player_id)
            .cloned()
            .collect();
        upgrades.sort_by(|a, b| a.upgrade_type.cmp(&b.upgrade_type));
        Ok(upgrades)
    }

    async fn owned_weapons(&self, player_id: &str) -> RepoResult<Vec<PlayerWeapon>> {
        let state = self.inner.read();
        state.require_player(player_id)?;
        let mut owned: Vec<PlayerWeapon> = state
            .weapons_owned
            .values()
            .filter(|w| w.player_id == player_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.weapon_name.cmp(&b.weapon_name));
        Ok(owned)
    }
}

// ============================================================================
// ProgressRepo
// ============================================================================

#[async_trait]
impl ProgressRepo for MemoryStore {
    async fn record_completion(
        &self,
        player_id: &str,
        chapter_id: i32,
        level_number: i32,
        score: i64,
    ) -> RepoResult<ProgressRecord> {
        let mut state = self.inner.write();
        state.require_player(player_id)?;
        if !state.chapters.iter().any(|c| c.chapter_id == chapter_id) {
            return Err(StoreError::NotFound(format!("chapter {}", chapter_id)));
        }

        let now = Utc::now();
        let key = (player_id.to_string(), chapter_id, level_number);
        let record = state.progress.entry(key).or_insert_with(|| ProgressRecord {
            player_id: player_id.to_string(),
            chapter_id,
            level_number,
            is_completed: false,
            best_score: 0,
            completion_date: None,
            attempts: 0,
        });

        record.attempts += 1;
        if ranking::improves(record.best_score, score) {
            record.best_score = score;
            record.completion_date = Some(now);
        }
        if !record.is_completed {
            record.is_completed = true;
            record.completion_date = Some(now);
        }

        Ok(record.clone())
    }

    async fn list_for_player(&self, player_id: &str) -> RepoResult<Vec<ProgressRecord>> {
        let state = self.inner.read();
        state.require_player(player_id)?;
        let mut records: Vec<ProgressRecord> = state
            .progress
            .values()
            .filter(|r| r.player_id == player_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.chapter_id, r.level_number));
        Ok(records)
    }

    async fn summarize(&self, player_id: &str) -> RepoResult<Vec<ChapterSummary>> {
        let state = self.inner.read();
        state.require_player(player_id)?;

        let mut by_chapter: HashMap<i32, (i64, i64, i64)> = HashMap::new();
        for record in state.progress.values().filter(|r| r.player_id == player_id) {
            let slot = by_chapter.entry(record.chapter_id).or_insert((0, 0, 0));
            slot.0 += 1;
            if record.is_completed {
                slot.1 += 1;
            }
            slot.2 = slot.2.max(record.best_score);
        }

        let mut summaries: Vec<ChapterSummary> = by_chapter
            .into_iter()
            .map(|(chapter_id, (attempted, completed, best))| {
                let chapter_name = state
                    .chapters
                    .iter()
                    .find(|c| c.chapter_id == chapter_id)
                    .map(|c| c.chapter_name.clone())
                    .unwrap_or_else(|| format!("Chapter {}", chapter_id));
                ChapterSummary {
                    chapter_id,
                    chapter_name,
                    levels_completed: completed,
                    levels_attempted: attempted,
                    best_score: best,
                    completion_percentage: if attempted > 0 {
                        completed as f64 / attempted as f64 * 100.0
                    } else {
                        0.0
                    },
                }
            })
            .collect();
        summaries.sort_by_key(|s| s.chapter_id);
        Ok(summaries)
    }

    async fn tower_state(&self, player_id: &str) -> RepoResult<Option<TowerState>> {
        let state = self.inner.read();
        state.require_player(player_id)?;
        Ok(state.tower.get(player_id).cloned())
    }

    async fn update_tower_state(
        &self,
        player_id: &str,
        update: TowerStateUpdate,
    ) -> RepoResult<TowerState> {
        let mut state = self.inner.write();
        state.require_player(player_id)?;

        let now = Utc::now();
        let tower = state
            .tower
            .entry(player_id.to_string())
            .or_insert_with(|| TowerState {
                player_id: player_id.to_string(),
                current_floor: 0,
                highest_floor: 0,
                current_health: 0,
                excess_health: 0,
                shield_points: 0,
                power_points: 0,
                last_play_date: now,
            });

        tower.current_floor = update.current_floor;
        tower.highest_floor = tower.highest_floor.max(update.current_floor);
        tower.current_health = update.current_health;
        tower.excess_health = update.excess_health;
        tower.shield_points = update.shield_points;
        tower.power_points = update.power_points;
        tower.last_play_date = now;
        let snapshot = tower.clone();

        let player = state.require_player_mut(player_id)?;
        player.tower_record = player.tower_record.max(update.current_floor);

        Ok(snapshot)
    }
}

// ============================================================================
// LeaderboardRepo
// ============================================================================

#[async_trait]
impl LeaderboardRepo for MemoryStore {
    async fn submit_score(
        &self,
        player_id: &str,
        season_id: i32,
        score: i64,
        tower_level: i32,
    ) -> RepoResult<ScoreSubmission> {
        let mut state = self.inner.write();
        state.require_player(player_id)?;
        if !state.seasons.iter().any(|s| s.season_id == season_id) {
            return Err(StoreError::NotFound(format!("season {}", season_id)));
        }

        let now = Utc::now();
        let existing = state
            .entries
            .iter()
            .position(|e| e.player_id == player_id && e.season_id == season_id);

        let (idx, score_changed, updated) = match existing {
            Some(idx) => {
                let entry = &mut state.entries[idx];
                let score_changed = ranking::improves(entry.score, score);
                let tower_changed = tower_level > entry.tower_level;
                if score_changed {
                    entry.score = score;
                }
                if tower_changed {
                    entry.tower_level = tower_level;
                }
                if score_changed || tower_changed {
                    entry.updated_date = now;
                }
                (idx, score_changed, score_changed || tower_changed)
            }
            None => {
                let entry_id = state.next_entry_id;
                state.next_entry_id += 1;
                state.entries.push(LeaderboardEntry {
                    entry_id,
                    player_id: player_id.to_string(),
                    season_id,
                    score,
                    tower_level,
                    rank: 0,
                    created_date: now,
                    updated_date: now,
                });
                (state.entries.len() - 1, true, true)
            }
        };

        // Recomputes rewrite ranks in place, never reorder, so idx stays valid.
        if score_changed {
            state.recompute_ranks(season_id);
        }

        let entry = state.entries[idx].clone();
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
        let mut state = self.inner.write();
        state.require_player(player_id)?;
        if !state.seasons.iter().any(|s| s.season_id == season_id) {
            return Err(StoreError::NotFound(format!("season {}", season_id)));
        }

        if let Some(entry) = state
            .entries
            .iter()
            .find(|e| e.player_id == player_id && e.season_id == season_id)
        {
            return Ok(InitOutcome::AlreadyInitialized(entry.clone()));
        }

        let now = Utc::now();
        let entry_id = state.next_entry_id;
        state.next_entry_id += 1;
        state.entries.push(LeaderboardEntry {
            entry_id,
            player_id: player_id.to_string(),
            season_id,
            score: 0,
            tower_level: 0,
            rank: 0,
            created_date: now,
            updated_date: now,
        });
        let idx = state.entries.len() - 1;
        state.recompute_ranks(season_id);

        Ok(InitOutcome::Created(state.entries[idx].clone()))
    }

    async fn season_top(&self, season_id: i32, limit: i64) -> RepoResult<Vec<RankedEntry>> {
        let state = self.inner.read();
        let mut season: Vec<&LeaderboardEntry> = state
            .entries
            .iter()
            .filter(|e| e.season_id == season_id)
            .collect();
        season.sort_by_key(|e| e.rank);
        Ok(season
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|e| state.ranked_entry(e))
            .collect())
    }

    async fn player_entries(&self, player_id: &str) -> RepoResult<Vec<RankedEntry>> {
        let state = self.inner.read();
        let mut entries: Vec<&LeaderboardEntry> = state
            .entries
            .iter()
            .filter(|e| e.player_id == player_id)
            .collect();
        entries.sort_by(|a, b| b.updated_date.cmp(&a.updated_date));
        Ok(entries
            .into_iter()
            .map(|e| state.ranked_entry(e))
            .collect())
    }

    async fn tower_top(&self, limit: i64) -> RepoResult<Vec<TowerRankEntry>> {
        let state = self.inner.read();
        let mut players: Vec<&Player> = state
            .players
            .values()
            .filter(|p| p.tower_record > 0)
            .collect();
        players.sort_by(|a, b| {
            b.tower_record
                .cmp(&a.tower_record)
                .then_with(|| a.player_id.cmp(&b.player_id))
        });
        Ok(players
            .into_iter()
            .take(limit.max(0) as usize)
            .enumerate()
            .map(|(idx, p)| TowerRankEntry {
                rank: idx as i32 + 1,
                player_id: p.player_id.clone(),
                player_name: p.player_name.clone(),
                tower_record: p.tower_record,
                last_login_date: p.last_login_date,
            })
            .collect())
    }

    async fn entry(
        &self,
        player_id: &str,
        season_id: i32,
    ) -> RepoResult<Option<LeaderboardEntry>> {
        let state = self.inner.read();
        Ok(state
            .entries
            .iter()
            .find(|e| e.player_id == player_id && e.season_id == season_id)
            .cloned())
    }
}

// ============================================================================
// SeasonRepo / CatalogRepo
// ============================================================================

#[async_trait]
impl SeasonRepo for MemoryStore {
    async fn current(&self) -> RepoResult<Option<Season>> {
        Ok(self
            .inner
            .read()
            .seasons
            .iter()
            .find(|s| s.is_active)
            .cloned())
    }

    async fn get(&self, season_id: i32) -> RepoResult<Option<Season>> {
        Ok(self
            .inner
            .read()
            .seasons
            .iter()
            .find(|s| s.season_id == season_id)
            .cloned())
    }

    async fn list(&self) -> RepoResult<Vec<Season>> {
        let mut seasons = self.inner.read().seasons.clone();
        seasons.sort_by_key(|s| s.season_number);
        Ok(seasons)
    }
}

#[async_trait]
impl CatalogRepo for MemoryStore {
    async fn chapters(&self) -> RepoResult<Vec<Chapter>> {
        let mut chapters = self.inner.read().chapters.clone();
        chapters.sort_by_key(|c| c.chapter_id);
        Ok(chapters)
    }

    async fn chapter(&self, chapter_id: i32) -> RepoResult<Option<Chapter>> {
        Ok(self
            .inner
            .read()
            .chapters
            .iter()
            .find(|c| c.chapter_id == chapter_id)
            .cloned())
    }

    async fn chapter_levels(&self, chapter_id: i32) -> RepoResult<Vec<LevelInfo>> {
        let mut levels: Vec<LevelInfo> = self
            .inner
            .read()
            .levels
            .iter()
            .filter(|l| l.chapter_id == chapter_id)
            .cloned()
            .collect();
        levels.sort_by_key(|l| l.level_number);
        Ok(levels)
    }

    async fn weapons(&self) -> RepoResult<Vec<Weapon>> {
        let mut weapons = self.inner.read().weapons.clone();
        weapons.sort_by(|a, b| a.weapon_name.cmp(&b.weapon_name));
        Ok(weapons)
    }

    async fn weapon(&self, weapon_name: &str) -> RepoResult<Option<Weapon>> {
        Ok(self
            .inner
            .read()
            .weapons
            .iter()
            .find(|w| w.weapon_name == weapon_name)
            .cloned())
    }
}

// ============================================================================
// SessionRepo
// ============================================================================

#[async_trait]
impl SessionRepo for MemoryStore {
    async fn start(&self, new: NewSession) -> RepoResult<GameSession> {
        let mut state = self.inner.write();
        state.require_player(&new.player_id)?;

        let session = GameSession {
            session_id: state.next_session_id,
            player_id: new.player_id,
            game_mode: new.game_mode,
            chapter_id: new.chapter_id,
            level_number: new.level_number,
            tower_floor: new.tower_floor,
            start_time: Utc::now(),
            end_time: None,
            is_completed: false,
            final_score: None,
            victory: None,
        };
        state.next_session_id += 1;
        state.sessions.insert(session.session_id, session.clone());
        Ok(session)
    }

    async fn get(&self, session_id: i64) -> RepoResult<Option<GameSession>> {
        Ok(self.inner.read().sessions.get(&session_id).cloned())
    }

    async fn complete(&self, session_id: i64, outcome: SessionOutcome) -> RepoResult<GameSession> {
        let mut state = self.inner.write();
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| StoreError::NotFound(format!("session {}", session_id)))?;

        session.end_time = Some(Utc::now());
        session.is_completed = true;
        session.final_score = Some(outcome.final_score);
        session.victory = Some(outcome.victory);
        let snapshot = session.clone();

        if snapshot.game_mode == GAME_MODE_TOWER && outcome.victory {
            if let Some(floor) = snapshot.tower_floor {
                let player = state.require_player_mut(&snapshot.player_id)?;
                player.tower_record = player.tower_record.max(floor);
            }
        }

        Ok(snapshot)
    }

    async fn player_sessions(&self, player_id: &str) -> RepoResult<Vec<GameSession>> {
        let state = self.inner.read();
        state.require_player(player_id)?;
        let mut sessions: Vec<GameSession> = state
            .sessions
            .values()
            .filter(|s| s.player_id == player_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(sessions)
    }

    async fn player_stats(&self, player_id: &str) -> RepoResult<SessionStats> {
        let state = self.inner.read();
        state.require_player(player_id)?;

        let completed: Vec<&GameSession> = state
            .sessions
            .values()
            .filter(|s| s.player_id == player_id && s.is_completed)
            .collect();

        let total = completed.len() as i64;
        let wins = completed.iter().filter(|s| s.victory == Some(true)).count() as i64;
        let total_score: i64 = completed.iter().filter_map(|s| s.final_score).sum();
        let highest_tower_floor = completed
            .iter()
            .filter(|s| s.game_mode == GAME_MODE_TOWER)
            .filter_map(|s| s.tower_floor)
            .max()
            .unwrap_or(0);

        Ok(SessionStats {
            total_games_played: total,
            total_games_won: wins,
            total_score,
            average_score: if total > 0 {
                total_score as f64 / total as f64
            } else {
                0.0
            },
            win_rate: if total > 0 {
                wins as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            chapter_games: completed
                .iter()
                .filter(|s| s.game_mode != GAME_MODE_TOWER)
                .count() as i64,
            tower_games: completed
                .iter()
                .filter(|s| s.game_mode == GAME_MODE_TOWER)
                .count() as i64,
            highest_tower_floor,
        })
    }
}
