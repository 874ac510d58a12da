//! Database Migrations - PostgreSQL schema for the match/tower game backend
//!
//! Mutable player state only; the weapon/chapter/level catalog rows are
//! inserted by `seed_data` after migration.

/// SQL migration for creating all tables
pub const MIGRATION_V1: &str = r#"
-- ============================================================================
-- Match Tower Server Database Schema v1
-- ============================================================================

-- ============================================================================
-- 1. Players
-- ============================================================================

CREATE TABLE IF NOT EXISTS players (
    player_id       VARCHAR(50) PRIMARY KEY,
    player_name     VARCHAR(100) NOT NULL,
    password_hash   VARCHAR(255) NOT NULL,
    email           VARCHAR(100) UNIQUE,
    gender          VARCHAR(20),
    language_preference VARCHAR(20),

    -- All-time tower high-water mark; only ever raised
    tower_record    INTEGER NOT NULL DEFAULT 0,

    -- Currency; a debit below zero is rejected before it reaches the row
    coins           BIGINT NOT NULL DEFAULT 0 CHECK (coins >= 0),

    equipped_weapon VARCHAR(50),
    created_date    TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
    last_login_date TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
    is_active       BOOLEAN NOT NULL DEFAULT TRUE
);

CREATE INDEX idx_players_email ON players(email);
CREATE INDEX idx_players_tower_record ON players(tower_record DESC);

-- ============================================================================
-- 2. Entitlements: upgrades + weapon ownership
-- ============================================================================

CREATE TABLE IF NOT EXISTS upgrades (
    player_id       VARCHAR(50) NOT NULL REFERENCES players(player_id) ON DELETE CASCADE,
    upgrade_type    VARCHAR(20) NOT NULL,
    level           INTEGER NOT NULL DEFAULT 0 CHECK (level BETWEEN 0 AND 15),
    created_date    TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
    updated_date    TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),

    PRIMARY KEY (player_id, upgrade_type)
);

CREATE TABLE IF NOT EXISTS weapons (
    weapon_name     VARCHAR(50) PRIMARY KEY,
    price           BIGINT NOT NULL DEFAULT 0,
    description     VARCHAR(255),
    is_default      BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE TABLE IF NOT EXISTS player_weapons (
    player_id       VARCHAR(50) NOT NULL REFERENCES players(player_id) ON DELETE CASCADE,
    weapon_name     VARCHAR(50) NOT NULL REFERENCES weapons(weapon_name),
    purchase_date   TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),

    PRIMARY KEY (player_id, weapon_name)
);

-- ============================================================================
-- 3. Chapters & levels (catalog)
-- ============================================================================

CREATE TABLE IF NOT EXISTS chapters (
    chapter_id      INTEGER PRIMARY KEY,
    chapter_name    VARCHAR(100) NOT NULL,
    description     VARCHAR(255),
    is_unlocked     BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE TABLE IF NOT EXISTS levels (
    chapter_id      INTEGER NOT NULL REFERENCES chapters(chapter_id) ON DELETE CASCADE,
    level_number    INTEGER NOT NULL,
    level_name      VARCHAR(100) NOT NULL,
    enemy_type      VARCHAR(50) NOT NULL,
    enemy_max_health INTEGER NOT NULL DEFAULT 100,

    PRIMARY KEY (chapter_id, level_number)
);

-- ============================================================================
-- 4. Progress
-- ============================================================================

CREATE TABLE IF NOT EXISTS player_progress (
    player_id       VARCHAR(50) NOT NULL REFERENCES players(player_id) ON DELETE CASCADE,
    chapter_id      INTEGER NOT NULL REFERENCES chapters(chapter_id),
    level_number    INTEGER NOT NULL,
    is_completed    BOOLEAN NOT NULL DEFAULT FALSE,
    best_score      BIGINT NOT NULL DEFAULT 0,
    completion_date TIMESTAMP WITH TIME ZONE,
    attempts        INTEGER NOT NULL DEFAULT 0,

    PRIMARY KEY (player_id, chapter_id, level_number)
);

CREATE INDEX idx_progress_player ON player_progress(player_id);

CREATE TABLE IF NOT EXISTS tower_progress (
    player_id       VARCHAR(50) PRIMARY KEY REFERENCES players(player_id) ON DELETE CASCADE,
    current_floor   INTEGER NOT NULL DEFAULT 0,
    highest_floor   INTEGER NOT NULL DEFAULT 0,
    current_health  INTEGER NOT NULL DEFAULT 0,
    excess_health   INTEGER NOT NULL DEFAULT 0,
    shield_points   INTEGER NOT NULL DEFAULT 0,
    power_points    INTEGER NOT NULL DEFAULT 0,
    last_play_date  TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
);

-- ============================================================================
-- 5. Seasons & leaderboard
-- ============================================================================

CREATE TABLE IF NOT EXISTS seasons (
    season_id       INTEGER PRIMARY KEY,
    season_number   INTEGER UNIQUE NOT NULL,
    start_date      TIMESTAMP WITH TIME ZONE NOT NULL,
    end_date        TIMESTAMP WITH TIME ZONE NOT NULL,
    is_active       BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE TABLE IF NOT EXISTS leaderboard (
    entry_id        BIGSERIAL PRIMARY KEY,
    player_id       VARCHAR(50) NOT NULL REFERENCES players(player_id) ON DELETE CASCADE,
    season_id       INTEGER NOT NULL REFERENCES seasons(season_id),
    score           BIGINT NOT NULL DEFAULT 0,
    tower_level     INTEGER NOT NULL DEFAULT 0,
    rank            INTEGER NOT NULL DEFAULT 0,
    created_date    TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
    updated_date    TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),

    -- One entry per player per season
    CONSTRAINT unique_player_season UNIQUE (player_id, season_id)
);

CREATE INDEX idx_leaderboard_season_rank ON leaderboard(season_id, rank);
CREATE INDEX idx_leaderboard_player ON leaderboard(player_id);

-- ============================================================================
-- 6. Game sessions
-- ============================================================================

CREATE TABLE IF NOT EXISTS game_sessions (
    session_id      BIGSERIAL PRIMARY KEY,
    player_id       VARCHAR(50) NOT NULL REFERENCES players(player_id) ON DELETE CASCADE,
    game_mode       VARCHAR(20) NOT NULL,
    chapter_id      INTEGER,
    level_number    INTEGER,
    tower_floor     INTEGER,
    start_time      TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
    end_time        TIMESTAMP WITH TIME ZONE,
    is_completed    BOOLEAN NOT NULL DEFAULT FALSE,
    final_score     BIGINT,
    victory         BOOLEAN
);

CREATE INDEX idx_sessions_player ON game_sessions(player_id, start_time DESC);
"#;

/// Get all migrations in order
pub fn get_migrations() -> Vec<(&'static str, &'static str)> {
    vec![("v1_initial_schema", MIGRATION_V1)]
}
