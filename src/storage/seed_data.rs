//! Seed data - weapon/chapter/level catalog and the opening season
//!
//! Inserted after migrations on every startup; existing rows are left
//! untouched so live edits survive restarts.

use chrono::{TimeZone, Utc};
use tracing::info;

use crate::models::{Chapter, LevelInfo, Season, Weapon};

use super::postgres::PostgresStore;
use super::repository::RepoResult;

pub fn default_weapons() -> Vec<Weapon> {
    let weapon = |name: &str, price: i64, desc: &str, is_default: bool| Weapon {
        weapon_name: name.to_string(),
        price,
        description: Some(desc.to_string()),
        is_default,
    };

    vec![
        weapon("wooden_sword", 0, "Starter blade. Free for everyone.", true),
        weapon("iron_sword", 250, "Reliable iron blade with extra match damage.", false),
        weapon("flame_saber", 600, "Ignites match-4 combos for burn damage.", false),
        weapon("frost_hammer", 600, "Freezes the enemy's attack timer on big matches.", false),
        weapon("storm_spear", 1200, "Chains lightning across adjacent tiles.", false),
        weapon("dragon_blade", 2500, "Endgame blade. Massive combo multiplier.", false),
    ]
}

pub fn default_chapters() -> Vec<Chapter> {
    let chapter = |id: i32, name: &str, desc: &str, unlocked: bool| Chapter {
        chapter_id: id,
        chapter_name: name.to_string(),
        description: Some(desc.to_string()),
        is_unlocked: unlocked,
    };

    vec![
        chapter(1, "Greenwood Trail", "Tutorial forest. Slimes and wolves.", true),
        chapter(2, "Ember Caverns", "Lava caves with fire-resistant enemies.", true),
        chapter(3, "Frozen Keep", "Ice fortress. Enemies freeze your board.", false),
        chapter(4, "Sky Citadel", "Final chapter before the endless tower.", false),
    ]
}

pub fn default_levels() -> Vec<LevelInfo> {
    let level = |chapter_id: i32, number: i32, name: &str, enemy: &str, hp: i32| LevelInfo {
        chapter_id,
        level_number: number,
        level_name: name.to_string(),
        enemy_type: enemy.to_string(),
        enemy_max_health: hp,
    };

    vec![
        level(1, 1, "Forest Edge", "green_slime", 80),
        level(1, 2, "Wolf Den", "timber_wolf", 120),
        level(1, 3, "Old Oak", "bark_golem", 180),
        level(2, 1, "Ash Tunnel", "ember_imp", 150),
        level(2, 2, "Magma Pool", "lava_crab", 220),
        level(2, 3, "Cinder Gate", "flame_drake", 320),
        level(3, 1, "Ice Bridge", "frost_sprite", 260),
        level(3, 2, "Glacier Hall", "ice_golem", 380),
        level(3, 3, "Frozen Throne", "winter_king", 520),
        level(4, 1, "Cloud Steps", "storm_harpy", 420),
        level(4, 2, "Thunder Spire", "sky_sentinel", 600),
        level(4, 3, "Citadel Crown", "citadel_lord", 800),
    ]
}

pub fn default_seasons() -> Vec<Season> {
    vec![Season {
        season_id: 1,
        season_number: 1,
        start_date: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        end_date: Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap(),
        is_active: true,
    }]
}

/// Seed the PostgreSQL catalog tables. Idempotent.
pub async fn seed_postgres(pg: &PostgresStore) -> RepoResult<()> {
    for weapon in default_weapons() {
        sqlx::query(
            "INSERT INTO weapons (weapon_name, price, description, is_default)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (weapon_name) DO NOTHING",
        )
        .bind(&weapon.weapon_name)
        .bind(weapon.price)
        .bind(&weapon.description)
        .bind(weapon.is_default)
        .execute(pg.pool())
        .await?;
    }

    for chapter in default_chapters() {
        sqlx::query(
            "INSERT INTO chapters (chapter_id, chapter_name, description, is_unlocked)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (chapter_id) DO NOTHING",
        )
        .bind(chapter.chapter_id)
        .bind(&chapter.chapter_name)
        .bind(&chapter.description)
        .bind(chapter.is_unlocked)
        .execute(pg.pool())
        .await?;
    }

    for level in default_levels() {
        sqlx::query(
            "INSERT INTO levels (chapter_id, level_number, level_name, enemy_type, enemy_max_health)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (chapter_id, level_number) DO NOTHING",
        )
        .bind(level.chapter_id)
        .bind(level.level_number)
        .bind(&level.level_name)
        .bind(&level.enemy_type)
        .bind(level.enemy_max_health)
        .execute(pg.pool())
        .await?;
    }

    for season in default_seasons() {
        sqlx::query(
            "INSERT INTO seasons (season_id, season_number, start_date, end_date, is_active)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (season_id) DO NOTHING",
        )
        .bind(season.season_id)
        .bind(season.season_number)
        .bind(season.start_date)
        .bind(season.end_date)
        .bind(season.is_active)
        .execute(pg.pool())
        .await?;
    }

    info!("Catalog seeded (weapons, chapters, levels, seasons)");
    Ok(())
}
