//! Integration tests for the storage layer (in-memory backend)
//!
//! Exercises the ledger, progress, and ranking invariants directly against
//! the repository traits, including atomicity under concurrent callers.

use std::sync::Arc;

use match_tower_server::models::{NewPlayer, Player, TowerStateUpdate};
use match_tower_server::storage::memory::MemoryStore;
use match_tower_server::storage::repository::*;

fn store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::seeded())
}

// `get` exists on several repository traits; qualify the player one.
async fn fetch_player(store: &MemoryStore, id: &str) -> Player {
    PlayerRepo::get(store, id)
        .await
        .expect("player lookup")
        .expect("player exists")
}

async fn create_player(store: &MemoryStore, id: &str, coins: i64) {
    store
        .create(NewPlayer {
            player_id: id.to_string(),
            player_name: format!("Player {}", id),
            password_hash: "hash".to_string(),
            email: Some(format!("{}@example.com", id.to_lowercase())),
            gender: None,
            language_preference: None,
            starting_coins: coins,
        })
        .await
        .expect("player should be created");
}

// ============================================================================
// Ledger: credit / debit
// ============================================================================

#[tokio::test]
async fn credit_and_debit_update_balance() {
    let store = store();
    create_player(&store, "PLR00000001", 100).await;

    assert_eq!(store.credit("PLR00000001", 50).await.unwrap(), 150);
    assert_eq!(store.debit("PLR00000001", 30).await.unwrap(), 120);
}

#[tokio::test]
async fn debit_never_underflows() {
    let store = store();
    create_player(&store, "PLR00000001", 20).await;

    let err = store.debit("PLR00000001", 21).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::InsufficientFunds { have: 20, need: 21 }
    ));

    // Balance untouched by the failed debit.
    let player = fetch_player(&store, "PLR00000001").await;
    assert_eq!(player.coins, 20);
}

#[tokio::test]
async fn negative_amounts_are_rejected() {
    let store = store();
    create_player(&store, "PLR00000001", 100).await;

    assert!(matches!(
        store.credit("PLR00000001", -5).await.unwrap_err(),
        StoreError::InvalidAmount(_)
    ));
    assert!(matches!(
        store.debit("PLR00000001", -5).await.unwrap_err(),
        StoreError::InvalidAmount(_)
    ));
}

#[tokio::test]
async fn adjust_coins_floors_at_zero() {
    let store = store();
    create_player(&store, "PLR00000001", 40).await;

    assert_eq!(store.adjust_coins("PLR00000001", -100).await.unwrap(), 0);
    assert_eq!(store.adjust_coins("PLR00000001", 25).await.unwrap(), 25);
}

#[tokio::test]
async fn ledger_ops_require_existing_player() {
    let store = store();
    assert!(matches!(
        store.credit("PLR99999999", 10).await.unwrap_err(),
        StoreError::NotFound(_)
    ));
}

// ============================================================================
// Ledger: upgrade purchases
// ============================================================================

#[tokio::test]
async fn purchase_upgrade_debits_and_grants_together() {
    let store = store();
    create_player(&store, "PLR00000001", 100).await;

    let purchase = store
        .purchase_upgrade("PLR00000001", "sword", 3, 60)
        .await
        .unwrap();
    assert_eq!(purchase.level, 3);
    assert_eq!(purchase.balance, 40);

    let upgrades = store.upgrades("PLR00000001").await.unwrap();
    assert_eq!(upgrades.len(), 1);
    assert_eq!(upgrades[0].level, 3);
    assert_eq!(fetch_player(&store, "PLR00000001").await.coins, 40);
}

#[tokio::test]
async fn purchase_upgrade_insufficient_funds_changes_nothing() {
    let store = store();
    create_player(&store, "PLR00000001", 100).await;

    let err = store
        .purchase_upgrade("PLR00000001", "sword", 3, 150)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::InsufficientFunds {
            have: 100,
            need: 150
        }
    ));

    // Neither side of the atomic pair happened.
    assert_eq!(fetch_player(&store, "PLR00000001").await.coins, 100);
    assert!(store.upgrades("PLR00000001").await.unwrap().is_empty());
}

#[tokio::test]
async fn purchase_upgrade_rejects_downgrade() {
    let store = store();
    create_player(&store, "PLR00000001", 500).await;

    store
        .purchase_upgrade("PLR00000001", "shield", 4, 40)
        .await
        .unwrap();

    let err = store
        .purchase_upgrade("PLR00000001", "shield", 2, 10)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::DowngradeRejected {
            current: 4,
            requested: 2
        }
    ));

    // Level and balance unchanged by the rejected call.
    let upgrades = store.upgrades("PLR00000001").await.unwrap();
    assert_eq!(upgrades[0].level, 4);
    assert_eq!(fetch_player(&store, "PLR00000001").await.coins, 460);
}

#[tokio::test]
async fn purchase_upgrade_rejects_level_above_cap() {
    let store = store();
    create_player(&store, "PLR00000001", 10_000).await;

    let err = store
        .purchase_upgrade("PLR00000001", "star", 16, 100)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::LevelOutOfRange {
            requested: 16,
            max: 15
        }
    ));

    // Level 15 itself is fine.
    let purchase = store
        .purchase_upgrade("PLR00000001", "star", 15, 100)
        .await
        .unwrap();
    assert_eq!(purchase.level, 15);
}

#[tokio::test]
async fn concurrent_purchases_never_split_debit_from_grant() {
    let store = store();
    // 55 coins, ten 10-coin purchases racing: exactly five can clear.
    create_player(&store, "PLR00000001", 55).await;

    let mut handles = Vec::new();
    for i in 0..10 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .purchase_upgrade("PLR00000001", &format!("slot{}", i), 1, 10)
                .await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            successes += 1;
        }
    }

    assert_eq!(successes, 5, "exactly five purchases can be funded");
    let player = fetch_player(&store, "PLR00000001").await;
    assert_eq!(player.coins, 55 - 10 * successes);
    // Every granted upgrade was paid for; every failure granted nothing.
    let granted = store.upgrades("PLR00000001").await.unwrap();
    assert_eq!(granted.len() as i64, successes);
    assert!(granted.iter().all(|u| u.level == 1));
}

// ============================================================================
// Ledger: weapons
// ============================================================================

#[tokio::test]
async fn weapon_purchase_and_equip_flow() {
    let store = store();
    create_player(&store, "PLR00000001", 1000).await;

    // Not owned yet: equip must fail.
    let err = store
        .equip_weapon("PLR00000001", "iron_sword")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotOwned(_)));

    let purchase = store
        .purchase_weapon("PLR00000001", "iron_sword", 250)
        .await
        .unwrap();
    assert_eq!(purchase.balance, 750);
    assert_eq!(purchase.owned_weapons, vec!["iron_sword".to_string()]);

    store.equip_weapon("PLR00000001", "iron_sword").await.unwrap();
    let player = fetch_player(&store, "PLR00000001").await;
    assert_eq!(player.equipped_weapon.as_deref(), Some("iron_sword"));

    // Second purchase of the same weapon is rejected.
    let err = store
        .purchase_weapon("PLR00000001", "iron_sword", 250)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyOwned(_)));
}

#[tokio::test]
async fn default_weapon_is_equippable_without_purchase() {
    let store = store();
    create_player(&store, "PLR00000001", 0).await;

    store.equip_weapon("PLR00000001", "wooden_sword").await.unwrap();

    // Buying the default is meaningless and rejected as already owned.
    let err = store
        .purchase_weapon("PLR00000001", "wooden_sword", 0)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyOwned(_)));
}

#[tokio::test]
async fn unknown_weapon_is_not_found() {
    let store = store();
    create_player(&store, "PLR00000001", 1000).await;

    assert!(matches!(
        store
            .purchase_weapon("PLR00000001", "excalibur", 10)
            .await
            .unwrap_err(),
        StoreError::NotFound(_)
    ));
}

// ============================================================================
// Progress tracker
// ============================================================================

#[tokio::test]
async fn best_score_merges_monotonically() {
    let store = store();
    create_player(&store, "PLR00000001", 0).await;

    let first = store
        .record_completion("PLR00000001", 1, 1, 500)
        .await
        .unwrap();
    assert!(first.is_completed);
    assert_eq!(first.best_score, 500);
    assert_eq!(first.attempts, 1);

    // Lower score: silent no-op on the score, attempts still counted.
    let second = store
        .record_completion("PLR00000001", 1, 1, 300)
        .await
        .unwrap();
    assert_eq!(second.best_score, 500);
    assert_eq!(second.attempts, 2);
    assert!(second.is_completed);

    let third = store
        .record_completion("PLR00000001", 1, 1, 800)
        .await
        .unwrap();
    assert_eq!(third.best_score, 800);
    assert_eq!(third.attempts, 3);
}

#[tokio::test]
async fn completion_requires_known_chapter() {
    let store = store();
    create_player(&store, "PLR00000001", 0).await;

    assert!(matches!(
        store
            .record_completion("PLR00000001", 99, 1, 100)
            .await
            .unwrap_err(),
        StoreError::NotFound(_)
    ));
}

#[tokio::test]
async fn summary_groups_by_chapter() {
    let store = store();
    create_player(&store, "PLR00000001", 0).await;

    store.record_completion("PLR00000001", 1, 1, 100).await.unwrap();
    store.record_completion("PLR00000001", 1, 2, 250).await.unwrap();
    store.record_completion("PLR00000001", 2, 1, 400).await.unwrap();

    let summary = store.summarize("PLR00000001").await.unwrap();
    assert_eq!(summary.len(), 2);
    assert_eq!(summary[0].chapter_id, 1);
    assert_eq!(summary[0].levels_completed, 2);
    assert_eq!(summary[0].levels_attempted, 2);
    assert_eq!(summary[0].best_score, 250);
    assert!((summary[0].completion_percentage - 100.0).abs() < f64::EPSILON);
    assert_eq!(summary[1].chapter_id, 2);
    assert_eq!(summary[1].best_score, 400);
}

#[tokio::test]
async fn tower_floor_is_position_but_record_is_high_water() {
    let store = store();
    create_player(&store, "PLR00000001", 0).await;

    let update = |floor| TowerStateUpdate {
        current_floor: floor,
        current_health: 80,
        excess_health: 0,
        shield_points: 2,
        power_points: 1,
    };

    let state = store
        .update_tower_state("PLR00000001", update(12))
        .await
        .unwrap();
    assert_eq!(state.current_floor, 12);
    assert_eq!(state.highest_floor, 12);

    // Dropping back down moves the position but not the record.
    let state = store
        .update_tower_state("PLR00000001", update(3))
        .await
        .unwrap();
    assert_eq!(state.current_floor, 3);
    assert_eq!(state.highest_floor, 12);

    let player = fetch_player(&store, "PLR00000001").await;
    assert_eq!(player.tower_record, 12);
}

// ============================================================================
// Ranking engine
// ============================================================================

#[tokio::test]
async fn stored_score_is_maximum_ever_submitted() {
    let store = store();
    create_player(&store, "PLR00000001", 0).await;

    let first = store.submit_score("PLR00000001", 1, 50, 0).await.unwrap();
    assert!(first.updated);
    assert_eq!(first.entry.score, 50);
    assert_eq!(first.entry.rank, 1);

    // Lower resubmission is a no-op, not an error, and does not recompute.
    let second = store.submit_score("PLR00000001", 1, 30, 0).await.unwrap();
    assert!(!second.updated);
    assert!(!second.recomputed);
    assert_eq!(second.entry.score, 50);

    let equal = store.submit_score("PLR00000001", 1, 50, 0).await.unwrap();
    assert!(!equal.updated);
    assert_eq!(equal.entry.score, 50);
}

#[tokio::test]
async fn ranks_form_dense_permutation_with_deterministic_ties() {
    let store = store();
    for id in ["PLR00000001", "PLR00000002", "PLR00000003"] {
        create_player(&store, id, 0).await;
    }

    store.submit_score("PLR00000001", 1, 100, 0).await.unwrap();
    store.submit_score("PLR00000002", 1, 100, 0).await.unwrap();
    store.submit_score("PLR00000003", 1, 80, 0).await.unwrap();

    let board = store.season_top(1, 50).await.unwrap();
    let ranks: Vec<i32> = board.iter().map(|e| e.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3]);

    // The tie resolves to the earlier-created entry.
    assert_eq!(board[0].player_id, "PLR00000001");
    assert_eq!(board[1].player_id, "PLR00000002");
    assert_eq!(board[2].player_id, "PLR00000003");

    // Submitting a no-op score leaves the assignment identical.
    store.submit_score("PLR00000002", 1, 90, 0).await.unwrap();
    let board_again = store.season_top(1, 50).await.unwrap();
    for (before, after) in board.iter().zip(board_again.iter()) {
        assert_eq!(before.player_id, after.player_id);
        assert_eq!(before.rank, after.rank);
    }
}

#[tokio::test]
async fn initialize_player_is_idempotent() {
    let store = store();
    create_player(&store, "PLR00000001", 0).await;

    let first = store.initialize_player("PLR00000001", 1).await.unwrap();
    assert!(matches!(
        &first,
        match_tower_server::models::InitOutcome::Created(_)
    ));
    assert_eq!(first.entry().score, 0);
    assert_eq!(first.entry().rank, 1);

    let second = store.initialize_player("PLR00000001", 1).await.unwrap();
    assert!(matches!(
        &second,
        match_tower_server::models::InitOutcome::AlreadyInitialized(_)
    ));
    assert_eq!(second.entry().entry_id, first.entry().entry_id);
}

#[tokio::test]
async fn submit_requires_known_player_and_season() {
    let store = store();
    create_player(&store, "PLR00000001", 0).await;

    assert!(matches!(
        store.submit_score("PLR99999999", 1, 10, 0).await.unwrap_err(),
        StoreError::NotFound(_)
    ));
    assert!(matches!(
        store.submit_score("PLR00000001", 42, 10, 0).await.unwrap_err(),
        StoreError::NotFound(_)
    ));
}

#[tokio::test]
async fn concurrent_submissions_keep_ranks_dense() {
    let store = store();
    let players = [
        "PLR00000001",
        "PLR00000002",
        "PLR00000003",
        "PLR00000004",
        "PLR00000005",
    ];
    for id in players {
        create_player(&store, id, 0).await;
    }

    // Several interleaved submissions per player; the maximum per player
    // is deterministic regardless of interleaving.
    let mut handles = Vec::new();
    for (i, id) in players.iter().enumerate() {
        for round in 0..4 {
            let store = store.clone();
            let id = id.to_string();
            let score = (i as i64 + 1) * 100 + round * 7;
            handles.push(tokio::spawn(async move {
                store.submit_score(&id, 1, score, 0).await
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let board = store.season_top(1, 50).await.unwrap();
    assert_eq!(board.len(), players.len());

    let mut ranks: Vec<i32> = board.iter().map(|e| e.rank).collect();
    ranks.sort_unstable();
    assert_eq!(ranks, vec![1, 2, 3, 4, 5]);

    // Stored score per player equals the max that player ever submitted.
    for (i, id) in players.iter().enumerate() {
        let entry = store.entry(id, 1).await.unwrap().unwrap();
        assert_eq!(entry.score, (i as i64 + 1) * 100 + 21);
    }
    // Highest submitter is rank 1.
    assert_eq!(board[0].player_id, "PLR00000005");
}

#[tokio::test]
async fn tower_board_ranks_by_all_time_record() {
    let store = store();
    for id in ["PLR00000001", "PLR00000002", "PLR00000003"] {
        create_player(&store, id, 0).await;
    }

    let climb = |floor| TowerStateUpdate {
        current_floor: floor,
        current_health: 100,
        excess_health: 0,
        shield_points: 0,
        power_points: 0,
    };
    store.update_tower_state("PLR00000001", climb(8)).await.unwrap();
    store.update_tower_state("PLR00000002", climb(23)).await.unwrap();
    // Third player never climbed; stays off the board.

    let board = store.tower_top(10).await.unwrap();
    assert_eq!(board.len(), 2);
    assert_eq!(board[0].player_id, "PLR00000002");
    assert_eq!(board[0].rank, 1);
    assert_eq!(board[0].tower_record, 23);
    assert_eq!(board[1].player_id, "PLR00000001");
    assert_eq!(board[1].rank, 2);
}
