//! Storage Layer - Unified data access
//!
//! Implements the Repository pattern with swappable backends:
//! - **PostgreSQL**: production player data (atomic purchases, rank
//!   recomputes under per-season advisory locks)
//! - **Memory**: tests and DB-free local runs
//!
//! ## Architecture
//! ```text
//! [API Handlers]
//!       ↓
//! [Repository Traits]
//!       ↓
//! ┌───────────────┬──────────────┐
//! │ PostgresStore │ MemoryStore  │
//! └───────────────┴──────────────┘
//! ```

pub mod memory;
pub mod migrations;
pub mod postgres;
pub mod repository;
pub mod seed_data;

use std::sync::Arc;

use tracing::info;

use self::memory::MemoryStore;
use self::postgres::PostgresStore;
use self::repository::{RepoResult, StorageManager};

/// Initialize the PostgreSQL-backed storage layer: connect, run
/// migrations, seed the catalog, and wire every repository to the pool.
pub async fn init_postgres(
    database_url: &str,
    max_connections: u32,
) -> RepoResult<StorageManager> {
    let pg = Arc::new(PostgresStore::new(database_url, max_connections).await?);
    seed_data::seed_postgres(&pg).await?;

    let manager = StorageManager {
        players: pg.clone(),
        ledger: pg.clone(),
        progress: pg.clone(),
        leaderboard: pg.clone(),
        seasons: pg.clone(),
        catalog: pg.clone(),
        sessions: pg,
    };
    info!("StorageManager initialized (PostgreSQL backend)");
    Ok(manager)
}

/// Initialize the in-memory storage layer with seeded catalog data.
pub fn init_memory() -> StorageManager {
    let manager = MemoryStore::seeded().into_manager();
    info!("StorageManager initialized (in-memory backend)");
    manager
}
