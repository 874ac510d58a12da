//! Match Tower Server Library
//!
//! Server-side state backend for the match-3 / tower-climb mobile game:
//! - Player accounts, currency ledger, and entitlements (upgrades, weapons)
//! - Monotonic level/tower progress tracking
//! - Per-season leaderboards with dense rank assignment
//! - JSON-over-HTTP API for the game client

pub mod api;      // HTTP/JSON API endpoints
pub mod config;   // Env-derived server configuration
pub mod error;    // API error type + stable wire codes
pub mod metrics;  // Server metrics (Prometheus + JSON export)
pub mod models;   // Flat record types shared across layers
pub mod ranking;  // Dense rank assignment for season leaderboards
pub mod storage;  // Repository traits + PostgreSQL/in-memory backends

// Re-export commonly used types
pub use storage::memory::MemoryStore;
pub use storage::postgres::PostgresStore;
pub use storage::repository::{StorageManager, StoreError};
