use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use match_tower_server::{api, config::ServerConfig, storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ServerConfig::from_env();
    info!("Starting match-tower server (port {})", config.api_port);

    // PostgreSQL connection pool + auto-run migrations + catalog seed.
    // MEMORY_BACKEND=1 runs without a database (local dev / smoke tests).
    let storage = if std::env::var("MEMORY_BACKEND").is_ok() {
        Arc::new(storage::init_memory())
    } else {
        info!("Connecting to PostgreSQL: {}", config.database_url);
        match storage::init_postgres(&config.database_url, config.pg_max_connections).await {
            Ok(manager) => Arc::new(manager),
            Err(e) => {
                error!("PostgreSQL initialization failed: {}", e);
                error!("Set MEMORY_BACKEND=1 to run without a database");
                return Err(anyhow::anyhow!("storage initialization failed: {e}"));
            }
        }
    };

    let serve = api::start_api_server(storage, config.api_port);
    tokio::select! {
        result = serve => {
            if let Err(e) = result {
                error!("API server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    Ok(())
}
