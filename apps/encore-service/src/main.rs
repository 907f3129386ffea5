//! # Encore Service
//!
//! Opens the store, applies migrations and checks it is reachable.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  env ──► ServiceConfig ──► Database::new (pool + migrations)           │
//! │                                   │                                     │
//! │                                   ▼                                     │
//! │                            health_check ──► AppState ready              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tracing::{error, info};

use encore_service::{telemetry, AppState, ServiceConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    telemetry::init()?;

    info!("Starting Encore service...");

    let config = ServiceConfig::load()?;
    info!(
        database = %config.database_path.display(),
        max_connections = config.db_max_connections,
        max_records_per_page = config.max_records_per_page,
        read_consistency = ?config.read_consistency,
        "Configuration loaded"
    );

    let state = AppState::initialize(config).await?;

    if !state.db.health_check().await {
        error!("Database health check failed");
        state.db.close().await;
        return Err("database health check failed".into());
    }

    let (embedded, applied) = encore_db::migrations::migration_status(state.db.pool()).await?;
    info!(embedded, applied, "Database ready");

    state.db.close().await;
    info!("Shutdown complete");
    Ok(())
}
