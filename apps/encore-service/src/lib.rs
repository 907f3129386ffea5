//! # Encore Service
//!
//! Service logic an API host calls for the concert catalog and ticket sales.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Encore Services                                 │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  SaleService   │  │ ConcertService │  │  GenreService              ││
//! │  │                │  │                │  │                            ││
//! │  │ • create_sale  │  │ • list_concerts│  │ • list / get               ││
//! │  │ • list_sales   │  │ • get_concert  │  │ • create / update          ││
//! │  │ • by_customer  │  │ • create       │  │ • delete                   ││
//! │  │ • sale_report  │  │ • finalize     │  │                            ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      Infrastructure                               │  │
//! │  │                                                                   │  │
//! │  │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────────┐│  │
//! │  │  │  SQLite      │  │ RetryPolicy  │  │  ServiceError            ││  │
//! │  │  │  (encore-db) │  │              │  │                          ││  │
//! │  │  │ units of work│  │ conflicts    │  │ code + public message    ││  │
//! │  │  └──────────────┘  └──────────────┘  └──────────────────────────┘│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables, see [`config`]. The most relevant:
//! - `DATABASE_PATH` - SQLite file (default: encore.db)
//! - `MAX_RECORDS_PER_PAGE` - largest accepted page size (default: 50)
//! - `MAX_CONFLICT_RETRIES` - retries after a write conflict (default: 3)

pub mod config;
pub mod error;
pub mod retry;
pub mod services;
pub mod telemetry;

// Re-exports
pub use config::{ConfigError, ServiceConfig};
pub use error::{ErrorCode, ErrorResponse, ServiceError, ServiceResult};
pub use retry::RetryPolicy;
pub use services::{
    ConcertService, CreateSaleRequest, GenreService, SaleSearch, SaleService,
};

use encore_db::{Database, DbResult};

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    pub config: ServiceConfig,
    pub sales: SaleService,
    pub concerts: ConcertService,
    pub genres: GenreService,
}

impl AppState {
    /// Opens the store described by `config` and wires the services to it.
    pub async fn initialize(config: ServiceConfig) -> DbResult<Self> {
        let db = Database::new(config.db_config()).await?;
        Ok(AppState::with_database(db, config))
    }

    /// Wires services to an already opened store.
    pub fn with_database(db: Database, config: ServiceConfig) -> Self {
        let retry = config.retry_policy();
        AppState {
            sales: SaleService::new(db.clone(), retry),
            concerts: ConcertService::new(db.clone(), retry),
            genres: GenreService::new(db.clone(), retry),
            db,
            config,
        }
    }
}
