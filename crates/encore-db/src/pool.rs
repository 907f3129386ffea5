//! # Store Handle
//!
//! Opens the Encore SQLite store and hands out repositories and units of
//! work that share one pool.
//!
//! ## Who waits for what
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  file store (WAL)                                                       │
//! │                                                                         │
//! │  readers ─────────────► any idle connection, never wait on the writer   │
//! │                                                                         │
//! │  writer A ── BEGIN IMMEDIATE ── holds the single write lock ──► COMMIT  │
//! │  writer B ── BEGIN IMMEDIATE ── busy ── retry for ≤ lock_timeout        │
//! │                                   │                                     │
//! │                                   └── still busy ──► DbError::Conflict  │
//! │                                                      (retryable)        │
//! │                                                                         │
//! │  request ── no idle connection for connect_timeout ──► PoolExhausted    │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  in-memory store (tests)                                                │
//! │                                                                         │
//! │  one connection owns the whole database; a second begin() waits for     │
//! │  the first UnitOfWork to be dropped                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `lock_timeout` is SQLite's `busy_timeout`, so a writer never queues
//! longer than that before the caller gets a chance to back off.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use encore_core::DEFAULT_MAX_RECORDS_PER_PAGE;

use crate::error::{DbError, DbResult};
use crate::listing::ReadConsistency;
use crate::migrations;
use crate::repository::concert::ConcertRepository;
use crate::repository::customer::CustomerRepository;
use crate::repository::genre::GenreRepository;
use crate::repository::sale::SaleRepository;
use crate::transaction::{IsolationLevel, UnitOfWork};

// =============================================================================
// Configuration
// =============================================================================

/// How to open the store and how long callers wait on it.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/encore/encore.db")
///     .max_connections(8)
///     .lock_timeout(Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Store file; ignored for in-memory stores.
    pub database_path: PathBuf,

    /// Concurrent readers plus the one writer.
    /// Default: 5
    pub max_connections: u32,

    /// Connections opened eagerly.
    /// Default: 1
    pub min_connections: u32,

    /// Wait for a free connection before `PoolExhausted`.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// File stores only; in-memory connections never idle out.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// How long a statement waits for another writer's lock before failing
    /// with a conflict (SQLite busy timeout).
    /// Default: 5 seconds
    pub lock_timeout: Duration,

    /// Upper bound for a whole sale-creation unit of work. When it elapses
    /// the transaction is rolled back.
    /// Default: 15 seconds
    pub transaction_timeout: Duration,

    /// Largest page size a listing accepts.
    /// Default: 50
    pub max_records_per_page: u32,

    /// Whether listings read count and page from one snapshot.
    /// Default: best effort (two round trips)
    pub read_consistency: ReadConsistency,

    /// Reject sales that would exceed a concert's ticket capacity.
    /// Default: false
    pub enforce_ticket_capacity: bool,

    /// Apply embedded migrations in `Database::new`.
    /// Default: true
    pub run_migrations: bool,

    in_memory: bool,
}

impl DbConfig {
    /// File-backed store at `path`, created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            lock_timeout: Duration::from_secs(5),
            transaction_timeout: Duration::from_secs(15),
            max_records_per_page: DEFAULT_MAX_RECORDS_PER_PAGE,
            read_consistency: ReadConsistency::BestEffort,
            enforce_ticket_capacity: false,
            run_migrations: true,
            in_memory: false,
        }
    }

    /// Throwaway store for unit tests.
    ///
    /// The database exists only inside its connection, so the pool holds
    /// exactly one that never expires. Tests must drop a `UnitOfWork`
    /// before beginning the next.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            in_memory: true,
            ..DbConfig::new(":memory:")
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Acquire timeout for pooled connections.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Upper bound on waiting for the write lock; past it a write fails with
    /// a retryable `Conflict`.
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Deadline for staging a sale once its transaction has begun.
    pub fn transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_timeout = timeout;
        self
    }

    pub fn max_records_per_page(mut self, max: u32) -> Self {
        self.max_records_per_page = max;
        self
    }

    pub fn read_consistency(mut self, consistency: ReadConsistency) -> Self {
        self.read_consistency = consistency;
        self
    }

    /// Check sold quantity against `tickets_quantity` inside the sale
    /// transaction.
    pub fn enforce_ticket_capacity(mut self, enforce: bool) -> Self {
        self.enforce_ticket_capacity = enforce;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let base = if self.in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };

        Ok(base
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(self.lock_timeout))
    }
}

/// Settings every repository needs from the configuration.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RepoSettings {
    pub transaction_timeout: Duration,
    pub max_records_per_page: u32,
    pub read_consistency: ReadConsistency,
    pub enforce_ticket_capacity: bool,
}

impl From<&DbConfig> for RepoSettings {
    fn from(config: &DbConfig) -> Self {
        RepoSettings {
            transaction_timeout: config.transaction_timeout,
            max_records_per_page: config.max_records_per_page,
            read_consistency: config.read_consistency,
            enforce_ticket_capacity: config.enforce_ticket_capacity,
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access and explicit
/// transactions.
///
/// Cheap to clone; every clone shares the same pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    settings: RepoSettings,
}

impl Database {
    /// Opens the store and, unless disabled, migrates it.
    ///
    /// Every connection gets foreign keys on, NORMAL sync and the
    /// configured `busy_timeout`; file stores also switch to WAL so listings
    /// keep reading while a sale holds the write lock.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            in_memory = config.in_memory,
            "Initializing database connection"
        );

        let connect_options = config.connect_options()?;
        debug!(lock_timeout_ms = config.lock_timeout.as_millis() as u64, "Connection options configured");

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout);

        pool_options = if config.in_memory {
            pool_options.idle_timeout(None).max_lifetime(None)
        } else {
            pool_options.idle_timeout(Some(config.idle_timeout))
        };

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database {
            pool,
            settings: RepoSettings::from(&config),
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations. Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Opens an explicit unit of work at the given isolation level.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let mut uow = db.begin(IsolationLevel::Serializable).await?;
    /// let sale = SaleRepository::stage(&mut uow, &new_sale, false).await?;
    /// uow.commit().await?;
    /// ```
    pub async fn begin(&self, isolation: IsolationLevel) -> DbResult<UnitOfWork> {
        UnitOfWork::begin(&self.pool, isolation).await
    }

    pub fn genres(&self) -> GenreRepository {
        GenreRepository::new(self.pool.clone())
    }

    pub fn concerts(&self) -> ConcertRepository {
        ConcertRepository::new(self.pool.clone(), self.settings)
    }

    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.pool.clone())
    }

    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone(), self.settings)
    }

    /// Largest page size listings accept.
    pub fn max_records_per_page(&self) -> u32 {
        self.settings.max_records_per_page
    }

    /// Closes the pool. Repository calls fail afterwards.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database can execute queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
