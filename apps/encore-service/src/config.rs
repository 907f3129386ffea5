//! Service configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//!
//! | Variable                  | Default       |
//! |---------------------------|---------------|
//! | `DATABASE_PATH`           | `encore.db`   |
//! | `DB_MAX_CONNECTIONS`      | `5`           |
//! | `DB_LOCK_TIMEOUT_MS`      | `5000`        |
//! | `TRANSACTION_TIMEOUT_MS`  | `15000`       |
//! | `MAX_RECORDS_PER_PAGE`    | `50`          |
//! | `READ_CONSISTENCY`        | `best_effort` |
//! | `MAX_CONFLICT_RETRIES`    | `3`           |
//! | `RETRY_BACKOFF_MS`        | `50`          |
//! | `ENFORCE_TICKET_CAPACITY` | `false`       |

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use encore_db::{DbConfig, ReadConsistency};

use crate::retry::RetryPolicy;

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size
    pub db_max_connections: u32,

    /// How long a writer waits for the store's write lock
    pub db_lock_timeout: Duration,

    /// Upper bound for one sale-creation unit of work
    pub transaction_timeout: Duration,

    /// Largest accepted page size
    pub max_records_per_page: u32,

    /// Whether listings read count and page from one snapshot
    pub read_consistency: ReadConsistency,

    /// Extra attempts after a retryable conflict
    pub max_conflict_retries: u32,

    /// Base delay between conflict retries (grows linearly)
    pub retry_backoff: Duration,

    /// Reject sales beyond a concert's ticket capacity
    pub enforce_ticket_capacity: bool,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = ServiceConfig {
            database_path: lookup("DATABASE_PATH")
                .unwrap_or_else(|| "encore.db".to_string())
                .into(),

            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?,

            db_lock_timeout: Duration::from_millis(parse_or(&lookup, "DB_LOCK_TIMEOUT_MS", 5_000)?),

            transaction_timeout: Duration::from_millis(parse_or(
                &lookup,
                "TRANSACTION_TIMEOUT_MS",
                15_000,
            )?),

            max_records_per_page: parse_or(
                &lookup,
                "MAX_RECORDS_PER_PAGE",
                encore_core::DEFAULT_MAX_RECORDS_PER_PAGE,
            )?,

            read_consistency: match lookup("READ_CONSISTENCY").as_deref() {
                None | Some("best_effort") => ReadConsistency::BestEffort,
                Some("snapshot") => ReadConsistency::Snapshot,
                Some(_) => return Err(ConfigError::InvalidValue("READ_CONSISTENCY".to_string())),
            },

            max_conflict_retries: parse_or(&lookup, "MAX_CONFLICT_RETRIES", 3)?,

            retry_backoff: Duration::from_millis(parse_or(&lookup, "RETRY_BACKOFF_MS", 50)?),

            enforce_ticket_capacity: parse_or(&lookup, "ENFORCE_TICKET_CAPACITY", false)?,
        };

        if config.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }
        if config.max_records_per_page == 0 {
            return Err(ConfigError::InvalidValue("MAX_RECORDS_PER_PAGE".to_string()));
        }

        Ok(config)
    }

    /// Store configuration derived from this service configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path)
            .max_connections(self.db_max_connections)
            .lock_timeout(self.db_lock_timeout)
            .transaction_timeout(self.transaction_timeout)
            .max_records_per_page(self.max_records_per_page)
            .read_consistency(self.read_consistency)
            .enforce_ticket_capacity(self.enforce_ticket_capacity)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_conflict_retries, self.retry_backoff)
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
