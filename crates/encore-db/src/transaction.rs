//! # Unit of Work
//!
//! An explicit transaction handle that every participating repository call
//! receives as a parameter.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       UnitOfWork lifecycle                              │
//! │                                                                         │
//! │   Database::begin(isolation)                                           │
//! │        │   acquire pooled connection                                   │
//! │        │   BEGIN IMMEDIATE  (Serializable: take write lock now)        │
//! │        │   BEGIN DEFERRED   (Default: snapshot on first read)          │
//! │        ▼                                                                │
//! │   ┌─────────┐   commit()    ┌───────────┐                              │
//! │   │ Active  │──────────────►│ Committed │                              │
//! │   │         │               └───────────┘                              │
//! │   │         │  roll_back()  ┌────────────┐                             │
//! │   │         │──────────────►│ RolledBack │                             │
//! │   └─────────┘               └────────────┘                             │
//! │        │                                                                │
//! │        │ dropped while Active                                          │
//! │        ▼                                                                │
//! │   connection is closed instead of returned; SQLite discards the        │
//! │   open transaction                                                     │
//! │                                                                         │
//! │   commit()/roll_back() on Committed or RolledBack                      │
//! │        └──► DbError::InvalidTransactionState                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Serializable on SQLite
//! SQLite has one writer at a time. `BEGIN IMMEDIATE` takes the write lock up
//! front, so two sale transactions never interleave their read-then-write
//! steps. A second writer waits up to the busy timeout and then fails with
//! `DbError::Conflict`, which callers may retry.

use std::future::Future;

use sqlx::pool::PoolConnection;
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, error, warn};

use crate::error::{DbError, DbResult};

// =============================================================================
// Isolation
// =============================================================================

/// Isolation requested for a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    /// Deferred transaction. Reads see one consistent snapshot; the write
    /// lock is taken only if the transaction writes.
    Default,
    /// Immediate transaction. Holds the database write lock from `BEGIN`
    /// to commit/rollback.
    Serializable,
}

impl IsolationLevel {
    fn begin_statement(self) -> &'static str {
        match self {
            IsolationLevel::Default => "BEGIN DEFERRED",
            IsolationLevel::Serializable => "BEGIN IMMEDIATE",
        }
    }
}

/// Observable state of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

impl TransactionState {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionState::Active => "active",
            TransactionState::Committed => "committed",
            TransactionState::RolledBack => "rolled back",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, TransactionState::Active)
    }
}

// =============================================================================
// UnitOfWork
// =============================================================================

/// An open transaction on one pooled connection.
///
/// Not `Clone`; exactly one owner decides whether it commits.
#[derive(Debug)]
pub struct UnitOfWork {
    conn: PoolConnection<Sqlite>,
    isolation: IsolationLevel,
    state: TransactionState,
}

impl UnitOfWork {
    /// Acquires a connection and opens a transaction on it.
    ///
    /// ## Errors
    /// - `PoolExhausted` when no connection frees up within the acquire
    ///   timeout
    /// - `Conflict` when `BEGIN IMMEDIATE` cannot get the write lock within
    ///   the busy timeout
    /// - `TransactionFailed` for any other failure to begin
    pub async fn begin(pool: &SqlitePool, isolation: IsolationLevel) -> DbResult<Self> {
        let mut conn = pool.acquire().await?;

        (&mut *conn)
            .execute(isolation.begin_statement())
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::Conflict(msg) => DbError::Conflict(msg),
                other => DbError::TransactionFailed(format!("begin: {other}")),
            })?;

        debug!(?isolation, "Unit of work started");

        Ok(UnitOfWork {
            conn,
            isolation,
            state: TransactionState::Active,
        })
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// The connection statements of this unit of work run on.
    ///
    /// Fails once the unit of work has been committed or rolled back.
    pub fn connection(&mut self) -> DbResult<&mut SqliteConnection> {
        self.ensure_active("use")?;
        Ok(&mut *self.conn)
    }

    /// Makes every staged change durable.
    ///
    /// On failure the transaction is still active: the caller is expected
    /// to `roll_back` (or `abort`) it.
    pub async fn commit(&mut self) -> DbResult<()> {
        self.ensure_active("commit")?;

        (&mut *self.conn)
            .execute("COMMIT")
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::Conflict(msg) => DbError::Conflict(msg),
                other => DbError::TransactionFailed(format!("commit: {other}")),
            })?;

        self.state = TransactionState::Committed;
        debug!(isolation = ?self.isolation, "Unit of work committed");
        Ok(())
    }

    /// Discards every staged change.
    ///
    /// If the rollback statement itself fails the connection is closed
    /// rather than returned to the pool, so the store still discards the
    /// transaction. The handle is terminal either way.
    pub async fn roll_back(&mut self) -> DbResult<()> {
        self.ensure_active("roll back")?;

        let result = (&mut *self.conn).execute("ROLLBACK").await;
        self.state = TransactionState::RolledBack;

        match result {
            Ok(_) => {
                debug!(isolation = ?self.isolation, "Unit of work rolled back");
                Ok(())
            }
            Err(e) => {
                self.conn.close_on_drop();
                Err(DbError::TransactionFailed(format!("rollback: {e}")))
            }
        }
    }

    /// Rolls back after `cause` and returns the error to report.
    ///
    /// The original cause is kept unless the rollback itself fails.
    pub async fn abort(mut self, cause: DbError) -> DbError {
        if !self.is_active() {
            return cause;
        }

        match self.roll_back().await {
            Ok(()) => cause,
            Err(rollback_err) => {
                error!(%cause, %rollback_err, "Rollback failed after error");
                DbError::TransactionFailed(format!("{cause}; {rollback_err}"))
            }
        }
    }

    fn ensure_active(&self, operation: &'static str) -> DbResult<()> {
        if self.state.is_terminal() {
            return Err(DbError::InvalidTransactionState {
                operation,
                state: self.state.as_str(),
            });
        }
        Ok(())
    }
}

/// Runs `work` unless `cancel` resolves first.
///
/// `cancel` is checked before every poll of `work`. Cancellation drops
/// `work` at its current await point and surfaces as
/// `DbError::Cancelled`. Any unit of work `work` was using is left active
/// for the caller to roll back.
pub async fn until_cancelled<T, W, C>(work: W, cancel: C) -> DbResult<T>
where
    W: Future<Output = DbResult<T>>,
    C: Future<Output = ()>,
{
    tokio::select! {
        biased;
        () = cancel => Err(DbError::Cancelled("cancelled before commit".to_string())),
        result = work => result,
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if self.state == TransactionState::Active {
            warn!(isolation = ?self.isolation, "Unit of work dropped while active, discarding");
            self.conn.close_on_drop();
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
