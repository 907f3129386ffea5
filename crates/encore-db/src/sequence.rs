//! # Sequence Generator
//!
//! Named, gap-free counters that advance inside the caller's unit of work.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sequences                                                              │
//! │  ┌──────────────────┬────────────┐                                      │
//! │  │ name             │ last_value │                                      │
//! │  ├──────────────────┼────────────┤                                      │
//! │  │ sale_operation   │ 41         │ ◄── UPSERT ... RETURNING last_value  │
//! │  └──────────────────┴────────────┘      inside BEGIN IMMEDIATE          │
//! │                                                                         │
//! │  commit   → 42 is consumed                                             │
//! │  rollback → row returns to 41; the next sale gets 42 again             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The increment is a single statement, so it never reads a stale value
//! even outside an immediate transaction. The `UNIQUE` constraint on
//! `sales.operation_number` stays in place as a backstop.

use sqlx::{Executor, Sqlite};
use tracing::debug;

use encore_core::OperationNumber;

use crate::error::DbResult;
use crate::transaction::UnitOfWork;

/// Sequence that numbers sales.
pub const SALE_OPERATION_SEQUENCE: &str = "sale_operation";

/// A named counter stored in the `sequences` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceGenerator {
    name: &'static str,
}

impl SequenceGenerator {
    pub const fn new(name: &'static str) -> Self {
        SequenceGenerator { name }
    }

    /// The generator behind sale operation numbers.
    pub const fn sale_operations() -> Self {
        SequenceGenerator::new(SALE_OPERATION_SEQUENCE)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Advances the counter and returns the new value. The first call for
    /// a name returns 1.
    ///
    /// The value is only consumed if `uow` commits.
    pub async fn next(&self, uow: &mut UnitOfWork) -> DbResult<i64> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sequences (name, last_value)
            VALUES (?1, 1)
            ON CONFLICT (name) DO UPDATE SET last_value = last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(self.name)
        .fetch_one(uow.connection()?)
        .await?;

        debug!(sequence = self.name, value, "Sequence advanced");
        Ok(value)
    }

    /// Advances the counter and formats the value as an operation number.
    pub async fn next_operation_number(&self, uow: &mut UnitOfWork) -> DbResult<OperationNumber> {
        let value = self.next(uow).await?;
        Ok(OperationNumber::from_sequence(value)?)
    }

    /// Last committed value, 0 when the counter was never used.
    pub async fn current<'c, E>(&self, executor: E) -> DbResult<i64>
    where
        E: Executor<'c, Database = Sqlite>,
    {
        let value: Option<i64> =
            sqlx::query_scalar("SELECT last_value FROM sequences WHERE name = ?1")
                .bind(self.name)
                .fetch_optional(executor)
                .await?;

        Ok(value.unwrap_or(0))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
