//! # Customer Repository
//!
//! Customers are identified to the sale path by the authenticated email;
//! the service resolves that email to a row here before creating a sale.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use encore_core::validation::{validate_email, validate_required_text};
use encore_core::Customer;

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            "SELECT id, email, full_name FROM customers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Gets a customer by email. Emails compare case-insensitively.
    pub async fn get_by_email(&self, email: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            "SELECT id, email, full_name FROM customers WHERE email = ?1 COLLATE NOCASE",
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Registers a customer.
    ///
    /// ## Errors
    /// - `Validation` for a malformed email or empty name
    /// - `UniqueViolation` if the email is already registered
    pub async fn insert(&self, email: &str, full_name: &str) -> DbResult<Customer> {
        validate_email(email)?;
        validate_required_text("full_name", full_name, 100)?;
        let email = email.trim().to_lowercase();

        debug!(email = %email, "Inserting customer");

        sqlx::query_as::<_, Customer>(
            "INSERT INTO customers (email, full_name) VALUES (?1, ?2) RETURNING id, email, full_name",
        )
        .bind(&email)
        .bind(full_name.trim())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation { field, value: email.clone() },
            other => other,
        })
    }
}
