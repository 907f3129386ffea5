//! # Service Error Type
//!
//! Typed outcome of every service operation.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Encore                                 │
//! │                                                                         │
//! │  API host                    Service layer                              │
//! │  ────────                    ─────────────                              │
//! │                                                                         │
//! │  sales.create_sale(email, request)                                      │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  DbError::Conflict ─── retried (RetryPolicy) ──┐                 │  │
//! │  │         │                                      │ exhausted       │  │
//! │  │         ▼                                      ▼                 │  │
//! │  │  DbError::* ──────────────────────────► ServiceError             │  │
//! │  │                                            │                     │  │
//! │  │                                            ├─ tracing (details)  │  │
//! │  │                                            ▼                     │  │
//! │  │                                    ErrorResponse {code, message} │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  { "code": "CONFLICT",                                                  │
//! │    "message": "The request collided with another one. Please retry." } │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `Display` text carries diagnostics and goes to the log only. Clients
//! get `public_message()`, which never includes store details.

use encore_core::ValidationError;
use encore_db::DbError;
use serde::Serialize;
use tracing::{debug, error, warn};

/// Error codes for service responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed (400)
    ValidationError,

    /// Resource not found (404)
    NotFound,

    /// Concurrent request won; safe to retry (409)
    Conflict,

    /// Business rule refused the operation (422)
    BusinessLogic,

    /// The unit of work was cancelled or timed out; nothing persisted (408)
    Cancelled,

    /// Commit/rollback failed (500)
    TransactionFailed,

    /// Store unreachable or saturated (503)
    Unavailable,

    /// Internal server error (500)
    Internal,
}

/// Service operation errors.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rejected: {0}")]
    BusinessRule(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        ServiceError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ServiceError::Validation(_) => ErrorCode::ValidationError,
            ServiceError::NotFound { .. } => ErrorCode::NotFound,
            ServiceError::Conflict(_) => ErrorCode::Conflict,
            ServiceError::BusinessRule(_) => ErrorCode::BusinessLogic,
            ServiceError::Cancelled(_) => ErrorCode::Cancelled,
            ServiceError::Transaction(_) => ErrorCode::TransactionFailed,
            ServiceError::Unavailable(_) => ErrorCode::Unavailable,
            ServiceError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Message safe to show a client.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::Validation(v) => v.to_string(),
            ServiceError::NotFound { entity, .. } => format!("{entity} was not found."),
            ServiceError::Conflict(_) => {
                "The request collided with another one. Please retry.".to_string()
            }
            ServiceError::BusinessRule(reason) => reason.clone(),
            ServiceError::Cancelled(_) => {
                "The operation was cancelled and nothing was saved.".to_string()
            }
            ServiceError::Transaction(_) | ServiceError::Internal(_) => {
                "An error occurred while processing the request.".to_string()
            }
            ServiceError::Unavailable(_) => {
                "The service is busy. Please try again later.".to_string()
            }
        }
    }

    /// Client-facing body: stable code plus public message.
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code(),
            message: self.public_message(),
        }
    }

    /// Logs the full diagnostics for `operation` and returns `self`.
    pub(crate) fn logged(self, operation: &'static str) -> Self {
        match self.code() {
            ErrorCode::ValidationError | ErrorCode::NotFound | ErrorCode::BusinessLogic => {
                debug!(operation, error = %self, "Request rejected");
            }
            ErrorCode::Conflict | ErrorCode::Cancelled => {
                warn!(operation, error = %self, "Request not completed");
            }
            ErrorCode::TransactionFailed | ErrorCode::Unavailable | ErrorCode::Internal => {
                error!(operation, error = %self, "Request failed");
            }
        }
        self
    }
}

/// What the API host serializes for a failed request.
///
/// ```json
/// { "code": "NOT_FOUND", "message": "Concert was not found." }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

/// Converts store errors to service errors.
impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Validation(v) => ServiceError::Validation(v),
            DbError::NotFound { entity, id } => ServiceError::NotFound { entity, id },
            DbError::UniqueViolation { field, value } => {
                ServiceError::BusinessRule(format!("{} '{}' already exists.", field_label(&field), value))
            }
            DbError::ForeignKeyViolation { .. } => ServiceError::BusinessRule(
                "The record is still referenced by other records.".to_string(),
            ),
            DbError::ConcertUnavailable { reason, .. } => {
                ServiceError::BusinessRule(format!("The concert is not available: {reason}."))
            }
            DbError::Conflict(msg) => ServiceError::Conflict(msg),
            DbError::Cancelled(msg) => ServiceError::Cancelled(msg),
            e @ DbError::InvalidTransactionState { .. } => ServiceError::Transaction(e.to_string()),
            DbError::TransactionFailed(msg) => ServiceError::Transaction(msg),
            DbError::PoolExhausted => ServiceError::Unavailable("connection pool exhausted".to_string()),
            DbError::ConnectionFailed(msg) => ServiceError::Unavailable(msg),
            e @ (DbError::MigrationFailed(_) | DbError::QueryFailed(_) | DbError::Internal(_)) => {
                ServiceError::Internal(e.to_string())
            }
        }
    }
}

/// `"genres.name"` → `"name"`.
fn field_label(field: &str) -> &str {
    field.rsplit('.').next().unwrap_or(field)
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
