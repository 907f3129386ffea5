//! # encore-core: Pure Logic for the Encore Box Office
//!
//! Domain types and the pure halves of the listing and sale-creation paths.
//! Nothing in this crate touches a database, the network, or the clock
//! beyond carrying timestamps.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Encore Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 API host (external collaborator)                │   │
//! │  │      routing, auth, DTO mapping, TotalRecordsQuantity header    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 encore-service (service logic)                  │   │
//! │  │        retry on conflict, typed outcomes, boundary logging      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ encore-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌────────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │ pagination │  │   money   │  │ validation│  │   │
//! │  │   │  Concert  │  │   Slice    │  │   Money   │  │   rules   │  │   │
//! │  │   │   Sale    │  │  Page<T>   │  │           │  │           │  │   │
//! │  │   └───────────┘  └────────────┘  └───────────┘  └───────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    encore-db (Database Layer)                   │   │
//! │  │         transactions, sequences, counts, bounded queries        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Concert, Sale, Customer, OperationNumber, ...)
//! - [`pagination`] - Pagination engine and page/total-count metadata
//! - [`money`] - Integer-cent money type
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use encore_core::pagination::{slice, PaginationRequest};
//!
//! let request = PaginationRequest::new(2, 2);
//! let window = request.validate(50).unwrap();
//! assert_eq!(window.skip, 2);
//! assert_eq!(window.take, 2);
//!
//! assert!(slice(0, 10).is_err());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod pagination;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use pagination::{Page, PaginationRequest, Slice, TotalCountHeader};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Minimum number of digits in an operation number.
///
/// Sequence values below one million render as exactly six digits
/// (`"000017"`); larger values keep all their digits.
pub const OPERATION_NUMBER_WIDTH: usize = 6;

/// Maximum tickets a single sale may include.
pub const MAX_TICKETS_PER_SALE: i64 = 100;

/// Default page size when a client does not send one.
pub const DEFAULT_RECORDS_PER_PAGE: u32 = 10;

/// Upper bound for `records_per_page` unless configured otherwise.
pub const DEFAULT_MAX_RECORDS_PER_PAGE: u32 = 50;
