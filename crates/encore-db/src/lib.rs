//! # encore-db: Store Gateway for Encore
//!
//! Everything that talks to SQLite: the pool, explicit units of work, the
//! sale operation sequence, counted/paged listings and one repository per
//! table.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Encore Data Flow                                 │
//! │                                                                         │
//! │  SaleService::create_sale / list_sales                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     encore-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │  ┌────────────┐  ┌─────────────┐  ┌──────────┐  ┌───────────┐  │   │
//! │  │  │  Database  │  │ UnitOfWork  │  │ Sequence │  │  Listing  │  │   │
//! │  │  │  (pool.rs) │  │ BEGIN/COMMIT│  │ Generator│  │ count +   │  │   │
//! │  │  │            │  │ /ROLLBACK   │  │          │  │ fetch_page│  │   │
//! │  │  └─────┬──────┘  └──────┬──────┘  └────┬─────┘  └─────┬─────┘  │   │
//! │  │        └────────────────┴──────────────┴──────────────┘        │   │
//! │  │                 Genre / Concert / Customer / Sale repos         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL) ── migrations/sqlite/001_initial_schema.sql              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use encore_db::{Database, DbConfig, SaleQuery};
//! use encore_core::{NewSale, PaginationRequest};
//!
//! let db = Database::new(DbConfig::new("encore.db")).await?;
//!
//! let sale = db.sales().create(&NewSale { customer_id: 1, concert_id: 3, quantity: 2 }).await?;
//! println!("{}", sale.operation_number); // "000001"
//!
//! let page = db.sales().list(&SaleQuery::default(), &PaginationRequest::new(1, 10)).await?;
//! println!("{} of {}", page.items.len(), page.total_count);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod listing;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod sequence;
pub mod transaction;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use listing::{Listing, ReadConsistency};
pub use pool::{Database, DbConfig};
pub use sequence::SequenceGenerator;
pub use transaction::{IsolationLevel, TransactionState, UnitOfWork};

pub use repository::concert::{ConcertOrder, ConcertQuery, ConcertRepository};
pub use repository::customer::CustomerRepository;
pub use repository::genre::GenreRepository;
pub use repository::sale::{SaleOrder, SaleQuery, SaleRepository};
