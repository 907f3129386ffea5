//! # Repository Module
//!
//! One repository per table, each owning its SQL.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Service                                                               │
//! │     │  db.sales().create(&new_sale)                                    │
//! │     │  db.concerts().list(&query, &pagination)                         │
//! │     ▼                                                                   │
//! │  Repository                                                            │
//! │  ├── reads on the pool (no explicit transaction)                       │
//! │  ├── paged reads through listing::list_page                            │
//! │  └── sale writes through a UnitOfWork handed in explicitly             │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  SQLite                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`GenreRepository`](genre::GenreRepository) - Genre CRUD
//! - [`ConcertRepository`](concert::ConcertRepository) - Concert lookup, listing, finalize
//! - [`CustomerRepository`](customer::CustomerRepository) - Customer lookup by id/email
//! - [`SaleRepository`](sale::SaleRepository) - Transactional sale creation, listing, report

pub mod concert;
pub mod customer;
pub mod genre;
pub mod sale;
