//! Service implementations.
//!
//! Each service owns a [`Database`](encore_db::Database) handle and the
//! retry policy, and returns [`ServiceResult`](crate::error::ServiceResult).

pub mod concert_service;
pub mod genre_service;
pub mod sale_service;

pub use concert_service::ConcertService;
pub use genre_service::GenreService;
pub use sale_service::{CreateSaleRequest, SaleSearch, SaleService};
