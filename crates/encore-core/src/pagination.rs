//! # Pagination Engine
//!
//! Turns a client's `(page, records_per_page)` into an offset/limit window
//! and carries the total-count metadata that travels next to every page.
//!
//! ## Listing Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Paged Listing                                    │
//! │                                                                         │
//! │  PaginationRequest { page: 2, records_per_page: 2 }                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate(max) ──► ValidationError (page 0, size 0, size > max)        │
//! │       │            rejected before any query runs                      │
//! │       ▼                                                                 │
//! │  Slice { skip: 2, take: 2 }                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COUNT(*) with filter ──► total_count = 5                              │
//! │  SELECT ... ORDER BY key LIMIT 2 OFFSET 2 ──► items                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Page { items, total_count: 5 }  +  TotalRecordsQuantity: 5            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine knows nothing about the data. Callers must apply an explicit
//! ordering before the window; every listing in `encore-db` carries an order
//! key whose default is the row identifier.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::DEFAULT_RECORDS_PER_PAGE;

/// Name of the out-of-band total-count header exposed to API clients.
pub const TOTAL_RECORDS_HEADER: &str = "TotalRecordsQuantity";

// =============================================================================
// Request
// =============================================================================

/// A client's paging request. Both fields are 1-based / positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase", default)]
pub struct PaginationRequest {
    /// 1-based page number.
    pub page: u32,
    /// Page size.
    pub records_per_page: u32,
}

impl Default for PaginationRequest {
    fn default() -> Self {
        PaginationRequest {
            page: 1,
            records_per_page: DEFAULT_RECORDS_PER_PAGE,
        }
    }
}

impl PaginationRequest {
    pub fn new(page: u32, records_per_page: u32) -> Self {
        PaginationRequest {
            page,
            records_per_page,
        }
    }

    /// Validates the request against the configured maximum page size and
    /// returns the query window.
    pub fn validate(&self, max_records_per_page: u32) -> Result<Slice, ValidationError> {
        let window = slice(self.page, self.records_per_page)?;

        if self.records_per_page > max_records_per_page {
            return Err(ValidationError::OutOfRange {
                field: "records_per_page".to_string(),
                min: 1,
                max: i64::from(max_records_per_page),
            });
        }

        Ok(window)
    }
}

// =============================================================================
// Slice
// =============================================================================

/// Offset/limit window for a bounded query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    pub skip: i64,
    pub take: i64,
}

/// Computes `skip = (page - 1) * records_per_page`, `take = records_per_page`.
///
/// Zero values are rejected, never clamped.
///
/// ```rust
/// use encore_core::pagination::slice;
///
/// let window = slice(3, 2).unwrap();
/// assert_eq!((window.skip, window.take), (4, 2));
/// assert!(slice(1, 0).is_err());
/// ```
pub fn slice(page: u32, records_per_page: u32) -> Result<Slice, ValidationError> {
    if page == 0 {
        return Err(ValidationError::MustBePositive {
            field: "page".to_string(),
        });
    }

    if records_per_page == 0 {
        return Err(ValidationError::MustBePositive {
            field: "records_per_page".to_string(),
        });
    }

    let take = i64::from(records_per_page);
    let skip = (i64::from(page) - 1)
        .checked_mul(take)
        .ok_or_else(|| ValidationError::OutOfRange {
            field: "page".to_string(),
            min: 1,
            max: i64::MAX / take + 1,
        })?;

    Ok(Slice { skip, take })
}

/// Number of pages needed for `total_count` records: `ceil(total / size)`.
pub fn total_pages(total_count: i64, records_per_page: u32) -> i64 {
    if total_count <= 0 || records_per_page == 0 {
        return 0;
    }
    let size = i64::from(records_per_page);
    (total_count + size - 1) / size
}

// =============================================================================
// Page
// =============================================================================

/// One page of a listing plus the total-count metadata.
///
/// `total_count` counts every record matching the filter, not just this
/// page. It is computed in a separate round trip unless the listing was run
/// in snapshot mode, so under concurrent writes it may disagree with what a
/// client sees by walking all pages (read skew).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: i64,
    pub page: u32,
    pub records_per_page: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_count: i64, request: &PaginationRequest) -> Self {
        Page {
            items,
            total_count,
            page: request.page,
            records_per_page: request.records_per_page,
        }
    }

    pub fn total_pages(&self) -> i64 {
        total_pages(self.total_count, self.records_per_page)
    }

    pub fn is_last_page(&self) -> bool {
        i64::from(self.page) >= self.total_pages()
    }

    /// The header that carries `total_count` outside the item payload.
    pub fn total_count_header(&self) -> TotalCountHeader {
        TotalCountHeader::new(self.total_count)
    }

    /// Maps the items, keeping the metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            page: self.page,
            records_per_page: self.records_per_page,
        }
    }
}

/// Header-equivalent carrying the total record count of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotalCountHeader {
    pub name: &'static str,
    pub value: String,
}

impl TotalCountHeader {
    pub fn new(total_count: i64) -> Self {
        TotalCountHeader {
            name: TOTAL_RECORDS_HEADER,
            value: total_count.to_string(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
