//! # Domain Types
//!
//! Core domain types used throughout Encore.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Genre       │◄──│    Concert      │◄──│      Sale       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  id             │   │  id             │       │
//! │  │  name (unique)  │   │  title          │   │  operation_no   │       │
//! │  │  status         │   │  unit_price     │   │  quantity       │       │
//! │  └─────────────────┘   │  tickets_qty    │   │  total_cents    │       │
//! │                        │  finalized      │   └────────┬────────┘       │
//! │                        └─────────────────┘            │                │
//! │                                              ┌────────▼────────┐       │
//! │                                              │    Customer     │       │
//! │                                              │  email (unique) │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Row types (`Concert`, `Sale`) mirror their tables. Projection types
//! (`ConcertInfo`, `SaleInfo`) are what listings return; every relation they
//! show is joined explicitly by the query that builds them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::CoreError;
use crate::money::Money;
use crate::OPERATION_NUMBER_WIDTH;

// =============================================================================
// Operation Number
// =============================================================================

/// Human-facing sale identifier: the sale sequence value, zero-padded.
///
/// ## Format
/// ```text
/// sequence 17      → "000017"
/// sequence 999999  → "999999"
/// sequence 1000000 → "1000000"   (width grows, never truncates)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct OperationNumber(String);

impl OperationNumber {
    /// Formats a sequence value. Sequences start at 1.
    ///
    /// ```rust
    /// use encore_core::OperationNumber;
    ///
    /// assert_eq!(OperationNumber::from_sequence(17).unwrap().as_str(), "000017");
    /// assert!(OperationNumber::from_sequence(0).is_err());
    /// ```
    pub fn from_sequence(value: i64) -> Result<Self, CoreError> {
        if value < 1 {
            return Err(CoreError::InvalidSequenceValue(value));
        }
        Ok(OperationNumber(format!(
            "{:0width$}",
            value,
            width = OPERATION_NUMBER_WIDTH
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Sequence value this number was formatted from.
    pub fn sequence(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for OperationNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OperationNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Genre
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Genre {
    pub id: i64,
    pub name: String,
    pub status: bool,
}

/// Insert/update payload for a genre.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GenreInput {
    pub name: String,
    pub status: bool,
}

// =============================================================================
// Concert
// =============================================================================

/// A concert row. Read-mostly reference data for the sale path.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Concert {
    pub id: i64,
    pub genre_id: i64,
    pub title: String,
    pub description: String,
    pub extended_description: Option<String>,
    pub place: String,
    pub unit_price_cents: i64,
    #[ts(as = "String")]
    pub date_event: DateTime<Utc>,
    pub image_url: Option<String>,
    pub tickets_quantity: i64,
    pub finalized: bool,
    pub status: bool,
}

impl Concert {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Whether new sales may be recorded against this concert.
    pub fn is_on_sale(&self) -> bool {
        self.status && !self.finalized
    }
}

/// Creation payload for a concert. Image upload happens elsewhere; only the
/// resulting URL is stored.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewConcert {
    pub genre_id: i64,
    pub title: String,
    pub description: String,
    pub extended_description: Option<String>,
    pub place: String,
    pub unit_price_cents: i64,
    #[ts(as = "String")]
    pub date_event: DateTime<Utc>,
    pub image_url: Option<String>,
    pub tickets_quantity: i64,
}

/// Listing projection of a concert with its genre name joined in.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ConcertInfo {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub extended_description: Option<String>,
    pub place: String,
    pub unit_price_cents: i64,
    pub genre: String,
    pub genre_id: i64,
    #[ts(as = "String")]
    pub date_event: DateTime<Utc>,
    pub image_url: Option<String>,
    pub tickets_quantity: i64,
    pub finalized: bool,
    pub status: bool,
}

impl ConcertInfo {
    pub fn status_label(&self) -> &'static str {
        if self.status {
            "Active"
        } else {
            "Inactive"
        }
    }
}

// =============================================================================
// Customer
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: i64,
    pub email: String,
    pub full_name: String,
}

// =============================================================================
// Sale
// =============================================================================

/// A persisted sale. Created only by the sale transaction, never updated.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: i64,
    pub operation_number: OperationNumber,
    #[ts(as = "String")]
    pub sale_date: DateTime<Utc>,
    pub customer_id: i64,
    pub concert_id: i64,
    pub quantity: i64,
    pub total_cents: i64,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A sale-creation request. The operation number, timestamp and total are
/// assigned inside the creating transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewSale {
    pub customer_id: i64,
    pub concert_id: i64,
    pub quantity: i64,
}

/// Listing/detail projection of a sale with customer, concert and genre
/// joined in.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleInfo {
    pub id: i64,
    pub operation_number: OperationNumber,
    #[ts(as = "String")]
    pub sale_date: DateTime<Utc>,
    pub quantity: i64,
    pub total_cents: i64,
    pub customer_id: i64,
    pub customer_email: String,
    pub customer_name: String,
    pub concert_id: i64,
    pub concert_title: String,
    pub concert_place: String,
    #[ts(as = "String")]
    pub concert_date: DateTime<Utc>,
    pub genre: String,
}

/// One row of the per-concert sales report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleReportRow {
    pub concert_title: String,
    pub total_cents: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_number_padding() {
        assert_eq!(OperationNumber::from_sequence(1).unwrap().as_str(), "000001");
        assert_eq!(OperationNumber::from_sequence(17).unwrap().as_str(), "000017");
        assert_eq!(
            OperationNumber::from_sequence(999_999).unwrap().as_str(),
            "999999"
        );
        assert_eq!(
            OperationNumber::from_sequence(1_000_000).unwrap().as_str(),
            "1000000"
        );
    }

    #[test]
    fn test_operation_number_rejects_non_positive() {
        assert!(OperationNumber::from_sequence(0).is_err());
        assert!(OperationNumber::from_sequence(-3).is_err());
    }

    #[test]
    fn test_operation_number_sequence_roundtrip() {
        let number = OperationNumber::from_sequence(42).unwrap();
        assert_eq!(number.sequence(), Some(42));
        assert_eq!(number.to_string(), "000042");
    }

    #[test]
    fn test_operation_number_serializes_as_string() {
        let number = OperationNumber::from_sequence(3).unwrap();
        assert_eq!(serde_json::to_string(&number).unwrap(), "\"000003\"");
    }

    #[test]
    fn test_concert_on_sale() {
        let mut concert = Concert {
            id: 1,
            genre_id: 1,
            title: "Night Shift".to_string(),
            description: "Live".to_string(),
            extended_description: None,
            place: "Arena".to_string(),
            unit_price_cents: 4500,
            date_event: Utc::now(),
            image_url: None,
            tickets_quantity: 100,
            finalized: false,
            status: true,
        };
        assert!(concert.is_on_sale());
        assert_eq!(concert.unit_price().cents(), 4500);

        concert.finalized = true;
        assert!(!concert.is_on_sale());
    }
}
