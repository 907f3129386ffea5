//! # Sale Repository
//!
//! Transactional sale creation, sale lookups, the paged sale listing and
//! the per-concert sales report.
//!
//! ## Sale Creation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       create(&new_sale)                                 │
//! │                                                                         │
//! │  validate quantity / ids              ── fails before the store        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN IMMEDIATE                      ── write lock or Conflict         │
//! │       │                                                                 │
//! │       ├── customer exists?            ── NotFound                      │
//! │       ├── concert exists, on sale?    ── NotFound / ConcertUnavailable │
//! │       ├── capacity left? (optional)   ── ConcertUnavailable            │
//! │       ├── sequence.next()  → 000042                                    │
//! │       └── INSERT sales (..., '000042', now, qty * unit_price)          │
//! │       │                                                                 │
//! │       ├── any error / timeout / cancel ──► ROLLBACK, return the error  │
//! │       ▼                                                                 │
//! │  COMMIT                               ── sale and number both durable  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The sale date is read after the write lock is held, so sale dates follow
//! operation numbers.

use std::future::Future;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::listing::{self, contains_pattern, Listing};
use crate::pool::RepoSettings;
use crate::sequence::SequenceGenerator;
use crate::transaction::{until_cancelled, IsolationLevel, UnitOfWork};
use encore_core::validation::{
    normalize_search_term, validate_date_range, validate_id, validate_ticket_quantity,
};
use encore_core::{
    Concert, NewSale, Page, PaginationRequest, Sale, SaleInfo, SaleReportRow, ValidationError,
};

const SALE_COLUMNS: &str =
    "id, operation_number, sale_date, customer_id, concert_id, quantity, total_cents";

// =============================================================================
// Query
// =============================================================================

/// Sort key for the sale listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaleOrder {
    /// Creation order (row identifier).
    #[default]
    Created,
    /// Sale date, newest first.
    NewestFirst,
    /// Operation number, numerically.
    OperationNumber,
}

/// Filter for the sale listing.
#[derive(Debug, Clone, Default)]
pub struct SaleQuery {
    pub customer_id: Option<i64>,
    /// Exact customer email, case-insensitive.
    pub customer_email: Option<String>,
    pub concert_id: Option<i64>,
    /// Case-insensitive substring of the concert title.
    pub concert_title: Option<String>,
    pub sold_from: Option<DateTime<Utc>>,
    pub sold_to: Option<DateTime<Utc>>,
    pub order: SaleOrder,
}

impl SaleQuery {
    /// Sales of one customer, optionally narrowed by concert title.
    pub fn for_customer(email: &str, concert_title: Option<&str>) -> Result<Self, ValidationError> {
        Ok(SaleQuery {
            customer_email: Some(email.trim().to_string()),
            concert_title: normalize_search_term(concert_title)?,
            ..SaleQuery::default()
        })
    }

    pub fn concert(mut self, concert_id: i64) -> Self {
        self.concert_id = Some(concert_id);
        self
    }

    /// Inclusive sale date range.
    pub fn sold_between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.sold_from = Some(from);
        self.sold_to = Some(to);
        self
    }

    pub fn order_by(mut self, order: SaleOrder) -> Self {
        self.order = order;
        self
    }
}

impl Listing for SaleQuery {
    type Item = SaleInfo;

    fn entity(&self) -> &'static str {
        "Sale"
    }

    fn select_clause(&self) -> &'static str {
        "SELECT s.id, s.operation_number, s.sale_date, s.quantity, s.total_cents, \
         s.customer_id, cu.email AS customer_email, cu.full_name AS customer_name, \
         s.concert_id, c.title AS concert_title, c.place AS concert_place, \
         c.date_event AS concert_date, g.name AS genre"
    }

    fn from_clause(&self) -> &'static str {
        "FROM sales s \
         INNER JOIN customers cu ON cu.id = s.customer_id \
         INNER JOIN concerts c ON c.id = s.concert_id \
         INNER JOIN genres g ON g.id = c.genre_id"
    }

    fn push_predicate(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        if let Some(customer_id) = self.customer_id {
            builder.push(" AND s.customer_id = ");
            builder.push_bind(customer_id);
        }
        if let Some(email) = &self.customer_email {
            builder.push(" AND cu.email = ");
            builder.push_bind(email.clone());
            builder.push(" COLLATE NOCASE");
        }
        if let Some(concert_id) = self.concert_id {
            builder.push(" AND s.concert_id = ");
            builder.push_bind(concert_id);
        }
        if let Some(title) = &self.concert_title {
            builder.push(" AND c.title LIKE ");
            builder.push_bind(contains_pattern(title));
            builder.push(" ESCAPE '\\'");
        }
        if let Some(from) = self.sold_from {
            builder.push(" AND s.sale_date >= ");
            builder.push_bind(from);
        }
        if let Some(to) = self.sold_to {
            builder.push(" AND s.sale_date <= ");
            builder.push_bind(to);
        }
    }

    fn order_clause(&self) -> &'static str {
        match self.order {
            SaleOrder::Created => "s.id ASC",
            SaleOrder::NewestFirst => "s.sale_date DESC, s.id DESC",
            SaleOrder::OperationNumber => {
                "LENGTH(s.operation_number) ASC, s.operation_number ASC, s.id ASC"
            }
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
    settings: RepoSettings,
}

impl SaleRepository {
    pub(crate) fn new(pool: SqlitePool, settings: RepoSettings) -> Self {
        SaleRepository { pool, settings }
    }

    /// Creates a sale, bounded by the configured transaction timeout.
    ///
    /// ## Returns
    /// The committed sale with its operation number.
    ///
    /// ## Errors
    /// - `Validation` for a bad quantity or identifier (no transaction opened)
    /// - `NotFound` for an unknown customer or concert
    /// - `ConcertUnavailable` for a finalized/inactive concert or no capacity
    /// - `Conflict` when a concurrent sale held the write lock too long
    /// - `Cancelled` when the timeout elapsed; nothing was persisted
    pub async fn create(&self, new_sale: &NewSale) -> DbResult<Sale> {
        self.create_until(new_sale, std::future::pending()).await
    }

    /// Creates a sale unless `cancel` resolves (or the transaction timeout
    /// elapses) before the commit starts.
    ///
    /// Waiting for the write lock is bounded by the lock timeout rather than
    /// `cancel`. Once the commit statement is issued it runs to completion.
    pub async fn create_until<C>(&self, new_sale: &NewSale, cancel: C) -> DbResult<Sale>
    where
        C: Future<Output = ()>,
    {
        validate_new_sale(new_sale)?;

        let mut uow = UnitOfWork::begin(&self.pool, IsolationLevel::Serializable).await?;

        let timeout = self.settings.transaction_timeout;
        let staged = tokio::time::timeout(
            timeout,
            until_cancelled(
                Self::stage(&mut uow, new_sale, self.settings.enforce_ticket_capacity),
                cancel,
            ),
        )
        .await
        .unwrap_or_else(|_| {
            Err(DbError::Cancelled(format!(
                "transaction timed out after {}ms",
                timeout.as_millis()
            )))
        });

        let sale = match staged {
            Ok(sale) => sale,
            Err(e) => return Err(uow.abort(e).await),
        };

        if let Err(e) = uow.commit().await {
            return Err(uow.abort(e).await);
        }

        info!(
            id = sale.id,
            operation_number = %sale.operation_number,
            concert_id = sale.concert_id,
            quantity = sale.quantity,
            "Sale created"
        );
        Ok(sale)
    }

    /// Stages a sale inside the caller's unit of work.
    ///
    /// Nothing is visible to other connections until `uow` commits; a
    /// rollback discards the row and the consumed sequence value together.
    pub async fn stage(
        uow: &mut UnitOfWork,
        new_sale: &NewSale,
        enforce_ticket_capacity: bool,
    ) -> DbResult<Sale> {
        validate_new_sale(new_sale)?;

        let customer: Option<i64> = sqlx::query_scalar("SELECT id FROM customers WHERE id = ?1")
            .bind(new_sale.customer_id)
            .fetch_optional(uow.connection()?)
            .await?;
        if customer.is_none() {
            return Err(DbError::not_found("Customer", new_sale.customer_id));
        }

        let concert = sqlx::query_as::<_, Concert>(
            "SELECT id, genre_id, title, description, extended_description, place, \
             unit_price_cents, date_event, image_url, tickets_quantity, finalized, status \
             FROM concerts WHERE id = ?1",
        )
        .bind(new_sale.concert_id)
        .fetch_optional(uow.connection()?)
        .await?
        .ok_or_else(|| DbError::not_found("Concert", new_sale.concert_id))?;

        if !concert.is_on_sale() {
            let reason = if concert.finalized { "finalized" } else { "inactive" };
            return Err(DbError::ConcertUnavailable {
                concert_id: concert.id,
                reason: reason.to_string(),
            });
        }

        if enforce_ticket_capacity {
            let sold: i64 = sqlx::query_scalar(
                "SELECT COALESCE(SUM(quantity), 0) FROM sales WHERE concert_id = ?1",
            )
            .bind(concert.id)
            .fetch_one(uow.connection()?)
            .await?;

            let remaining = concert.tickets_quantity - sold;
            if new_sale.quantity > remaining {
                return Err(DbError::ConcertUnavailable {
                    concert_id: concert.id,
                    reason: format!("only {} tickets left", remaining.max(0)),
                });
            }
        }

        let total = concert.unit_price().times(new_sale.quantity)?;
        let operation_number = SequenceGenerator::sale_operations()
            .next_operation_number(uow)
            .await?;
        let sale_date = Utc::now();

        debug!(
            operation_number = %operation_number,
            concert_id = concert.id,
            total_cents = total.cents(),
            "Staging sale"
        );

        let sale = sqlx::query_as::<_, Sale>(&format!(
            "INSERT INTO sales (operation_number, sale_date, customer_id, concert_id, quantity, total_cents) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING {SALE_COLUMNS}"
        ))
        .bind(&operation_number)
        .bind(sale_date)
        .bind(new_sale.customer_id)
        .bind(new_sale.concert_id)
        .bind(new_sale.quantity)
        .bind(total.cents())
        .fetch_one(uow.connection()?)
        .await
        .map_err(|e| match DbError::from(e) {
            // The sequence and the unique index disagree; another writer got
            // this number. Retrying re-reads the sequence.
            DbError::UniqueViolation { .. } => {
                DbError::Conflict(format!("operation number {operation_number} already taken"))
            }
            other => other,
        })?;

        Ok(sale)
    }

    /// Gets a sale row by ID.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(sale)
    }

    /// Gets a sale with customer, concert and genre joined in.
    pub async fn get_info(&self, id: i64) -> DbResult<Option<SaleInfo>> {
        let query = SaleQuery::default();
        let sql = format!(
            "{} {} WHERE s.id = ?1",
            query.select_clause(),
            query.from_clause()
        );

        let info = sqlx::query_as::<_, SaleInfo>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(info)
    }

    /// Lists one page of sales with the total count.
    pub async fn list(&self, query: &SaleQuery, request: &PaginationRequest) -> DbResult<Page<SaleInfo>> {
        listing::list_page(
            &self.pool,
            query,
            request,
            self.settings.max_records_per_page,
            self.settings.read_consistency,
        )
        .await
    }

    /// Counts sales matching the filter.
    pub async fn count(&self, query: &SaleQuery) -> DbResult<i64> {
        listing::count(&self.pool, query).await
    }

    /// Sum of sale totals per concert title over an inclusive date range.
    pub async fn report(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> DbResult<Vec<SaleReportRow>> {
        validate_date_range(from, to)?;

        let rows = sqlx::query_as::<_, SaleReportRow>(
            r#"
            SELECT c.title AS concert_title, SUM(s.total_cents) AS total_cents
            FROM sales s
            INNER JOIN concerts c ON c.id = s.concert_id
            WHERE s.sale_date >= ?1 AND s.sale_date <= ?2
            GROUP BY c.title
            ORDER BY c.title ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        debug!(rows = rows.len(), "Sale report built");
        Ok(rows)
    }
}

fn validate_new_sale(new_sale: &NewSale) -> DbResult<()> {
    validate_id("customer_id", new_sale.customer_id)?;
    validate_id("concert_id", new_sale.concert_id)?;
    validate_ticket_quantity(new_sale.quantity)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Duration;
    use encore_core::{GenreInput, NewConcert};

    struct Fixture {
        db: Database,
        customer_id: i64,
        concert_id: i64,
    }

    async fn fixture(config: DbConfig) -> Fixture {
        let db = Database::new(config).await.unwrap();
        let genre = db
            .genres()
            .insert(&GenreInput { name: "Rock".into(), status: true })
            .await
            .unwrap();
        let concert = db
            .concerts()
            .insert(&NewConcert {
                genre_id: genre.id,
                title: "Night Shift".into(),
                description: "Live".into(),
                extended_description: None,
                place: "Arena".into(),
                unit_price_cents: 4500,
                date_event: Utc::now() + Duration::days(30),
                image_url: None,
                tickets_quantity: 5,
            })
            .await
            .unwrap();
        let customer = db.customers().insert("fan@example.com", "Ada Fan").await.unwrap();

        Fixture {
            db,
            customer_id: customer.id,
            concert_id: concert.id,
        }
    }

    fn new_sale(f: &Fixture, quantity: i64) -> NewSale {
        NewSale {
            customer_id: f.customer_id,
            concert_id: f.concert_id,
            quantity,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_number_and_total() {
        let f = fixture(DbConfig::in_memory()).await;

        let first = f.db.sales().create(&new_sale(&f, 2)).await.unwrap();
        let second = f.db.sales().create(&new_sale(&f, 1)).await.unwrap();

        assert_eq!(first.operation_number.as_str(), "000001");
        assert_eq!(second.operation_number.as_str(), "000002");
        assert_eq!(first.total_cents, 9000);
        assert!(second.sale_date >= first.sale_date);

        let info = f.db.sales().get_info(first.id).await.unwrap().unwrap();
        assert_eq!(info.customer_email, "fan@example.com");
        assert_eq!(info.concert_title, "Night Shift");
        assert_eq!(info.genre, "Rock");
    }

    #[tokio::test]
    async fn test_invalid_quantity_rejected_before_store() {
        let f = fixture(DbConfig::in_memory()).await;

        let err = f.db.sales().create(&new_sale(&f, 0)).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
        assert_eq!(f.db.sales().count(&SaleQuery::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_references() {
        let f = fixture(DbConfig::in_memory()).await;

        let mut sale = new_sale(&f, 1);
        sale.concert_id = 999;
        assert!(f.db.sales().create(&sale).await.unwrap_err().is_not_found());

        let mut sale = new_sale(&f, 1);
        sale.customer_id = 999;
        assert!(f.db.sales().create(&sale).await.unwrap_err().is_not_found());

        // Failed attempts consume no operation numbers.
        let ok = f.db.sales().create(&new_sale(&f, 1)).await.unwrap();
        assert_eq!(ok.operation_number.as_str(), "000001");
    }

    #[tokio::test]
    async fn test_finalized_concert_takes_no_sales() {
        let f = fixture(DbConfig::in_memory()).await;
        f.db.concerts().finalize(f.concert_id).await.unwrap();

        let err = f.db.sales().create(&new_sale(&f, 1)).await.unwrap_err();
        assert!(matches!(err, DbError::ConcertUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_capacity_enforced_when_enabled() {
        let f = fixture(DbConfig::in_memory().enforce_ticket_capacity(true)).await;

        f.db.sales().create(&new_sale(&f, 4)).await.unwrap();
        let err = f.db.sales().create(&new_sale(&f, 2)).await.unwrap_err();
        assert!(matches!(err, DbError::ConcertUnavailable { ref reason, .. } if reason == "only 1 tickets left"));
        f.db.sales().create(&new_sale(&f, 1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_capacity_ignored_by_default() {
        let f = fixture(DbConfig::in_memory()).await;

        f.db.sales().create(&new_sale(&f, 4)).await.unwrap();
        f.db.sales().create(&new_sale(&f, 4)).await.unwrap();
        assert_eq!(f.db.sales().count(&SaleQuery::default()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cancel_rolls_back() {
        let f = fixture(DbConfig::in_memory()).await;

        let err = f
            .db
            .sales()
            .create_until(&new_sale(&f, 1), std::future::ready(()))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Cancelled(_)));

        assert_eq!(f.db.sales().count(&SaleQuery::default()).await.unwrap(), 0);
        let next = f.db.sales().create(&new_sale(&f, 1)).await.unwrap();
        assert_eq!(next.operation_number.as_str(), "000001");
    }

    #[tokio::test]
    async fn test_report_sums_per_concert() {
        let f = fixture(DbConfig::in_memory()).await;
        let start = Utc::now() - Duration::minutes(1);

        f.db.sales().create(&new_sale(&f, 1)).await.unwrap();
        f.db.sales().create(&new_sale(&f, 2)).await.unwrap();

        let rows = f
            .db
            .sales()
            .report(start, Utc::now() + Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(
            rows,
            vec![SaleReportRow {
                concert_title: "Night Shift".into(),
                total_cents: 13500,
            }]
        );

        let empty = f
            .db
            .sales()
            .report(start - Duration::days(2), start - Duration::days(1))
            .await
            .unwrap();
        assert!(empty.is_empty());

        assert!(f.db.sales().report(Utc::now(), start).await.is_err());
    }

    #[tokio::test]
    async fn test_list_for_customer() {
        let f = fixture(DbConfig::in_memory()).await;
        let other = f.db.customers().insert("other@example.com", "Bo").await.unwrap();

        f.db.sales().create(&new_sale(&f, 1)).await.unwrap();
        f.db.sales()
            .create(&NewSale { customer_id: other.id, concert_id: f.concert_id, quantity: 1 })
            .await
            .unwrap();
        f.db.sales().create(&new_sale(&f, 3)).await.unwrap();

        let query = SaleQuery::for_customer("FAN@example.com", Some("night")).unwrap();
        let page = f
            .db
            .sales()
            .list(&query, &PaginationRequest::new(1, 10))
            .await
            .unwrap();

        assert_eq!(page.total_count, 2);
        let numbers: Vec<&str> = page.items.iter().map(|s| s.operation_number.as_str()).collect();
        assert_eq!(numbers, vec!["000001", "000003"]);
    }
}
