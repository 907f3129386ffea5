//! # Paged Listings
//!
//! Counted, ordered, bounded queries over a filtered set.
//!
//! ## Two Queries, One Filter
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Listing (ConcertQuery, SaleQuery, ...)                                │
//! │    select_clause   SELECT c.id, c.title, g.name AS genre, ...          │
//! │    from_clause     FROM concerts c INNER JOIN genres g ON ...          │
//! │    push_predicate  AND c.title LIKE ?                                  │
//! │    order_clause    c.id ASC                                            │
//! │                                                                         │
//! │  count()       SELECT COUNT(*) <from> WHERE 1 = 1 <predicate>          │
//! │  fetch_page()  <select> <from> WHERE 1 = 1 <predicate>                 │
//! │                ORDER BY <order> LIMIT ? OFFSET ?                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both queries are built from the same `Listing`, so the count can never
//! use a different filter than the page.
//!
//! ## Consistency
//! With [`ReadConsistency::BestEffort`] the two queries run as separate
//! statements and a sale committed between them makes the total disagree
//! with the pages by one. [`ReadConsistency::Snapshot`] runs both inside one
//! deferred unit of work, which in WAL mode reads a single snapshot.

use encore_core::{Page, PaginationRequest, Slice};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::transaction::{IsolationLevel, UnitOfWork};

/// How the total count and the page relate under concurrent writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadConsistency {
    /// Count and page are independent reads.
    #[default]
    BestEffort,
    /// Count and page come from one read snapshot.
    Snapshot,
}

/// A filtered, ordered projection that can be counted and paged.
pub trait Listing: Send + Sync {
    /// Row type produced by `select_clause`.
    type Item: for<'r> FromRow<'r, SqliteRow> + Send + Unpin;

    /// Entity name used in logs.
    fn entity(&self) -> &'static str;

    /// `SELECT ...` column list, including joined columns.
    fn select_clause(&self) -> &'static str;

    /// `FROM ...` including every join the projection and the filter need.
    fn from_clause(&self) -> &'static str;

    /// Appends ` AND ...` conditions after `WHERE 1 = 1`.
    fn push_predicate(&self, builder: &mut QueryBuilder<'_, Sqlite>);

    /// `ORDER BY` expression. Must end in a unique key.
    fn order_clause(&self) -> &'static str;
}

/// Counts every record the listing's filter matches.
pub async fn count<'c, E, L>(executor: E, listing: &L) -> DbResult<i64>
where
    E: Executor<'c, Database = Sqlite>,
    L: Listing,
{
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) ");
    builder.push(listing.from_clause());
    builder.push(" WHERE 1 = 1");
    listing.push_predicate(&mut builder);

    let total: i64 = builder.build_query_scalar().fetch_one(executor).await?;
    Ok(total)
}

/// Fetches one ordered window of the listing.
pub async fn fetch_page<'c, E, L>(executor: E, listing: &L, window: Slice) -> DbResult<Vec<L::Item>>
where
    E: Executor<'c, Database = Sqlite>,
    L: Listing,
{
    let mut builder = QueryBuilder::<Sqlite>::new(listing.select_clause());
    builder.push(" ");
    builder.push(listing.from_clause());
    builder.push(" WHERE 1 = 1");
    listing.push_predicate(&mut builder);
    builder.push(" ORDER BY ");
    builder.push(listing.order_clause());
    builder.push(" LIMIT ");
    builder.push_bind(window.take);
    builder.push(" OFFSET ");
    builder.push_bind(window.skip);

    let items = builder
        .build_query_as::<L::Item>()
        .fetch_all(executor)
        .await?;
    Ok(items)
}

/// Validates the request, then returns the page and the total count.
///
/// An invalid request (page 0, size 0, size above `max_records_per_page`)
/// fails before any query runs.
pub async fn list_page<L: Listing>(
    pool: &SqlitePool,
    listing: &L,
    request: &PaginationRequest,
    max_records_per_page: u32,
    consistency: ReadConsistency,
) -> DbResult<Page<L::Item>> {
    let window = request.validate(max_records_per_page)?;

    let (total, items) = match consistency {
        ReadConsistency::BestEffort => {
            let total = count(pool, listing).await?;
            let items = fetch_page(pool, listing, window).await?;
            (total, items)
        }
        ReadConsistency::Snapshot => {
            let mut uow = UnitOfWork::begin(pool, IsolationLevel::Default).await?;

            let result = async {
                let total = count(uow.connection()?, listing).await?;
                let items = fetch_page(uow.connection()?, listing, window).await?;
                DbResult::Ok((total, items))
            }
            .await;

            match result {
                Ok(read) => {
                    uow.commit().await?;
                    read
                }
                Err(e) => return Err(uow.abort(e).await),
            }
        }
    };

    debug!(
        entity = listing.entity(),
        page = request.page,
        returned = items.len(),
        total,
        "Listed page"
    );

    Ok(Page::new(items, total, request))
}

/// Wraps a search term for `LIKE ... ESCAPE '\'` so `%` and `_` match
/// literally.
pub(crate) fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
