//! # Concert Repository
//!
//! Concert lookup, creation, finalization and the paged concert listing.
//!
//! ## Listing
//! ```text
//! ConcertQuery { title: Some("rock"), genre_id: None, order: Id }
//!      │
//!      ▼
//! SELECT c.id, c.title, ..., g.name AS genre
//! FROM concerts c INNER JOIN genres g ON g.id = c.genre_id
//! WHERE 1 = 1 AND c.title LIKE '%rock%' ESCAPE '\'
//! ORDER BY c.id ASC
//! LIMIT ? OFFSET ?
//! ```
//!
//! Inactive and finalized concerts are listed too; the projection carries
//! both flags so the caller can show them.

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::listing::{self, contains_pattern, Listing};
use crate::pool::RepoSettings;
use encore_core::validation::{
    normalize_search_term, validate_id, validate_price_cents, validate_required_text,
    validate_tickets_quantity,
};
use encore_core::{Concert, ConcertInfo, NewConcert, Page, PaginationRequest, ValidationError};

const CONCERT_COLUMNS: &str = "id, genre_id, title, description, extended_description, place, \
     unit_price_cents, date_event, image_url, tickets_quantity, finalized, status";

// =============================================================================
// Query
// =============================================================================

/// Sort key for the concert listing. Every key ends in `c.id` so pages
/// never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcertOrder {
    #[default]
    Id,
    Title,
    DateEvent,
}

/// Filter for the concert listing.
#[derive(Debug, Clone, Default)]
pub struct ConcertQuery {
    /// Case-insensitive substring of the title.
    pub title: Option<String>,
    pub genre_id: Option<i64>,
    pub order: ConcertOrder,
}

impl ConcertQuery {
    /// Builds a query from a raw search term; blank terms mean "all".
    pub fn by_title(term: Option<&str>) -> Result<Self, ValidationError> {
        Ok(ConcertQuery {
            title: normalize_search_term(term)?,
            ..ConcertQuery::default()
        })
    }

    pub fn genre(mut self, genre_id: i64) -> Self {
        self.genre_id = Some(genre_id);
        self
    }

    pub fn order_by(mut self, order: ConcertOrder) -> Self {
        self.order = order;
        self
    }
}

impl Listing for ConcertQuery {
    type Item = ConcertInfo;

    fn entity(&self) -> &'static str {
        "Concert"
    }

    fn select_clause(&self) -> &'static str {
        "SELECT c.id, c.title, c.description, c.extended_description, c.place, \
         c.unit_price_cents, g.name AS genre, c.genre_id, c.date_event, c.image_url, \
         c.tickets_quantity, c.finalized, c.status"
    }

    fn from_clause(&self) -> &'static str {
        "FROM concerts c INNER JOIN genres g ON g.id = c.genre_id"
    }

    fn push_predicate(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        if let Some(title) = &self.title {
            builder.push(" AND c.title LIKE ");
            builder.push_bind(contains_pattern(title));
            builder.push(" ESCAPE '\\'");
        }
        if let Some(genre_id) = self.genre_id {
            builder.push(" AND c.genre_id = ");
            builder.push_bind(genre_id);
        }
    }

    fn order_clause(&self) -> &'static str {
        match self.order {
            ConcertOrder::Id => "c.id ASC",
            ConcertOrder::Title => "c.title ASC, c.id ASC",
            ConcertOrder::DateEvent => "c.date_event ASC, c.id ASC",
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for concert database operations.
#[derive(Debug, Clone)]
pub struct ConcertRepository {
    pool: SqlitePool,
    settings: RepoSettings,
}

impl ConcertRepository {
    pub(crate) fn new(pool: SqlitePool, settings: RepoSettings) -> Self {
        ConcertRepository { pool, settings }
    }

    /// Gets a concert row by ID.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Concert>> {
        let concert = sqlx::query_as::<_, Concert>(&format!(
            "SELECT {CONCERT_COLUMNS} FROM concerts WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(concert)
    }

    /// Gets the listing projection of one concert, genre joined in.
    pub async fn get_info(&self, id: i64) -> DbResult<Option<ConcertInfo>> {
        let query = ConcertQuery::default();
        let sql = format!(
            "{} {} WHERE c.id = ?1",
            query.select_clause(),
            query.from_clause()
        );

        let info = sqlx::query_as::<_, ConcertInfo>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(info)
    }

    /// Lists one page of concerts with the total count.
    pub async fn list(
        &self,
        query: &ConcertQuery,
        request: &PaginationRequest,
    ) -> DbResult<Page<ConcertInfo>> {
        listing::list_page(
            &self.pool,
            query,
            request,
            self.settings.max_records_per_page,
            self.settings.read_consistency,
        )
        .await
    }

    /// Counts concerts matching the filter.
    pub async fn count(&self, query: &ConcertQuery) -> DbResult<i64> {
        listing::count(&self.pool, query).await
    }

    /// Inserts a concert. New concerts are active and not finalized.
    ///
    /// ## Errors
    /// - `Validation` for empty text, negative price or zero capacity
    /// - `NotFound` if the genre does not exist
    pub async fn insert(&self, concert: &NewConcert) -> DbResult<Concert> {
        validate_concert(concert)?;

        debug!(title = %concert.title, genre_id = concert.genre_id, "Inserting concert");

        let sql = format!(
            "INSERT INTO concerts (genre_id, title, description, extended_description, place, \
             unit_price_cents, date_event, image_url, tickets_quantity, finalized, status) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, 1) RETURNING {CONCERT_COLUMNS}"
        );

        sqlx::query_as::<_, Concert>(&sql)
            .bind(concert.genre_id)
            .bind(concert.title.trim())
            .bind(concert.description.trim())
            .bind(concert.extended_description.as_deref())
            .bind(concert.place.trim())
            .bind(concert.unit_price_cents)
            .bind(concert.date_event)
            .bind(concert.image_url.as_deref())
            .bind(concert.tickets_quantity)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| unknown_genre(e, concert.genre_id))
    }

    /// Replaces the editable fields of a concert. `finalized` and `status`
    /// keep their values.
    ///
    /// ## Errors
    /// - `Validation` as for `insert`
    /// - `NotFound` if the concert or the new genre does not exist
    pub async fn update(&self, id: i64, concert: &NewConcert) -> DbResult<Concert> {
        validate_concert(concert)?;

        debug!(id, title = %concert.title, "Updating concert");

        let sql = format!(
            "UPDATE concerts SET genre_id = ?2, title = ?3, description = ?4, \
             extended_description = ?5, place = ?6, unit_price_cents = ?7, date_event = ?8, \
             image_url = ?9, tickets_quantity = ?10 \
             WHERE id = ?1 RETURNING {CONCERT_COLUMNS}"
        );

        sqlx::query_as::<_, Concert>(&sql)
            .bind(id)
            .bind(concert.genre_id)
            .bind(concert.title.trim())
            .bind(concert.description.trim())
            .bind(concert.extended_description.as_deref())
            .bind(concert.place.trim())
            .bind(concert.unit_price_cents)
            .bind(concert.date_event)
            .bind(concert.image_url.as_deref())
            .bind(concert.tickets_quantity)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| unknown_genre(e, concert.genre_id))?
            .ok_or_else(|| DbError::not_found("Concert", id))
    }

    /// Deletes a concert.
    ///
    /// ## Errors
    /// - `NotFound` if no concert has this ID
    /// - `ForeignKeyViolation` once sales reference it; sold concerts are
    ///   finalized, not deleted
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        debug!(id, "Deleting concert");

        let result = sqlx::query("DELETE FROM concerts WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Concert", id));
        }

        Ok(())
    }

    /// Marks a concert finalized. Finalized concerts take no new sales.
    pub async fn finalize(&self, id: i64) -> DbResult<()> {
        debug!(id, "Finalizing concert");

        let result = sqlx::query("UPDATE concerts SET finalized = 1 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Concert", id));
        }

        Ok(())
    }
}

fn validate_concert(concert: &NewConcert) -> DbResult<()> {
    validate_id("genre_id", concert.genre_id)?;
    validate_required_text("title", &concert.title, 100)?;
    validate_required_text("description", &concert.description, 500)?;
    validate_required_text("place", &concert.place, 100)?;
    validate_price_cents(concert.unit_price_cents)?;
    validate_tickets_quantity(concert.tickets_quantity)?;
    Ok(())
}

/// The only foreign key a concert row has is its genre.
fn unknown_genre(err: sqlx::Error, genre_id: i64) -> DbError {
    match DbError::from(err) {
        DbError::ForeignKeyViolation { .. } => DbError::not_found("Genre", genre_id),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::{Duration, Utc};
    use encore_core::GenreInput;

    async fn seed(db: &Database, titles: &[&str]) -> i64 {
        let genre = db
            .genres()
            .insert(&GenreInput { name: "Rock".into(), status: true })
            .await
            .unwrap();

        for (i, title) in titles.iter().enumerate() {
            db.concerts()
                .insert(&NewConcert {
                    genre_id: genre.id,
                    title: title.to_string(),
                    description: "Live".into(),
                    extended_description: None,
                    place: "Arena".into(),
                    unit_price_cents: 4500,
                    date_event: Utc::now() + Duration::days(i as i64 + 1),
                    image_url: None,
                    tickets_quantity: 100,
                })
                .await
                .unwrap();
        }
        genre.id
    }

    #[tokio::test]
    async fn test_list_filters_by_title_with_total() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed(&db, &["Rock Night", "Jazz Brunch", "Punk rock fest", "Opera"]).await;

        let query = ConcertQuery::by_title(Some("ROCK")).unwrap();
        let page = db
            .concerts()
            .list(&query, &PaginationRequest::new(1, 10))
            .await
            .unwrap();

        assert_eq!(page.total_count, 2);
        let titles: Vec<&str> = page.items.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Rock Night", "Punk rock fest"]);
        assert_eq!(page.items[0].genre, "Rock");
    }

    #[tokio::test]
    async fn test_list_pages_are_bounded() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed(&db, &["A", "B", "C", "D", "E"]).await;

        let page = db
            .concerts()
            .list(&ConcertQuery::default(), &PaginationRequest::new(3, 2))
            .await
            .unwrap();
        assert_eq!(page.total_count, 5);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].title, "E");

        let beyond = db
            .concerts()
            .list(&ConcertQuery::default(), &PaginationRequest::new(9, 2))
            .await
            .unwrap();
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total_count, 5);
    }

    #[tokio::test]
    async fn test_wildcards_match_literally() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed(&db, &["100% Live", "1000 Voices"]).await;

        let query = ConcertQuery::by_title(Some("100%")).unwrap();
        assert_eq!(db.concerts().count(&query).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_order_by_title() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed(&db, &["Zeta", "Alpha", "Mid"]).await;

        let query = ConcertQuery::default().order_by(ConcertOrder::Title);
        let page = db
            .concerts()
            .list(&query, &PaginationRequest::new(1, 10))
            .await
            .unwrap();
        let titles: Vec<&str> = page.items.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Mid", "Zeta"]);
    }

    #[tokio::test]
    async fn test_finalize_and_info() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed(&db, &["Finale"]).await;

        let concert = db.concerts().get_by_id(1).await.unwrap().unwrap();
        assert!(concert.is_on_sale());

        db.concerts().finalize(concert.id).await.unwrap();
        let info = db.concerts().get_info(concert.id).await.unwrap().unwrap();
        assert!(info.finalized);
        assert_eq!(info.status_label(), "Active");

        assert!(db.concerts().finalize(404).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_filters_by_genre() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed(&db, &["Rock Night", "Rock Day"]).await;
        let jazz = db
            .genres()
            .insert(&GenreInput { name: "Jazz".into(), status: true })
            .await
            .unwrap();
        let mut concert = db.concerts().get_by_id(2).await.unwrap().unwrap();
        concert.genre_id = jazz.id;
        db.concerts().update(concert.id, &edit(&concert)).await.unwrap();

        let query = ConcertQuery::by_title(Some("rock")).unwrap().genre(jazz.id);
        let page = db
            .concerts()
            .list(&query, &PaginationRequest::new(1, 10))
            .await
            .unwrap();

        assert_eq!(page.total_count, 1);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].title, "Rock Day");
        assert_eq!(page.items[0].genre, "Jazz");
    }

    fn edit(concert: &Concert) -> NewConcert {
        NewConcert {
            genre_id: concert.genre_id,
            title: concert.title.clone(),
            description: concert.description.clone(),
            extended_description: concert.extended_description.clone(),
            place: concert.place.clone(),
            unit_price_cents: concert.unit_price_cents,
            date_event: concert.date_event,
            image_url: concert.image_url.clone(),
            tickets_quantity: concert.tickets_quantity,
        }
    }

    #[tokio::test]
    async fn test_update_keeps_flags() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed(&db, &["Draft"]).await;
        db.concerts().finalize(1).await.unwrap();

        let before = db.concerts().get_by_id(1).await.unwrap().unwrap();
        let mut changes = edit(&before);
        changes.title = "  Final Cut ".into();
        changes.unit_price_cents = 5200;

        let after = db.concerts().update(1, &changes).await.unwrap();
        assert_eq!(after.title, "Final Cut");
        assert_eq!(after.unit_price_cents, 5200);
        assert!(after.finalized);
        assert!(after.status);

        assert!(db.concerts().update(99, &changes).await.unwrap_err().is_not_found());

        changes.genre_id = 77;
        let err = db.concerts().update(1, &changes).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { ref entity, .. } if entity == "Genre"));
    }

    #[tokio::test]
    async fn test_delete_unsold_and_sold() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed(&db, &["Unsold", "Sold"]).await;
        let customer = db.customers().insert("fan@example.com", "Ada Fan").await.unwrap();
        db.sales()
            .create(&encore_core::NewSale { customer_id: customer.id, concert_id: 2, quantity: 1 })
            .await
            .unwrap();

        db.concerts().delete(1).await.unwrap();
        assert!(db.concerts().get_by_id(1).await.unwrap().is_none());
        assert!(db.concerts().delete(1).await.unwrap_err().is_not_found());

        let err = db.concerts().delete(2).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
        assert!(db.concerts().get_by_id(2).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_insert_with_unknown_genre() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let err = db
            .concerts()
            .insert(&NewConcert {
                genre_id: 77,
                title: "Ghost".into(),
                description: "Nobody".into(),
                extended_description: None,
                place: "Nowhere".into(),
                unit_price_cents: 0,
                date_event: Utc::now(),
                image_url: None,
                tickets_quantity: 1,
            })
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
