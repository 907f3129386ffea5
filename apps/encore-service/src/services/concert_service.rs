//! Concert catalog: paged search by title and genre, detail, creation,
//! edits, finalization and removal of unsold concerts.

use encore_core::validation::validate_id;
use encore_core::{Concert, ConcertInfo, NewConcert, Page, PaginationRequest};
use encore_db::{ConcertQuery, Database};
use tracing::info;

use crate::error::{ServiceError, ServiceResult};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct ConcertService {
    db: Database,
    retry: RetryPolicy,
}

impl ConcertService {
    pub fn new(db: Database, retry: RetryPolicy) -> Self {
        ConcertService { db, retry }
    }

    /// One page of concerts whose title contains `title`, optionally in one
    /// genre, with the total match count.
    pub async fn list_concerts(
        &self,
        title: Option<&str>,
        genre_id: Option<i64>,
        pagination: &PaginationRequest,
    ) -> ServiceResult<Page<ConcertInfo>> {
        self.try_list_concerts(title, genre_id, pagination)
            .await
            .map_err(|e| e.logged("list_concerts"))
    }

    async fn try_list_concerts(
        &self,
        title: Option<&str>,
        genre_id: Option<i64>,
        pagination: &PaginationRequest,
    ) -> ServiceResult<Page<ConcertInfo>> {
        let mut query = ConcertQuery::by_title(title)?;
        if let Some(genre_id) = genre_id {
            validate_id("genre_id", genre_id)?;
            query = query.genre(genre_id);
        }
        Ok(self.db.concerts().list(&query, pagination).await?)
    }

    pub async fn get_concert(&self, id: i64) -> ServiceResult<ConcertInfo> {
        match self.db.concerts().get_info(id).await {
            Ok(Some(concert)) => Ok(concert),
            Ok(None) => Err(ServiceError::not_found("Concert", id).logged("get_concert")),
            Err(e) => Err(ServiceError::from(e).logged("get_concert")),
        }
    }

    pub async fn create_concert(&self, concert: &NewConcert) -> ServiceResult<Concert> {
        let concerts = self.db.concerts();
        let created = self
            .retry
            .run("create_concert", || concerts.insert(concert))
            .await
            .map_err(|e| ServiceError::from(e).logged("create_concert"))?;

        info!(id = created.id, title = %created.title, "Concert created");
        Ok(created)
    }

    pub async fn update_concert(&self, id: i64, concert: &NewConcert) -> ServiceResult<Concert> {
        let concerts = self.db.concerts();
        let updated = self
            .retry
            .run("update_concert", || concerts.update(id, concert))
            .await
            .map_err(|e| ServiceError::from(e).logged("update_concert"))?;

        info!(id, title = %updated.title, "Concert updated");
        Ok(updated)
    }

    /// Deletes a concert nobody bought tickets for. A sold concert is
    /// rejected as still referenced; finalize it instead.
    pub async fn delete_concert(&self, id: i64) -> ServiceResult<()> {
        let concerts = self.db.concerts();
        self.retry
            .run("delete_concert", || concerts.delete(id))
            .await
            .map_err(|e| ServiceError::from(e).logged("delete_concert"))?;

        info!(id, "Concert deleted");
        Ok(())
    }

    /// Closes a concert for sale. Existing sales are untouched.
    pub async fn finalize_concert(&self, id: i64) -> ServiceResult<()> {
        let concerts = self.db.concerts();
        self.retry
            .run("finalize_concert", || concerts.finalize(id))
            .await
            .map_err(|e| ServiceError::from(e).logged("finalize_concert"))?;

        info!(id, "Concert finalized");
        Ok(())
    }
}
