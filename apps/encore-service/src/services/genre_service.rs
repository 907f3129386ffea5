//! Genre maintenance.
//!
//! Writes go through the retry policy; a busy store on a single-row write is
//! the same retryable conflict as on the sale path.

use encore_core::{Genre, GenreInput};
use encore_db::Database;
use tracing::info;

use crate::error::{ServiceError, ServiceResult};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct GenreService {
    db: Database,
    retry: RetryPolicy,
}

impl GenreService {
    pub fn new(db: Database, retry: RetryPolicy) -> Self {
        GenreService { db, retry }
    }

    pub async fn list(&self) -> ServiceResult<Vec<Genre>> {
        self.db
            .genres()
            .list()
            .await
            .map_err(|e| ServiceError::from(e).logged("list_genres"))
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Genre> {
        match self.db.genres().get_by_id(id).await {
            Ok(Some(genre)) => Ok(genre),
            Ok(None) => Err(ServiceError::not_found("Genre", id).logged("get_genre")),
            Err(e) => Err(ServiceError::from(e).logged("get_genre")),
        }
    }

    pub async fn create(&self, input: &GenreInput) -> ServiceResult<Genre> {
        let genres = self.db.genres();
        let genre = self
            .retry
            .run("create_genre", || genres.insert(input))
            .await
            .map_err(|e| ServiceError::from(e).logged("create_genre"))?;

        info!(id = genre.id, name = %genre.name, "Genre created");
        Ok(genre)
    }

    pub async fn update(&self, id: i64, input: &GenreInput) -> ServiceResult<Genre> {
        let genres = self.db.genres();
        self.retry
            .run("update_genre", || genres.update(id, input))
            .await
            .map_err(|e| ServiceError::from(e).logged("update_genre"))
    }

    /// Deletes a genre no concert refers to.
    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        let genres = self.db.genres();
        self.retry
            .run("delete_genre", || genres.delete(id))
            .await
            .map_err(|e| ServiceError::from(e).logged("delete_genre"))?;

        info!(id, "Genre deleted");
        Ok(())
    }
}
