//! # Genre Repository
//!
//! Plain CRUD over `genres`. Genres are small reference data and are listed
//! whole, ordered by name.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use encore_core::validation::validate_required_text;
use encore_core::{Genre, GenreInput};

const MAX_GENRE_NAME: usize = 50;

/// Repository for genre database operations.
#[derive(Debug, Clone)]
pub struct GenreRepository {
    pool: SqlitePool,
}

impl GenreRepository {
    pub fn new(pool: SqlitePool) -> Self {
        GenreRepository { pool }
    }

    /// Lists every genre ordered by name.
    pub async fn list(&self) -> DbResult<Vec<Genre>> {
        let genres = sqlx::query_as::<_, Genre>(
            "SELECT id, name, status FROM genres ORDER BY name ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(genres)
    }

    /// Gets a genre by ID.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Genre>> {
        let genre = sqlx::query_as::<_, Genre>("SELECT id, name, status FROM genres WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(genre)
    }

    /// Inserts a genre and returns it with its assigned ID.
    ///
    /// ## Errors
    /// - `UniqueViolation` if the name is taken
    pub async fn insert(&self, input: &GenreInput) -> DbResult<Genre> {
        validate_required_text("name", &input.name, MAX_GENRE_NAME)?;
        let name = input.name.trim();

        debug!(name = %name, "Inserting genre");

        sqlx::query_as::<_, Genre>(
            "INSERT INTO genres (name, status) VALUES (?1, ?2) RETURNING id, name, status",
        )
        .bind(name)
        .bind(input.status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| name_conflict(e, name))
    }

    /// Replaces a genre's name and status.
    pub async fn update(&self, id: i64, input: &GenreInput) -> DbResult<Genre> {
        validate_required_text("name", &input.name, MAX_GENRE_NAME)?;
        let name = input.name.trim();

        debug!(id, name = %name, "Updating genre");

        sqlx::query_as::<_, Genre>(
            "UPDATE genres SET name = ?2, status = ?3 WHERE id = ?1 RETURNING id, name, status",
        )
        .bind(id)
        .bind(name)
        .bind(input.status)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| name_conflict(e, name))?
        .ok_or_else(|| DbError::not_found("Genre", id))
    }

    /// Deletes a genre.
    ///
    /// ## Errors
    /// - `NotFound` if no genre has this ID
    /// - `ForeignKeyViolation` while concerts still reference it
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        debug!(id, "Deleting genre");

        let result = sqlx::query("DELETE FROM genres WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Genre", id));
        }

        Ok(())
    }
}

fn name_conflict(err: sqlx::Error, name: &str) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
            field,
            value: name.to_string(),
        },
        other => other,
    }
}
