//! Shared fixtures for the encore-db integration tests.

#![allow(dead_code)]

use chrono::{Duration, Utc};
use encore_core::{GenreInput, NewConcert, NewSale};
use encore_db::{Database, DbConfig};
use tempfile::TempDir;

pub struct Store {
    pub db: Database,
    pub customer_id: i64,
    pub concert_id: i64,
    // Keeps the database file alive for the duration of the test.
    _dir: TempDir,
}

impl Store {
    pub fn sale(&self, quantity: i64) -> NewSale {
        NewSale {
            customer_id: self.customer_id,
            concert_id: self.concert_id,
            quantity,
        }
    }
}

/// File-backed store with several pooled connections, one genre, one
/// concert and one customer.
pub async fn file_store(configure: impl FnOnce(DbConfig) -> DbConfig) -> Store {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = configure(DbConfig::new(dir.path().join("encore.db")).max_connections(8));
    let db = Database::new(config).await.expect("database");

    let genre = db
        .genres()
        .insert(&GenreInput {
            name: "Rock".into(),
            status: true,
        })
        .await
        .expect("genre");
    let concert = db
        .concerts()
        .insert(&NewConcert {
            genre_id: genre.id,
            title: "Night Shift".into(),
            description: "Live at the arena".into(),
            extended_description: Some("Doors open at 8".into()),
            place: "Arena".into(),
            unit_price_cents: 4599,
            date_event: Utc::now() + Duration::days(14),
            image_url: None,
            tickets_quantity: 1000,
        })
        .await
        .expect("concert");
    let customer = db
        .customers()
        .insert("fan@example.com", "Ada Fan")
        .await
        .expect("customer");

    Store {
        db,
        customer_id: customer.id,
        concert_id: concert.id,
        _dir: dir,
    }
}

/// Creates `n` sales one after another.
pub async fn create_sales(store: &Store, n: usize) {
    for _ in 0..n {
        store.db.sales().create(&store.sale(1)).await.expect("sale");
    }
}
