//! End-to-end service calls against a file-backed store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use encore_core::pagination::TOTAL_RECORDS_HEADER;
use encore_core::{GenreInput, NewConcert, PaginationRequest};
use encore_db::IsolationLevel;
use encore_service::{
    telemetry, AppState, CreateSaleRequest, ErrorCode, SaleSearch, ServiceConfig,
};
use tempfile::TempDir;

struct Harness {
    state: AppState,
    concert_id: i64,
    _dir: TempDir,
}

async fn harness(vars: &[(&str, &str)]) -> Harness {
    telemetry::init_for_tests();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("encore.db");
    let mut env: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    env.insert("DATABASE_PATH".into(), path.display().to_string());
    env.entry("DB_MAX_CONNECTIONS".into()).or_insert_with(|| "8".into());

    let config = ServiceConfig::load_from(|key| env.get(key).cloned()).unwrap();
    let state = AppState::initialize(config).await.unwrap();

    let genre = state
        .genres
        .create(&GenreInput { name: "Rock".into(), status: true })
        .await
        .unwrap();
    let concert = state
        .concerts
        .create_concert(&NewConcert {
            genre_id: genre.id,
            title: "Night Shift".into(),
            description: "Live".into(),
            extended_description: None,
            place: "Arena".into(),
            unit_price_cents: 4599,
            date_event: Utc::now() + Duration::days(30),
            image_url: None,
            tickets_quantity: 1000,
        })
        .await
        .unwrap();
    state
        .db
        .customers()
        .insert("fan@example.com", "Ada Fan")
        .await
        .unwrap();

    Harness {
        state,
        concert_id: concert.id,
        _dir: dir,
    }
}

fn request(h: &Harness, quantity: i64) -> CreateSaleRequest {
    CreateSaleRequest {
        concert_id: h.concert_id,
        quantity,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_purchases_all_succeed_with_distinct_numbers() {
    let h = Arc::new(harness(&[("MAX_CONFLICT_RETRIES", "10"), ("RETRY_BACKOFF_MS", "5")]).await);

    let mut handles = Vec::new();
    for _ in 0..10 {
        let h = Arc::clone(&h);
        handles.push(tokio::spawn(async move {
            h.state
                .sales
                .create_sale("fan@example.com", &request(&h, 1))
                .await
        }));
    }

    let mut numbers = Vec::new();
    for handle in handles {
        let sale = handle.await.unwrap().unwrap();
        numbers.push(sale.operation_number.sequence().unwrap());
    }
    numbers.sort_unstable();
    assert_eq!(numbers, (1..=10).collect::<Vec<i64>>());

    let page = h
        .state
        .sales
        .list_sales(&SaleSearch::default(), &PaginationRequest::new(1, 50))
        .await
        .unwrap();
    assert_eq!(page.total_count, 10);
}

#[tokio::test]
async fn customer_listing_carries_total_count_header() {
    let h = harness(&[]).await;
    for quantity in 1..=5 {
        h.state
            .sales
            .create_sale("fan@example.com", &request(&h, quantity))
            .await
            .unwrap();
    }

    let page = h
        .state
        .sales
        .list_sales_by_customer("fan@example.com", None, &PaginationRequest::new(2, 2))
        .await
        .unwrap();

    let numbers: Vec<&str> = page.items.iter().map(|s| s.operation_number.as_str()).collect();
    assert_eq!(numbers, vec!["000003", "000004"]);
    assert_eq!(page.total_count, 5);

    let header = page.total_count_header();
    assert_eq!(header.name, TOTAL_RECORDS_HEADER);
    assert_eq!(header.value, "5");
}

#[tokio::test]
async fn oversized_page_is_rejected() {
    let h = harness(&[("MAX_RECORDS_PER_PAGE", "20")]).await;

    let err = h
        .state
        .sales
        .list_sales(&SaleSearch::default(), &PaginationRequest::new(1, 21))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ValidationError);
}

#[tokio::test]
async fn finalized_concert_refuses_purchase() {
    let h = harness(&[]).await;
    h.state.concerts.finalize_concert(h.concert_id).await.unwrap();

    let err = h
        .state
        .sales
        .create_sale("fan@example.com", &request(&h, 1))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::BusinessLogic);
    assert_eq!(err.public_message(), "The concert is not available: finalized.");

    let body = serde_json::to_value(err.to_response()).unwrap();
    assert_eq!(body["code"], "BUSINESS_LOGIC");
}

#[tokio::test]
async fn capacity_limit_applies_when_configured() {
    let h = harness(&[("ENFORCE_TICKET_CAPACITY", "true")]).await;

    for _ in 0..10 {
        h.state
            .sales
            .create_sale("fan@example.com", &request(&h, 100))
            .await
            .unwrap();
    }
    let err = h
        .state
        .sales
        .create_sale("fan@example.com", &request(&h, 1))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::BusinessLogic);
    assert_eq!(
        err.public_message(),
        "The concert is not available: only 0 tickets left."
    );

    let report = h
        .state
        .sales
        .sale_report(Utc::now() - Duration::hours(1), Utc::now() + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].total_cents, 4599 * 1000);
}

#[tokio::test]
async fn genre_in_use_cannot_be_deleted() {
    let h = harness(&[]).await;
    let genre_id = h.state.concerts.get_concert(h.concert_id).await.unwrap().genre_id;

    let err = h.state.genres.delete(genre_id).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::BusinessLogic);
    assert!(!err.public_message().contains("FOREIGN KEY"));
}

#[tokio::test]
async fn sold_concert_cannot_be_deleted() {
    let h = harness(&[]).await;
    h.state
        .sales
        .create_sale("fan@example.com", &request(&h, 2))
        .await
        .unwrap();

    let err = h.state.concerts.delete_concert(h.concert_id).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::BusinessLogic);
    assert_eq!(err.public_message(), "The record is still referenced by other records.");

    let concert = h.state.concerts.get_concert(h.concert_id).await.unwrap();
    assert_eq!(concert.title, "Night Shift");
}

#[tokio::test]
async fn sale_search_by_concert_agrees_with_total() {
    let h = harness(&[]).await;
    let genre_id = h.state.concerts.get_concert(h.concert_id).await.unwrap().genre_id;
    let other = h
        .state
        .concerts
        .create_concert(&NewConcert {
            genre_id,
            title: "Night Shift Encore".into(),
            description: "Live".into(),
            extended_description: None,
            place: "Arena".into(),
            unit_price_cents: 3000,
            date_event: Utc::now() + Duration::days(31),
            image_url: None,
            tickets_quantity: 1000,
        })
        .await
        .unwrap();

    for _ in 0..3 {
        h.state
            .sales
            .create_sale("fan@example.com", &request(&h, 1))
            .await
            .unwrap();
    }
    for _ in 0..2 {
        h.state
            .sales
            .create_sale(
                "fan@example.com",
                &CreateSaleRequest { concert_id: other.id, quantity: 1 },
            )
            .await
            .unwrap();
    }

    // The title term matches both concerts; the id narrows to one.
    let search = SaleSearch {
        concert_title: Some("night shift".into()),
        concert_id: Some(other.id),
        ..SaleSearch::default()
    };
    let first = h
        .state
        .sales
        .list_sales(&search, &PaginationRequest::new(1, 1))
        .await
        .unwrap();
    let second = h
        .state
        .sales
        .list_sales(&search, &PaginationRequest::new(2, 1))
        .await
        .unwrap();

    assert_eq!(first.total_count, 2);
    assert_eq!(second.total_count, 2);
    assert_eq!(first.items[0].concert_id, other.id);
    assert_eq!(second.items[0].concert_id, other.id);
    assert_ne!(first.items[0].id, second.items[0].id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_during_retry_backoff_stops_promptly() {
    let h = harness(&[
        ("DB_LOCK_TIMEOUT_MS", "100"),
        ("MAX_CONFLICT_RETRIES", "5"),
        ("RETRY_BACKOFF_MS", "60000"),
    ])
    .await;

    // Holding the write lock makes the first attempt conflict and enter a
    // one-minute backoff.
    let mut holder = h.state.db.begin(IsolationLevel::Serializable).await.unwrap();

    let result = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        h.state.sales.create_sale_until(
            "fan@example.com",
            &request(&h, 1),
            tokio::time::sleep(std::time::Duration::from_millis(400)),
        ),
    )
    .await
    .expect("cancel must interrupt the backoff");

    let err = result.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Cancelled);

    holder.roll_back().await.unwrap();
    drop(holder);

    let page = h
        .state
        .sales
        .list_sales(&SaleSearch::default(), &PaginationRequest::new(1, 10))
        .await
        .unwrap();
    assert_eq!(page.total_count, 0);
}
