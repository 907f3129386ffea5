//! Counted, bounded listings over a file-backed database.

mod common;

use encore_core::PaginationRequest;
use encore_db::listing::{self, ReadConsistency};
use encore_db::{DbError, IsolationLevel, SaleOrder, SaleQuery};

fn numbers(page: &encore_core::Page<encore_core::SaleInfo>) -> Vec<String> {
    page.items
        .iter()
        .map(|s| s.operation_number.to_string())
        .collect()
}

#[tokio::test]
async fn second_page_of_five_sales() {
    let store = common::file_store(|c| c).await;
    common::create_sales(&store, 5).await;

    let page = store
        .db
        .sales()
        .list(&SaleQuery::default(), &PaginationRequest::new(2, 2))
        .await
        .unwrap();

    assert_eq!(numbers(&page), vec!["000003", "000004"]);
    assert_eq!(page.total_count, 5);
    assert_eq!(page.total_count_header().name, "TotalRecordsQuantity");
    assert_eq!(page.total_count_header().value, "5");

    let last = store
        .db
        .sales()
        .list(&SaleQuery::default(), &PaginationRequest::new(3, 2))
        .await
        .unwrap();
    assert_eq!(numbers(&last), vec!["000005"]);
    assert_eq!(last.total_count, 5);
    assert!(last.is_last_page());
}

#[tokio::test]
async fn invalid_requests_fail_before_the_store() {
    let store = common::file_store(|c| c.max_records_per_page(20)).await;

    // A closed pool would turn any query into a connection error, so a
    // validation error proves nothing was sent.
    store.db.close().await;

    for request in [
        PaginationRequest::new(0, 10),
        PaginationRequest::new(1, 0),
        PaginationRequest::new(1, 21),
    ] {
        let err = store
            .db
            .sales()
            .list(&SaleQuery::default(), &request)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)), "{request:?} gave {err:?}");
    }
}

#[tokio::test]
async fn concatenated_pages_cover_the_set_once() {
    let store = common::file_store(|c| c).await;
    common::create_sales(&store, 7).await;

    for size in 1..=8u32 {
        let mut seen = Vec::new();
        let mut page_no = 1;
        loop {
            let page = store
                .db
                .sales()
                .list(&SaleQuery::default(), &PaginationRequest::new(page_no, size))
                .await
                .unwrap();
            assert_eq!(page.total_count, 7);
            assert!(page.items.len() <= size as usize);
            seen.extend(numbers(&page));
            if page.is_last_page() {
                break;
            }
            page_no += 1;
        }

        let expected: Vec<String> = (1..=7).map(|i| format!("{i:06}")).collect();
        assert_eq!(seen, expected, "page size {size}");
    }
}

#[tokio::test]
async fn newest_first_ordering() {
    let store = common::file_store(|c| c).await;
    common::create_sales(&store, 3).await;

    let query = SaleQuery::default().order_by(SaleOrder::NewestFirst);
    let page = store
        .db
        .sales()
        .list(&query, &PaginationRequest::new(1, 10))
        .await
        .unwrap();
    assert_eq!(numbers(&page), vec!["000003", "000002", "000001"]);
}

#[tokio::test]
async fn snapshot_mode_lists_consistently() {
    let store = common::file_store(|c| c.read_consistency(ReadConsistency::Snapshot)).await;
    common::create_sales(&store, 4).await;

    let page = store
        .db
        .sales()
        .list(&SaleQuery::default(), &PaginationRequest::new(2, 3))
        .await
        .unwrap();
    assert_eq!(page.total_count, 4);
    assert_eq!(numbers(&page), vec!["000004"]);
}

#[tokio::test]
async fn snapshot_hides_sales_committed_between_count_and_page() {
    let store = common::file_store(|c| c).await;
    common::create_sales(&store, 2).await;
    let query = SaleQuery::default();

    let mut reader = store.db.begin(IsolationLevel::Default).await.unwrap();
    let total = listing::count(reader.connection().unwrap(), &query)
        .await
        .unwrap();

    store.db.sales().create(&store.sale(1)).await.unwrap();

    let window = PaginationRequest::new(1, 10).validate(50).unwrap();
    let items = listing::fetch_page(reader.connection().unwrap(), &query, window)
        .await
        .unwrap();
    reader.commit().await.unwrap();

    assert_eq!(total, 2);
    assert_eq!(items.len(), 2);

    // Outside the snapshot the new sale is visible.
    assert_eq!(store.db.sales().count(&query).await.unwrap(), 3);
}

#[tokio::test]
async fn filters_apply_to_count_and_page_alike() {
    let store = common::file_store(|c| c).await;
    common::create_sales(&store, 3).await;
    let other = store
        .db
        .customers()
        .insert("second@example.com", "Second Fan")
        .await
        .unwrap();
    store
        .db
        .sales()
        .create(&encore_core::NewSale {
            customer_id: other.id,
            concert_id: store.concert_id,
            quantity: 2,
        })
        .await
        .unwrap();

    let query = SaleQuery::for_customer("second@example.com", None).unwrap();
    let page = store
        .db
        .sales()
        .list(&query, &PaginationRequest::new(1, 2))
        .await
        .unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(numbers(&page), vec!["000004"]);
    assert_eq!(page.items[0].customer_name, "Second Fan");

    let none = SaleQuery::for_customer("fan@example.com", Some("opera")).unwrap();
    let empty = store
        .db
        .sales()
        .list(&none, &PaginationRequest::new(1, 2))
        .await
        .unwrap();
    assert_eq!(empty.total_count, 0);
    assert!(empty.items.is_empty());
}
