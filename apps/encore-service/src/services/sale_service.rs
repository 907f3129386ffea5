//! # Sale Service
//!
//! Sale creation for an authenticated customer and the sale listings.
//!
//! ## Create Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_sale(email, {concertId, quantity})                              │
//! │       │                                                                 │
//! │       ├── email well-formed?            ── VALIDATION_ERROR             │
//! │       ├── customer by email             ── NOT_FOUND                    │
//! │       ▼                                                                 │
//! │  ┌─ attempt n ───────────────────────────────────────────────────────┐  │
//! │  │  SaleRepository::create_until(new_sale, cancel)                   │  │
//! │  │     Conflict ── n <= max_conflict_retries ── sleep n × backoff ──┐│  │
//! │  │     (cancel during the sleep ends the loop: CANCELLED)           ││  │
//! │  └──────────────────────────────────────────────────────────────────┼┘  │
//! │       ▲                                                             │   │
//! │       └─────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Sale { operation_number: "000042", ... }  or  ServiceError             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every attempt is its own unit of work. A failed attempt rolls back
//! completely, so a retry never sees a half-created sale or a consumed
//! operation number.

use std::future::Future;

use chrono::{DateTime, Utc};
use encore_core::validation::{
    normalize_search_term, validate_date_range, validate_email, validate_id,
};
use encore_core::{NewSale, Page, PaginationRequest, Sale, SaleInfo, SaleReportRow};
use encore_db::{Database, SaleOrder, SaleQuery};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::retry::RetryPolicy;

/// Body of a purchase request. The customer comes from the caller's
/// identity, never from the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleRequest {
    pub concert_id: i64,
    pub quantity: i64,
}

/// Filter for the back-office sale listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleSearch {
    pub sold_from: Option<DateTime<Utc>>,
    pub sold_to: Option<DateTime<Utc>>,
    pub concert_title: Option<String>,
    pub concert_id: Option<i64>,
    #[serde(default)]
    pub newest_first: bool,
}

#[derive(Debug, Clone)]
pub struct SaleService {
    db: Database,
    retry: RetryPolicy,
}

impl SaleService {
    pub fn new(db: Database, retry: RetryPolicy) -> Self {
        SaleService { db, retry }
    }

    /// Creates a sale for the customer identified by `customer_email`.
    pub async fn create_sale(
        &self,
        customer_email: &str,
        request: &CreateSaleRequest,
    ) -> ServiceResult<Sale> {
        self.create_sale_until(customer_email, request, std::future::pending())
            .await
    }

    /// Like [`create_sale`](Self::create_sale), abandoning the work when
    /// `cancel` resolves. An abandoned attempt is rolled back and reported
    /// as `CANCELLED`; no retry follows it.
    pub async fn create_sale_until<C>(
        &self,
        customer_email: &str,
        request: &CreateSaleRequest,
        cancel: C,
    ) -> ServiceResult<Sale>
    where
        C: Future<Output = ()>,
    {
        self.try_create_sale(customer_email, request, cancel)
            .await
            .map_err(|e| e.logged("create_sale"))
    }

    async fn try_create_sale<C>(
        &self,
        customer_email: &str,
        request: &CreateSaleRequest,
        cancel: C,
    ) -> ServiceResult<Sale>
    where
        C: Future<Output = ()>,
    {
        validate_email(customer_email)?;

        let customer = self
            .db
            .customers()
            .get_by_email(customer_email)
            .await?
            .ok_or_else(|| ServiceError::not_found("Customer", customer_email))?;

        let new_sale = NewSale {
            customer_id: customer.id,
            concert_id: request.concert_id,
            quantity: request.quantity,
        };

        let sales = self.db.sales();
        let mut cancel = std::pin::pin!(cancel);
        let mut attempt = 1;

        loop {
            match sales.create_until(&new_sale, cancel.as_mut()).await {
                Ok(sale) => {
                    info!(
                        customer_id = customer.id,
                        operation_number = %sale.operation_number,
                        attempt,
                        "Sale completed"
                    );
                    return Ok(sale);
                }
                Err(err) => match self.retry.backoff_for(attempt, &err) {
                    Some(delay) => {
                        warn!(
                            customer_id = customer.id,
                            concert_id = new_sale.concert_id,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Sale conflicted, retrying"
                        );
                        tokio::select! {
                            biased;
                            _ = cancel.as_mut() => {
                                info!(customer_id = customer.id, attempt, "Sale cancelled during backoff");
                                return Err(ServiceError::Cancelled(
                                    "cancelled while waiting to retry".to_string(),
                                ));
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                        attempt += 1;
                    }
                    None => {
                        if err.is_retryable() {
                            warn!(
                                customer_id = customer.id,
                                attempt,
                                max_conflict_retries = self.retry.max_conflict_retries(),
                                error = %err,
                                "Sale retries exhausted"
                            );
                        }
                        return Err(err.into());
                    }
                },
            }
        }
    }

    /// Sale detail with customer, concert and genre.
    pub async fn get_sale(&self, id: i64) -> ServiceResult<SaleInfo> {
        match self.db.sales().get_info(id).await {
            Ok(Some(sale)) => Ok(sale),
            Ok(None) => Err(ServiceError::not_found("Sale", id).logged("get_sale")),
            Err(e) => Err(ServiceError::from(e).logged("get_sale")),
        }
    }

    /// Back-office listing over all sales.
    ///
    /// The page's `total_count` is what the API host sends as the
    /// `TotalRecordsQuantity` header.
    pub async fn list_sales(
        &self,
        search: &SaleSearch,
        pagination: &PaginationRequest,
    ) -> ServiceResult<Page<SaleInfo>> {
        self.try_list_sales(search, pagination)
            .await
            .map_err(|e| e.logged("list_sales"))
    }

    async fn try_list_sales(
        &self,
        search: &SaleSearch,
        pagination: &PaginationRequest,
    ) -> ServiceResult<Page<SaleInfo>> {
        let mut query = SaleQuery {
            concert_title: normalize_search_term(search.concert_title.as_deref())?,
            sold_from: search.sold_from,
            sold_to: search.sold_to,
            ..SaleQuery::default()
        };
        if let (Some(from), Some(to)) = (search.sold_from, search.sold_to) {
            validate_date_range(from, to)?;
        }
        if let Some(concert_id) = search.concert_id {
            validate_id("concert_id", concert_id)?;
            query = query.concert(concert_id);
        }
        if search.newest_first {
            query = query.order_by(SaleOrder::NewestFirst);
        }

        let page = self.db.sales().list(&query, pagination).await?;
        debug!(
            page = pagination.page,
            returned = page.items.len(),
            total = page.total_count,
            "Sales listed"
        );
        Ok(page)
    }

    /// The calling customer's own sales, optionally narrowed by concert
    /// title.
    pub async fn list_sales_by_customer(
        &self,
        customer_email: &str,
        concert_title: Option<&str>,
        pagination: &PaginationRequest,
    ) -> ServiceResult<Page<SaleInfo>> {
        self.try_list_sales_by_customer(customer_email, concert_title, pagination)
            .await
            .map_err(|e| e.logged("list_sales_by_customer"))
    }

    async fn try_list_sales_by_customer(
        &self,
        customer_email: &str,
        concert_title: Option<&str>,
        pagination: &PaginationRequest,
    ) -> ServiceResult<Page<SaleInfo>> {
        validate_email(customer_email)?;
        let query = SaleQuery::for_customer(customer_email, concert_title)?;
        Ok(self.db.sales().list(&query, pagination).await?)
    }

    /// Total sold per concert title over an inclusive date range.
    pub async fn sale_report(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ServiceResult<Vec<SaleReportRow>> {
        self.db
            .sales()
            .report(from, to)
            .await
            .map_err(|e| ServiceError::from(e).logged("sale_report"))
    }
}
