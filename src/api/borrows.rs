//! Borrow endpoints

use super::{books::to_body, decode, tags::Endpoint, transport::{query_pairs, ApiRequest}, ApiClient, QueryDef, QuerySubscription};
use crate::{
    error::AppResult,
    models::{Borrow, BorrowInput, BorrowQuery, BorrowSummary, Envelope, Paginated},
};

fn summary_def() -> QueryDef {
    QueryDef::new(Endpoint::BorrowSummary, None, ApiRequest::get("/borrow"))
}

fn summary_of(value: serde_json::Value) -> AppResult<Vec<BorrowSummary>> {
    decode::<Envelope<Vec<BorrowSummary>>>(value).map(|envelope| envelope.data)
}

impl ApiClient {
    /// List borrow records
    pub async fn list_borrows(&self, query: &BorrowQuery) -> AppResult<Paginated<Borrow>> {
        let request = ApiRequest::get("/borrows").with_query(query_pairs(query));
        self.query(QueryDef::new(Endpoint::ListBorrows, None, request)).await
    }

    /// Borrow copies of a book. Invalidates borrows and books, since the
    /// book's copies and availability change server side.
    pub async fn create_borrow(&self, input: &BorrowInput) -> AppResult<Borrow> {
        let request = ApiRequest::post("/borrow", to_body(input)?);
        let value = self
            .mutate(Endpoint::CreateBorrow, Some(input.book.as_str()), request)
            .await?;
        let borrow = decode::<Envelope<Borrow>>(value)?.data;
        tracing::info!(
            "Borrowed {} copies of book id={} until {}",
            borrow.quantity,
            input.book,
            borrow.due_date
        );
        Ok(borrow)
    }

    /// Per-book borrowed totals
    pub async fn borrow_summary(&self) -> AppResult<Vec<BorrowSummary>> {
        summary_of(self.query(summary_def()).await?)
    }

    pub fn watch_borrow_summary(&self) -> QuerySubscription<Vec<BorrowSummary>> {
        self.subscribe(summary_def(), summary_of)
    }
}
