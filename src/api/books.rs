//! Book endpoints

use serde::Serialize;
use serde_json::Value;

use super::{decode, tags::{Endpoint, Tag, TagKind}, transport::{query_pairs, ApiRequest}, ApiClient, QueryDef, QuerySubscription};
use crate::{
    error::{AppError, AppResult},
    models::{Book, BookInput, BookPatch, BookQuery, Deleted, Envelope, Paginated},
};

fn list_books_def(query: &BookQuery) -> QueryDef {
    QueryDef::new(
        Endpoint::ListBooks,
        None,
        ApiRequest::get("/books").with_query(query_pairs(query)),
    )
}

fn get_book_def(id: &str) -> QueryDef {
    QueryDef::new(Endpoint::GetBook, Some(id), ApiRequest::get(format!("/books/{}", id)))
}

fn book_of(value: Value) -> AppResult<Book> {
    decode::<Envelope<Book>>(value).map(|envelope| envelope.data)
}

pub(crate) fn to_body<T: Serialize>(payload: &T) -> AppResult<Value> {
    serde_json::to_value(payload).map_err(|e| AppError::Decode(e.to_string()))
}

impl ApiClient {
    /// List books with pagination and filters
    pub async fn list_books(&self, query: &BookQuery) -> AppResult<Paginated<Book>> {
        self.query(list_books_def(query)).await
    }

    /// Get one book by id
    pub async fn get_book(&self, id: &str) -> AppResult<Book> {
        book_of(self.query(get_book_def(id)).await?)
    }

    /// Read one book from the server even if a fresh copy is cached.
    /// The cached copy and its subscribers are marked stale first.
    pub async fn refresh_book(&self, id: &str) -> AppResult<Book> {
        self.cache.invalidate(&[Tag::item(TagKind::Books, id)]);
        self.get_book(id).await
    }

    /// Create a book. A duplicate or invalid ISBN comes back as
    /// [`AppError::Rejected`].
    pub async fn create_book(&self, input: &BookInput) -> AppResult<Book> {
        let request = ApiRequest::post("/books", to_body(input)?);
        let value = self.mutate(Endpoint::CreateBook, None, request).await?;
        let book = book_of(value)?;
        tracing::info!("Created book id={} isbn={}", book.id, book.isbn);
        Ok(book)
    }

    /// Update the given fields of a book
    pub async fn update_book(&self, id: &str, patch: &BookPatch) -> AppResult<Book> {
        let request = ApiRequest::put(format!("/books/{}", id), to_body(patch)?);
        let value = self.mutate(Endpoint::UpdateBook, Some(id), request).await?;
        book_of(value)
    }

    /// Delete a book. Servers that answer without a body still yield the id.
    pub async fn delete_book(&self, id: &str) -> AppResult<Deleted> {
        let request = ApiRequest::delete(format!("/books/{}", id));
        let value = self.mutate(Endpoint::DeleteBook, Some(id), request).await?;
        let deleted = value
            .get("data")
            .cloned()
            .and_then(|data| serde_json::from_value::<Deleted>(data).ok())
            .unwrap_or_else(|| Deleted { id: id.to_string() });
        Ok(deleted)
    }

    /// Keep the book list cached and learn when it goes stale
    pub fn watch_books(&self, query: &BookQuery) -> QuerySubscription<Paginated<Book>> {
        self.subscribe(list_books_def(query), decode::<Paginated<Book>>)
    }

    /// Keep one book cached and learn when it goes stale
    pub fn watch_book(&self, id: &str) -> QuerySubscription<Book> {
        self.subscribe(get_book_def(id), book_of)
    }
}
