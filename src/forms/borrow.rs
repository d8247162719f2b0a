//! Borrow controller

use chrono::{Local, NaiveDateTime};
use serde_json::{json, Map, Value};

use super::{FieldErrors, Fields, FormAction, FormError, FormState, Submission};
use crate::{
    api::ApiClient,
    error::AppError,
    models::{Book, Borrow},
    rules,
    validation::{
        self,
        schemas::{self, BORROW_SCHEMA},
    },
};

/// Borrow form opened from one book.
///
/// Quantity is checked against the book as it was when the form opened, and
/// again against a fresh read of the book just before the write. Nothing on
/// the server makes the two reads and the write atomic.
pub struct BorrowForm {
    client: ApiClient,
    book: Book,
    fields: Fields,
    submission: Submission<Borrow>,
}

impl BorrowForm {
    /// Quantity 1 and the default due date
    pub fn new(client: ApiClient, book: &Book) -> Self {
        Self::opened_at(client, book, Local::now().naive_local())
    }

    pub fn opened_at(client: ApiClient, book: &Book, now: NaiveDateTime) -> Self {
        let mut initial = Map::new();
        initial.insert("book".to_string(), json!(book.id));
        initial.insert("quantity".to_string(), json!(1));
        initial.insert(
            "dueDate".to_string(),
            json!(rules::default_due_date(now).format("%Y-%m-%d").to_string()),
        );
        Self {
            client,
            book: book.clone(),
            fields: Fields::new(&BORROW_SCHEMA, initial),
            submission: Submission::new(FormAction::Borrow),
        }
    }

    pub fn book(&self) -> &Book {
        &self.book
    }

    pub fn state(&self) -> FormState {
        self.submission.state()
    }

    pub fn values(&self) -> &Map<String, Value> {
        self.fields.values()
    }

    pub fn errors(&self) -> &FieldErrors {
        self.fields.errors()
    }

    pub fn set_field(&mut self, name: &str, value: impl Into<Value>) -> Result<(), FormError> {
        self.submission.editing()?;
        self.fields.set(name, value.into()).map_err(|message| {
            let mut errors = FieldErrors::new();
            errors.insert(name, message);
            FormError::Invalid(errors)
        })
    }

    /// Validate against the opened book, then start re-check and write
    pub fn begin_submit(&mut self) -> Result<(), FormError> {
        self.submission.editing()?;

        if let Err(errors) = self.fields.check_all() {
            return Err(self.submission.reject(errors));
        }
        let input = match schemas::parse_borrow(self.fields.values(), self.book.copies, validation::today()) {
            Ok(input) => input,
            Err(errors) => {
                self.fields.errors_mut().clone_from(&errors);
                return Err(self.submission.reject(errors));
            }
        };

        let client = self.client.clone();
        self.submission.start(async move {
            let latest = client.refresh_book(&input.book).await?;
            if !rules::is_borrowable(&latest, input.quantity) {
                let mut errors = FieldErrors::new();
                if let Err(message) = schemas::check_stock(input.quantity, latest.copies) {
                    errors.insert("quantity", message);
                }
                return Err(AppError::Validation(errors));
            }
            client.create_borrow(&input).await
        })
    }

    /// Wait for the write. A stock failure found by the re-check lands in
    /// the quantity slot.
    pub async fn settle(&mut self) -> Result<Borrow, FormError> {
        match self.submission.settle().await {
            Ok(borrow) => {
                self.fields.restore(None);
                Ok(borrow)
            }
            Err(FormError::Invalid(errors)) => {
                self.fields.errors_mut().clone_from(&errors);
                Err(FormError::Invalid(errors))
            }
            Err(error) => Err(error),
        }
    }

    pub async fn submit(&mut self) -> Result<Borrow, FormError> {
        self.begin_submit()?;
        self.settle().await
    }

    pub fn reset(&mut self) -> Result<(), FormError> {
        self.submission.reset()
    }

    pub fn close(&mut self) -> Result<(), FormError> {
        self.submission.reset()?;
        self.fields.restore(None);
        Ok(())
    }
}
