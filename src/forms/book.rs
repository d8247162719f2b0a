//! Add, edit and delete book controllers

use serde_json::{json, Map, Value};

use super::{FieldErrors, Fields, FormAction, FormError, FormState, Submission};
use crate::{
    api::ApiClient,
    models::{Book, BookInput, BookPatch, Deleted},
    validation::{
        self,
        schemas::{self, BOOK_SCHEMA},
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    New,
    Existing(String),
    /// Only the fields that were set are validated and sent
    Partial(String),
}

/// Create or edit form for one book
pub struct BookForm {
    client: ApiClient,
    target: Target,
    fields: Fields,
    submission: Submission<Book>,
}

impl BookForm {
    /// Empty form for a new book
    pub fn create(client: ApiClient) -> Self {
        let mut initial = Map::new();
        initial.insert("available".to_string(), json!(true));
        Self {
            client,
            target: Target::New,
            fields: Fields::new(&BOOK_SCHEMA, initial),
            submission: Submission::new(FormAction::Add),
        }
    }

    /// Form pre-filled from an existing book
    pub fn edit(client: ApiClient, book: &Book) -> Self {
        Self {
            client,
            target: Target::Existing(book.id.clone()),
            fields: Fields::new(&BOOK_SCHEMA, schemas::values_of(&BookInput::from(book))),
            submission: Submission::new(FormAction::Update),
        }
    }

    /// Empty form that updates only the fields it is given
    pub fn patch(client: ApiClient, id: impl Into<String>) -> Self {
        Self {
            client,
            target: Target::Partial(id.into()),
            fields: Fields::new(&BOOK_SCHEMA, Map::new()),
            submission: Submission::new(FormAction::Update),
        }
    }

    pub fn action(&self) -> FormAction {
        self.submission.action()
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

    /// Update one field and validate it on its own.
    ///
    /// The value is kept even when invalid; the error lands in its slot and
    /// is also returned.
    pub fn set_field(&mut self, name: &str, value: impl Into<Value>) -> Result<(), FormError> {
        self.submission.editing()?;
        self.fields.set(name, value.into()).map_err(|message| {
            let mut errors = FieldErrors::new();
            errors.insert(name, message);
            FormError::Invalid(errors)
        })
    }

    /// Validate the record and, if it passes, start the write
    pub fn begin_submit(&mut self) -> Result<(), FormError> {
        self.submission.editing()?;

        let client = self.client.clone();
        match self.target.clone() {
            Target::New => {
                let input = self.validated_input()?;
                self.submission
                    .start(async move { client.create_book(&input).await })
            }
            Target::Existing(id) => {
                let patch = BookPatch::from(self.validated_input()?);
                self.submission
                    .start(async move { client.update_book(&id, &patch).await })
            }
            Target::Partial(id) => {
                let patch = self.validated_patch()?;
                self.submission
                    .start(async move { client.update_book(&id, &patch).await })
            }
        }
    }

    fn validated_input(&mut self) -> Result<BookInput, FormError> {
        if let Err(errors) = self.fields.check_all() {
            return Err(self.submission.reject(errors));
        }
        match schemas::parse_book(self.fields.values(), validation::today()) {
            Ok(input) => Ok(input),
            Err(errors) => {
                self.fields.errors_mut().clone_from(&errors);
                Err(self.submission.reject(errors))
            }
        }
    }

    fn validated_patch(&mut self) -> Result<BookPatch, FormError> {
        if let Err(errors) = self.fields.check_present() {
            return Err(self.submission.reject(errors));
        }
        let errors = match schemas::parse_book_patch(self.fields.values(), validation::today()) {
            Ok(patch) if !patch.is_empty() => return Ok(patch),
            Ok(_) => {
                let mut errors = FieldErrors::new();
                errors.insert("form", "Nothing to update");
                errors
            }
            Err(errors) => errors,
        };
        self.fields.errors_mut().clone_from(&errors);
        Err(self.submission.reject(errors))
    }

    /// Wait for the write started by [`BookForm::begin_submit`]. Input is
    /// cleared on success and kept on failure.
    pub async fn settle(&mut self) -> Result<Book, FormError> {
        let book = self.submission.settle().await?;
        match self.target {
            Target::New | Target::Partial(_) => self.fields.restore(None),
            Target::Existing(_) => self
                .fields
                .restore(Some(schemas::values_of(&BookInput::from(&book)))),
        }
        Ok(book)
    }

    pub async fn submit(&mut self) -> Result<Book, FormError> {
        self.begin_submit()?;
        self.settle().await
    }

    /// Back to idle keeping the input
    pub fn reset(&mut self) -> Result<(), FormError> {
        self.submission.reset()
    }

    /// Back to idle discarding the input
    pub fn close(&mut self) -> Result<(), FormError> {
        self.submission.reset()?;
        self.fields.restore(None);
        Ok(())
    }
}

/// Confirm-and-delete controller for one book
pub struct DeleteBook {
    client: ApiClient,
    id: String,
    submission: Submission<Deleted>,
}

impl DeleteBook {
    pub fn new(client: ApiClient, id: impl Into<String>) -> Self {
        Self {
            client,
            id: id.into(),
            submission: Submission::new(FormAction::Delete),
        }
    }

    pub fn state(&self) -> FormState {
        self.submission.state()
    }

    pub fn begin_submit(&mut self) -> Result<(), FormError> {
        let client = self.client.clone();
        let id = self.id.clone();
        self.submission
            .start(async move { client.delete_book(&id).await })
    }

    pub async fn settle(&mut self) -> Result<Deleted, FormError> {
        self.submission.settle().await
    }

    pub async fn submit(&mut self) -> Result<Deleted, FormError> {
        self.begin_submit()?;
        self.settle().await
    }

    pub fn close(&mut self) -> Result<(), FormError> {
        self.submission.reset()
    }
}
