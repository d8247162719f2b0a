//! Form controllers.
//!
//! Each controller owns its field values and error slots, validates live as
//! fields change and in full on submit, and runs exactly one mutation per
//! accepted submit. The mutation runs on its own task: `begin_submit` starts
//! it and `settle` waits for it, so a caller that stops waiting does not
//! cancel the write.

pub mod book;
pub mod borrow;

pub use book::{BookForm, DeleteBook};
pub use borrow::BorrowForm;

use std::future::Future;

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::{
    error::{AppError, AppResult},
    validation::{self, FieldErrors, Schema},
};

/// Message shown for the structured server rejection
pub const ISBN_REJECTED: &str = "Isbn already exists or not valid";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormState {
    #[default]
    Idle,
    Validating,
    Submitting,
    Success,
    Failed,
}

/// What a controller submits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormAction {
    Add,
    Update,
    Delete,
    Borrow,
}

impl FormAction {
    pub fn success_message(self) -> &'static str {
        match self {
            FormAction::Add => "Book added successfully",
            FormAction::Update => "Book updated successfully",
            FormAction::Delete => "Book deleted successfully",
            FormAction::Borrow => "Book borrowed successfully",
        }
    }

    pub fn writes_isbn(self) -> bool {
        matches!(self, FormAction::Add | FormAction::Update)
    }

    pub fn failure_message(self) -> &'static str {
        match self {
            FormAction::Add => "Failed to add book",
            FormAction::Update => "Failed to update book",
            FormAction::Delete => "Failed to delete book",
            FormAction::Borrow => "Failed to borrow book",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormError {
    /// Local validation failed; nothing was sent
    #[error("Please correct the highlighted fields: {0}")]
    Invalid(FieldErrors),

    #[error("A submission is already in progress")]
    Busy,

    #[error("Nothing has been submitted")]
    NotSubmitted,

    /// Duplicate or invalid ISBN reported by the server on a book write
    #[error("Isbn already exists or not valid")]
    Rejected(AppError),

    #[error("{}", .action.failure_message())]
    Failed { action: FormAction, cause: AppError },
}

impl FormError {
    /// Map a data-access error to what the user sees. Only book writes
    /// carry an ISBN, so a rejection elsewhere is a plain failure.
    pub fn from_api(action: FormAction, error: AppError) -> Self {
        match error {
            AppError::Validation(errors) => FormError::Invalid(errors),
            error if error.is_rejection() && action.writes_isbn() => FormError::Rejected(error),
            cause => FormError::Failed { action, cause },
        }
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            FormError::Invalid(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Field values plus one error slot per field
#[derive(Debug, Clone)]
pub(crate) struct Fields {
    schema: &'static Schema,
    initial: Map<String, Value>,
    values: Map<String, Value>,
    errors: FieldErrors,
}

impl Fields {
    pub(crate) fn new(schema: &'static Schema, initial: Map<String, Value>) -> Self {
        Self {
            schema,
            values: initial.clone(),
            initial,
            errors: FieldErrors::new(),
        }
    }

    /// Store a value and refresh its error slot. Names outside the schema
    /// are refused and leave values and slots untouched.
    pub(crate) fn set(&mut self, name: &str, value: Value) -> Result<(), String> {
        if self.schema.field(name).is_none() {
            return Err(format!("Unknown field: {}", name));
        }
        let result = self.schema.validate_field(name, &value);
        match &result {
            Ok(()) => self.errors.clear(name),
            Err(message) => self.errors.set(name, message.clone()),
        }
        self.values.insert(name.to_string(), value);
        result
    }

    /// Validate everything; all slots are rewritten
    pub(crate) fn check_all(&mut self) -> Result<(), FieldErrors> {
        let result = self.schema.validate_on(&self.values, validation::today());
        self.errors = result.clone().err().unwrap_or_default();
        result
    }

    /// Validate only the fields that hold a value; all slots are rewritten
    pub(crate) fn check_present(&mut self) -> Result<(), FieldErrors> {
        let result = self.schema.validate_present_on(&self.values, validation::today());
        self.errors = result.clone().err().unwrap_or_default();
        result
    }

    /// Back to the initial values, or to new ones
    pub(crate) fn restore(&mut self, initial: Option<Map<String, Value>>) {
        if let Some(initial) = initial {
            self.initial = initial;
        }
        self.values = self.initial.clone();
        self.errors = FieldErrors::new();
    }

    pub(crate) fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub(crate) fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub(crate) fn errors_mut(&mut self) -> &mut FieldErrors {
        &mut self.errors
    }
}

/// Submit lifecycle shared by every controller
pub(crate) struct Submission<T> {
    action: FormAction,
    state: FormState,
    pending: Option<JoinHandle<AppResult<T>>>,
}

impl<T: Send + 'static> Submission<T> {
    pub(crate) fn new(action: FormAction) -> Self {
        Self {
            action,
            state: FormState::Idle,
            pending: None,
        }
    }

    pub(crate) fn state(&self) -> FormState {
        self.state
    }

    pub(crate) fn action(&self) -> FormAction {
        self.action
    }

    pub(crate) fn ensure_not_busy(&self) -> Result<(), FormError> {
        if self.state == FormState::Submitting {
            return Err(FormError::Busy);
        }
        Ok(())
    }

    /// A field changed
    pub(crate) fn editing(&mut self) -> Result<(), FormError> {
        self.ensure_not_busy()?;
        self.state = FormState::Validating;
        Ok(())
    }

    /// Submit blocked before reaching the network
    pub(crate) fn reject(&mut self, errors: FieldErrors) -> FormError {
        tracing::debug!("{:?} blocked by validation: {}", self.action, errors);
        self.state = FormState::Failed;
        FormError::Invalid(errors)
    }

    /// Spawn the mutation
    pub(crate) fn start<F>(&mut self, mutation: F) -> Result<(), FormError>
    where
        F: Future<Output = AppResult<T>> + Send + 'static,
    {
        self.ensure_not_busy()?;
        self.state = FormState::Submitting;
        self.pending = Some(tokio::spawn(mutation));
        Ok(())
    }

    /// Wait for the spawned mutation. Safe to drop and call again.
    pub(crate) async fn settle(&mut self) -> Result<T, FormError> {
        let Some(handle) = self.pending.as_mut() else {
            return Err(FormError::NotSubmitted);
        };
        let joined = handle.await;
        self.pending = None;

        let outcome = joined.unwrap_or_else(|e| Err(AppError::Transport(format!("submission task failed: {}", e))));
        match outcome {
            Ok(value) => {
                self.state = FormState::Success;
                tracing::info!("{}", self.action.success_message());
                Ok(value)
            }
            Err(error) => {
                self.state = FormState::Failed;
                let error = FormError::from_api(self.action, error);
                match &error {
                    FormError::Invalid(errors) => tracing::debug!("{:?} blocked by validation: {}", self.action, errors),
                    FormError::Rejected(cause) | FormError::Failed { cause, .. } => {
                        tracing::warn!("{}: {}", self.action.failure_message(), cause)
                    }
                    _ => {}
                }
                Err(error)
            }
        }
    }

    /// Back to idle, unless a mutation is running
    pub(crate) fn reset(&mut self) -> Result<(), FormError> {
        self.ensure_not_busy()?;
        self.state = FormState::Idle;
        Ok(())
    }
}
