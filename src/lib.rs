//! Library Catalog
//!
//! Client core for a library catalog REST API: schema-driven validation of
//! book and borrow records, borrowing rules, a typed API client with a
//! tag-invalidated query cache, and form controllers tying them together.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod forms;
pub mod models;
pub mod rules;
pub mod validation;

pub use api::ApiClient;
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use forms::{BookForm, BorrowForm, DeleteBook};
use models::Book;

/// Configuration plus the shared client every form talks through
#[derive(Clone)]
pub struct Catalog {
    pub config: Arc<AppConfig>,
    pub client: ApiClient,
}

impl Catalog {
    /// HTTP-backed catalog
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let client = ApiClient::from_config(&config)?;
        Ok(Self::with_client(config, client))
    }

    /// Catalog over an existing client (any transport)
    pub fn with_client(config: AppConfig, client: ApiClient) -> Self {
        Self {
            config: Arc::new(config),
            client,
        }
    }

    pub fn add_book(&self) -> BookForm {
        BookForm::create(self.client.clone())
    }

    pub fn edit_book(&self, book: &Book) -> BookForm {
        BookForm::edit(self.client.clone(), book)
    }

    /// Update only the fields that get set
    pub fn patch_book(&self, id: &str) -> BookForm {
        BookForm::patch(self.client.clone(), id)
    }

    pub fn delete_book(&self, id: &str) -> DeleteBook {
        DeleteBook::new(self.client.clone(), id)
    }

    pub fn borrow_book(&self, book: &Book) -> BorrowForm {
        BorrowForm::new(self.client.clone(), book)
    }
}
