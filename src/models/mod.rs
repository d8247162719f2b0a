//! Data models for the catalog API

pub mod book;
pub mod borrow;
pub mod enums;

use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use book::{Book, BookInput, BookPatch, BookQuery};
pub use borrow::{BookRef, Borrow, BorrowInput, BorrowQuery, BorrowSummary};
pub use enums::{Genre, SortOrder};

/// Single-resource response wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

/// Paginated list response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub total: u64,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub total_pages: u32,
}

fn first_page() -> u32 {
    1
}

/// Body of a successful delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deleted {
    #[serde(alias = "_id")]
    pub id: String,
}
