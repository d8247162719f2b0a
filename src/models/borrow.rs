//! Borrow model and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Reference to a book from a borrow record: either the bare id or the
/// populated document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BookRef {
    Id(String),
    Embedded {
        #[serde(alias = "_id")]
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        isbn: Option<String>,
    },
}

impl BookRef {
    pub fn id(&self) -> &str {
        match self {
            BookRef::Id(id) => id,
            BookRef::Embedded { id, .. } => id,
        }
    }
}

/// Borrow record as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Borrow {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub book: BookRef,
    pub quantity: i64,
    #[serde(deserialize_with = "deserialize_due_date")]
    pub due_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Create borrow request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowInput {
    /// Book id
    pub book: String,
    pub quantity: i64,
    pub due_date: NaiveDate,
}

/// Per-book borrow totals, computed server side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowSummary {
    pub book_id: String,
    pub book_title: String,
    pub isbn: String,
    #[serde(alias = "totalQuantity")]
    pub total_quantity_borrowed: i64,
}

/// Borrow list query parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BorrowQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// Accepts `YYYY-MM-DD` as well as full timestamps
fn deserialize_due_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    crate::rules::parse_due_date(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid due date: {}", raw)))
}
