//! Cache tags and the endpoint table.
//!
//! Every endpoint declares the tags its result provides (queries) or the tags
//! it invalidates (mutations). Matching is exact: the `Books` collection tag
//! and a `Books:{id}` tag are different tags.

use std::fmt;

/// Resource family of a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Books,
    Borrows,
}

impl TagKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagKind::Books => "Books",
            TagKind::Borrows => "Borrows",
        }
    }
}

/// A label identifying a class of cached reads
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub kind: TagKind,
    pub id: Option<String>,
}

impl Tag {
    /// Collection-level tag
    pub fn collection(kind: TagKind) -> Self {
        Self { kind, id: None }
    }

    /// Tag scoped to one resource id
    pub fn item(kind: TagKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: Some(id.into()),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}:{}", self.kind.as_str(), id),
            None => write!(f, "{}", self.kind.as_str()),
        }
    }
}

/// Catalog API operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    ListBooks,
    GetBook,
    CreateBook,
    UpdateBook,
    DeleteBook,
    ListBorrows,
    CreateBorrow,
    BorrowSummary,
}

impl Endpoint {
    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::ListBooks => "listBooks",
            Endpoint::GetBook => "getBook",
            Endpoint::CreateBook => "createBook",
            Endpoint::UpdateBook => "updateBook",
            Endpoint::DeleteBook => "deleteBook",
            Endpoint::ListBorrows => "listBorrows",
            Endpoint::CreateBorrow => "createBorrow",
            Endpoint::BorrowSummary => "getBorrowSummary",
        }
    }

    /// Tags attached to a cached result of this query
    pub fn provides(&self, id: Option<&str>) -> Vec<Tag> {
        match (self, id) {
            (Endpoint::ListBooks, _) => vec![Tag::collection(TagKind::Books)],
            (Endpoint::GetBook, Some(id)) => vec![Tag::item(TagKind::Books, id)],
            (Endpoint::GetBook, None) => vec![Tag::collection(TagKind::Books)],
            (Endpoint::ListBorrows, _) | (Endpoint::BorrowSummary, _) => {
                vec![Tag::collection(TagKind::Borrows)]
            }
            _ => Vec::new(),
        }
    }

    /// Tags a successful call to this mutation marks stale
    pub fn invalidates(&self, id: Option<&str>) -> Vec<Tag> {
        match self {
            Endpoint::CreateBook | Endpoint::DeleteBook => vec![Tag::collection(TagKind::Books)],
            Endpoint::UpdateBook => with_item(vec![Tag::collection(TagKind::Books)], id),
            // Borrowing changes the referenced book's copies and availability
            Endpoint::CreateBorrow => with_item(
                vec![
                    Tag::collection(TagKind::Borrows),
                    Tag::collection(TagKind::Books),
                ],
                id,
            ),
            _ => Vec::new(),
        }
    }
}

fn with_item(mut tags: Vec<Tag>, id: Option<&str>) -> Vec<Tag> {
    if let Some(id) = id {
        tags.push(Tag::item(TagKind::Books, id));
    }
    tags
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
