//! Book (catalog entry) model and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::author::Author;
use super::borrow_record::BorrowRecordWithUser;

/// Full book model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub published_at: Option<NaiveDate>,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Case-insensitive substring match over title and description
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self
                .description
                .as_deref()
                .map(|d| d.to_lowercase().contains(&needle))
                .unwrap_or(false)
    }

    /// Merge provided fields, bumping `updated_at`
    pub fn apply(&mut self, changes: &BookChanges, now: DateTime<Utc>) {
        if let Some(ref title) = changes.title {
            self.title = title.clone();
        }
        if let Some(ref isbn) = changes.isbn {
            self.isbn = Some(isbn.clone());
        }
        if let Some(ref description) = changes.description {
            self.description = Some(description.clone());
        }
        if let Some(published_at) = changes.published_at {
            self.published_at = Some(published_at);
        }
        if let Some(author_id) = changes.author_id {
            self.author_id = author_id;
        }
        self.updated_at = now;
    }
}

/// Book with its author attached
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookWithAuthor {
    #[serde(flatten)]
    pub book: Book,
    pub author: Author,
}

/// Book as listed in the catalog: author plus the active borrow, if any
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookListEntry {
    #[serde(flatten)]
    pub book: Book,
    pub author: Author,
    /// Zero or one record, the one with no return timestamp
    pub borrow_records: Vec<BorrowRecordWithUser>,
}

impl BookListEntry {
    pub fn is_borrowed(&self) -> bool {
        self.borrow_records.iter().any(|r| r.record.is_active())
    }
}

/// Book with author and its whole borrow history
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookDetails {
    #[serde(flatten)]
    pub book: Book,
    pub author: Author,
    pub borrow_records: Vec<BorrowRecordWithUser>,
}

/// Catalog filters; every provided filter must hold
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookQuery {
    /// Only books by this author
    pub author_id: Option<Uuid>,
    /// `true`: only books with an active borrow, `false`: only books without
    pub borrowed: Option<bool>,
    /// Case-insensitive substring of title or description
    pub search: Option<String>,
}

impl BookQuery {
    /// Empty search strings are treated as absent
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.is_empty())
    }
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Title must not be empty"))]
    pub title: String,
    pub isbn: Option<String>,
    pub description: Option<String>,
    /// ISO-8601 date, e.g. `1934-01-01`
    pub published_at: Option<String>,
    /// Author UUID
    #[validate(length(min = 1, message = "Author id must not be empty"))]
    pub author_id: String,
}

/// Update book request; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBook {
    #[validate(length(min = 1, message = "Title must not be empty"))]
    pub title: Option<String>,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub published_at: Option<String>,
    pub author_id: Option<String>,
}

/// Validated book fields handed to the repository
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub title: String,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub published_at: Option<NaiveDate>,
    pub author_id: Uuid,
}

/// Validated partial update handed to the repository
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookChanges {
    pub title: Option<String>,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub published_at: Option<NaiveDate>,
    pub author_id: Option<Uuid>,
}
