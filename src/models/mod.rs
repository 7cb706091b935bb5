//! Data models for the library

pub mod author;
pub mod book;
pub mod borrow_record;
pub mod user;

use chrono::{DateTime, NaiveDate};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

// Re-export commonly used types
pub use author::{Author, AuthorWithBooks};
pub use book::{Book, BookDetails, BookListEntry, BookWithAuthor};
pub use borrow_record::{BorrowRecord, BorrowRecordDetails, BorrowRecordWithBook};
pub use user::{User, UserSummary};

/// Parse an ISO-8601 date or an RFC 3339 timestamp into a calendar date
pub fn parse_iso_date(field: &str, value: &str) -> AppResult<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.date_naive()))
        .map_err(|_| AppError::Validation(format!("{} must be an ISO-8601 date", field)))
}

/// Parse an optional date field
pub fn parse_optional_date(field: &str, value: Option<&str>) -> AppResult<Option<NaiveDate>> {
    value.map(|v| parse_iso_date(field, v)).transpose()
}

/// Parse an identifier supplied in a request body
pub fn parse_id(field: &str, value: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value.trim())
        .map_err(|_| AppError::Validation(format!("{} must be a UUID", field)))
}
