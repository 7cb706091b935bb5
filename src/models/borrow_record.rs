//! Borrow record model and the borrow/return lifecycle

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::book::BookWithAuthor;
use super::user::UserSummary;

/// Days between borrowing and the due date
pub const LOAN_PERIOD_DAYS: i64 = 14;

/// Borrow record from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRecord {
    pub id: Uuid,
    pub book_id: Uuid,
    pub user_id: Uuid,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl BorrowRecord {
    /// Open a new cycle at `now`. Timestamps are kept at microsecond
    /// precision so they survive a round trip through Postgres unchanged.
    pub fn open(book_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> Self {
        let borrowed_at = now.trunc_subsecs(6);
        Self {
            id: Uuid::new_v4(),
            book_id,
            user_id,
            borrowed_at,
            due_date: due_date_for(borrowed_at),
            returned_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.returned_at.is_none()
    }

    /// Close the cycle. Returns `false` if it was already closed.
    pub fn close(&mut self, now: DateTime<Utc>) -> bool {
        if self.returned_at.is_some() {
            return false;
        }
        self.returned_at = Some(now.trunc_subsecs(6));
        true
    }
}

/// Due date for a borrow starting at `borrowed_at`
pub fn due_date_for(borrowed_at: DateTime<Utc>) -> DateTime<Utc> {
    borrowed_at + Duration::days(LOAN_PERIOD_DAYS)
}

/// Record with its borrower (book detail and catalog listing)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BorrowRecordWithUser {
    #[serde(flatten)]
    pub record: BorrowRecord,
    pub user: UserSummary,
}

/// Record with its book and the book's author (per-user listing)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BorrowRecordWithBook {
    #[serde(flatten)]
    pub record: BorrowRecord,
    pub book: BookWithAuthor,
}

/// Record with book, author and borrower attached
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BorrowRecordDetails {
    #[serde(flatten)]
    pub record: BorrowRecord,
    pub book: BookWithAuthor,
    pub user: UserSummary,
}

/// Borrow request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowBook {
    /// Book UUID
    #[validate(length(min = 1, message = "Book id must not be empty"))]
    pub book_id: String,
    /// Borrower UUID
    #[validate(length(min = 1, message = "User id must not be empty"))]
    pub user_id: String,
}
