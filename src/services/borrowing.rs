//! Borrow and return workflow
//!
//! A book moves Available -> Borrowed -> Returned within one borrow cycle.
//! Returned is terminal for that cycle; borrowing again opens a new record.
//! At most one cycle per book is open at any time. The check here gives the
//! caller a precise error, and the store refuses a second open record even
//! when two borrows race past the check.

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        borrow_record::{BorrowBook, BorrowRecord, BorrowRecordDetails, BorrowRecordWithBook},
        parse_id,
    },
    repository::{borrow_records::ALREADY_BORROWED, Repository},
};

#[derive(Clone)]
pub struct BorrowingService {
    repository: Repository,
}

fn already_returned() -> AppError {
    AppError::BusinessRule("Book already returned".to_string())
}

impl BorrowingService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Open a borrow cycle for a book
    pub async fn borrow(&self, request: BorrowBook) -> AppResult<BorrowRecordDetails> {
        request.validate()?;
        let book_id = parse_id("bookId", &request.book_id)?;
        let user_id = parse_id("userId", &request.user_id)?;

        if self.repository.books.get(book_id).await?.is_none() {
            return Err(AppError::NotFound("Book not found".to_string()));
        }
        if self.repository.users.get(user_id).await?.is_none() {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        if self
            .repository
            .borrow_records
            .find_active_for_book(book_id)
            .await?
            .is_some()
        {
            tracing::warn!("Borrow of book {} rejected: already borrowed", book_id);
            return Err(AppError::BusinessRule(ALREADY_BORROWED.to_string()));
        }

        let record = BorrowRecord::open(book_id, user_id, Utc::now());
        let created = self
            .repository
            .borrow_records
            .create(&record)
            .await
            .inspect_err(|e| {
                if e.is_conflict() {
                    tracing::warn!("Borrow of book {} lost a race with another borrow", book_id);
                }
            })?;

        tracing::info!(
            "Book {} borrowed by user {} until {}",
            book_id,
            user_id,
            created.record.due_date
        );
        Ok(created)
    }

    /// Close a borrow cycle
    pub async fn return_book(&self, id: Uuid) -> AppResult<BorrowRecordDetails> {
        let record = self
            .repository
            .borrow_records
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Borrowed book record not found".to_string()))?;

        if !record.is_active() {
            tracing::warn!("Return of record {} rejected: already returned", id);
            return Err(already_returned());
        }

        // A concurrent return may close the record between the read and the write
        let returned = self
            .repository
            .borrow_records
            .mark_returned(id, Utc::now())
            .await?
            .ok_or_else(already_returned)?;

        tracing::info!("Book {} returned by user {}", record.book_id, record.user_id);
        Ok(returned)
    }

    /// Records of one user, newest borrow first. Unknown users have none.
    pub async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<BorrowRecordWithBook>> {
        self.repository.borrow_records.list_by_user(user_id).await
    }

    /// Every record, newest borrow first
    pub async fn list_all(&self) -> AppResult<Vec<BorrowRecordDetails>> {
        self.repository.borrow_records.list_all().await
    }
}
