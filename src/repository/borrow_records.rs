//! Borrow record repository trait and Postgres implementation

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::{
    books::{with_authors, RecordUserRow},
    map_constraint_error,
};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookWithAuthor},
        borrow_record::{BorrowRecord, BorrowRecordDetails, BorrowRecordWithBook, BorrowRecordWithUser},
    },
};

/// Message used whenever a second active borrow is refused
pub const ALREADY_BORROWED: &str = "Book is already borrowed";

/// Borrow record persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BorrowRecordRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> AppResult<Option<BorrowRecord>>;

    async fn find_active_for_book(&self, book_id: Uuid) -> AppResult<Option<BorrowRecord>>;

    /// Insert an open record. Fails with `BusinessRule` if the book already
    /// has an active record, even when that record was inserted concurrently.
    async fn create(&self, record: &BorrowRecord) -> AppResult<BorrowRecordDetails>;

    /// Set the return timestamp of an open record. Returns `None` when the
    /// record is missing or already returned.
    async fn mark_returned(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<Option<BorrowRecordDetails>>;

    /// Records of one user, newest borrow first
    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<BorrowRecordWithBook>>;

    /// Every record, newest borrow first
    async fn list_all(&self) -> AppResult<Vec<BorrowRecordDetails>>;
}

#[derive(Clone)]
pub struct PgBorrowRecordRepository {
    pool: Pool<Postgres>,
}

impl PgBorrowRecordRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn books_for(&self, book_ids: &[Uuid]) -> AppResult<HashMap<Uuid, BookWithAuthor>> {
        let books = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = ANY($1)")
            .bind(book_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(with_authors(&self.pool, books)
            .await?
            .into_iter()
            .map(|b| (b.book.id, b))
            .collect())
    }

    /// Records with borrower, filtered by id, user or nothing
    async fn fetch_with_users(&self, id: Option<Uuid>, user_id: Option<Uuid>) -> AppResult<Vec<BorrowRecordWithUser>> {
        let rows = sqlx::query_as::<_, RecordUserRow>(
            r#"
            SELECT r.*, u.name AS borrower_name, u.email AS borrower_email
            FROM borrow_records r
            JOIN users u ON u.id = r.user_id
            WHERE ($1::uuid IS NULL OR r.id = $1)
              AND ($2::uuid IS NULL OR r.user_id = $2)
            ORDER BY r.borrowed_at DESC
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn details(&self, records: Vec<BorrowRecordWithUser>) -> AppResult<Vec<BorrowRecordDetails>> {
        let ids: Vec<Uuid> = records.iter().map(|r| r.record.book_id).collect();
        let books = self.books_for(&ids).await?;
        records
            .into_iter()
            .map(|r| {
                let book = books
                    .get(&r.record.book_id)
                    .cloned()
                    .ok_or_else(|| AppError::Internal(format!("Borrow record {} has no book", r.record.id)))?;
                Ok(BorrowRecordDetails {
                    record: r.record,
                    book,
                    user: r.user,
                })
            })
            .collect()
    }

    async fn details_by_id(&self, id: Uuid) -> AppResult<Option<BorrowRecordDetails>> {
        let records = self.fetch_with_users(Some(id), None).await?;
        Ok(self.details(records).await?.pop())
    }
}

#[async_trait]
impl BorrowRecordRepository for PgBorrowRecordRepository {
    async fn get(&self, id: Uuid) -> AppResult<Option<BorrowRecord>> {
        let record = sqlx::query_as::<_, BorrowRecord>("SELECT * FROM borrow_records WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn find_active_for_book(&self, book_id: Uuid) -> AppResult<Option<BorrowRecord>> {
        let record = sqlx::query_as::<_, BorrowRecord>(
            "SELECT * FROM borrow_records WHERE book_id = $1 AND returned_at IS NULL",
        )
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn create(&self, record: &BorrowRecord) -> AppResult<BorrowRecordDetails> {
        sqlx::query(
            r#"
            INSERT INTO borrow_records (id, book_id, user_id, borrowed_at, due_date, returned_at)
            VALUES ($1, $2, $3, $4, $5, NULL)
            "#,
        )
        .bind(record.id)
        .bind(record.book_id)
        .bind(record.user_id)
        .bind(record.borrowed_at)
        .bind(record.due_date)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_constraint_error(
                e,
                |_| AppError::BusinessRule(ALREADY_BORROWED.to_string()),
                |_| AppError::NotFound("Book or user not found".to_string()),
            )
        })?;

        self.details_by_id(record.id)
            .await?
            .ok_or_else(|| AppError::Internal("Created borrow record vanished".to_string()))
    }

    async fn mark_returned(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<Option<BorrowRecordDetails>> {
        let updated = sqlx::query(
            "UPDATE borrow_records SET returned_at = $2 WHERE id = $1 AND returned_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.details_by_id(id).await
    }

    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<BorrowRecordWithBook>> {
        let records = self.fetch_with_users(None, Some(user_id)).await?;
        Ok(self
            .details(records)
            .await?
            .into_iter()
            .map(|d| BorrowRecordWithBook {
                record: d.record,
                book: d.book,
            })
            .collect())
    }

    async fn list_all(&self) -> AppResult<Vec<BorrowRecordDetails>> {
        let records = self.fetch_with_users(None, None).await?;
        self.details(records).await
    }
}
