//! Book repository trait and Postgres implementation

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, Pool, Postgres};
use uuid::Uuid;

use super::map_constraint_error;
use crate::{
    error::{AppError, AppResult},
    models::{
        author::Author,
        book::{Book, BookChanges, BookDetails, BookListEntry, BookQuery, BookWithAuthor, NewBook},
        borrow_record::{BorrowRecord, BorrowRecordWithUser},
        user::UserSummary,
    },
};

/// Book persistence with the named query shapes the catalog needs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Fails with `BadRequest` when `author_id` does not resolve
    async fn create(&self, book: &NewBook) -> AppResult<BookWithAuthor>;

    /// Filtered listing, newest first, with the active borrow attached
    async fn list(&self, query: &BookQuery) -> AppResult<Vec<BookListEntry>>;

    async fn get(&self, id: Uuid) -> AppResult<Option<Book>>;

    async fn get_with_author(&self, id: Uuid) -> AppResult<Option<BookWithAuthor>>;

    /// Book with every borrow record, newest borrow first
    async fn get_with_borrow_history(&self, id: Uuid) -> AppResult<Option<BookDetails>>;

    /// Returns `None` if the book does not exist
    async fn update(&self, id: Uuid, changes: &BookChanges) -> AppResult<Option<BookWithAuthor>>;

    /// Returns the deleted book, or `None` if it did not exist
    async fn delete(&self, id: Uuid) -> AppResult<Option<Book>>;
}

#[derive(Clone)]
pub struct PgBookRepository {
    pool: Pool<Postgres>,
}

impl PgBookRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Borrow record joined with its borrower's name and email
#[derive(FromRow)]
pub(crate) struct RecordUserRow {
    #[sqlx(flatten)]
    record: BorrowRecord,
    borrower_name: String,
    borrower_email: String,
}

impl From<RecordUserRow> for BorrowRecordWithUser {
    fn from(row: RecordUserRow) -> Self {
        BorrowRecordWithUser {
            user: UserSummary {
                id: row.record.user_id,
                name: row.borrower_name,
                email: row.borrower_email,
            },
            record: row.record,
        }
    }
}

/// Escape LIKE wildcards so the search term matches literally
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

pub(crate) fn author_reference_error(author_id: Uuid) -> AppError {
    AppError::BadRequest(format!("Author with id {} does not exist", author_id))
}

/// Load the authors of the given books, keyed by id
pub(crate) async fn authors_for(pool: &Pool<Postgres>, books: &[Book]) -> AppResult<HashMap<Uuid, Author>> {
    let ids: Vec<Uuid> = books.iter().map(|b| b.author_id).collect();
    let authors = sqlx::query_as::<_, Author>("SELECT * FROM authors WHERE id = ANY($1)")
        .bind(&ids)
        .fetch_all(pool)
        .await?;
    Ok(authors.into_iter().map(|a| (a.id, a)).collect())
}

/// Attach authors to books, keeping the books' order
pub(crate) async fn with_authors(pool: &Pool<Postgres>, books: Vec<Book>) -> AppResult<Vec<BookWithAuthor>> {
    let authors = authors_for(pool, &books).await?;
    books
        .into_iter()
        .map(|book| {
            let author = authors
                .get(&book.author_id)
                .cloned()
                .ok_or_else(|| AppError::Internal(format!("Book {} has no author", book.id)))?;
            Ok(BookWithAuthor { book, author })
        })
        .collect()
}

impl PgBookRepository {
    async fn records_for(&self, book_ids: &[Uuid], active_only: bool) -> AppResult<HashMap<Uuid, Vec<BorrowRecordWithUser>>> {
        let rows = sqlx::query_as::<_, RecordUserRow>(
            r#"
            SELECT r.*, u.name AS borrower_name, u.email AS borrower_email
            FROM borrow_records r
            JOIN users u ON u.id = r.user_id
            WHERE r.book_id = ANY($1)
              AND ($2 = FALSE OR r.returned_at IS NULL)
            ORDER BY r.borrowed_at DESC
            "#,
        )
        .bind(book_ids)
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<BorrowRecordWithUser>> = HashMap::new();
        for row in rows {
            grouped.entry(row.record.book_id).or_default().push(row.into());
        }
        Ok(grouped)
    }
}

#[async_trait]
impl BookRepository for PgBookRepository {
    async fn create(&self, book: &NewBook) -> AppResult<BookWithAuthor> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (id, title, isbn, description, published_at, author_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&book.title)
        .bind(&book.isbn)
        .bind(&book.description)
        .bind(book.published_at)
        .bind(book.author_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            map_constraint_error(
                e,
                |c| AppError::Conflict(format!("Duplicate value for {}", c)),
                |_| author_reference_error(book.author_id),
            )
        })?;

        let mut books = with_authors(&self.pool, vec![row]).await?;
        books
            .pop()
            .ok_or_else(|| AppError::Internal("Created book vanished".to_string()))
    }

    async fn list(&self, query: &BookQuery) -> AppResult<Vec<BookListEntry>> {
        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT b.*
            FROM books b
            WHERE ($1::uuid IS NULL OR b.author_id = $1)
              AND ($2::bool IS NULL OR EXISTS (
                    SELECT 1 FROM borrow_records r
                    WHERE r.book_id = b.id AND r.returned_at IS NULL
                  ) = $2)
              AND ($3::text IS NULL OR b.title ILIKE $3 OR b.description ILIKE $3)
            ORDER BY b.created_at DESC
            "#,
        )
        .bind(query.author_id)
        .bind(query.borrowed)
        .bind(query.search_term().map(like_pattern))
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = books.iter().map(|b| b.id).collect();
        let mut active = self.records_for(&ids, true).await?;

        Ok(with_authors(&self.pool, books)
            .await?
            .into_iter()
            .map(|entry| BookListEntry {
                borrow_records: active.remove(&entry.book.id).unwrap_or_default(),
                book: entry.book,
                author: entry.author,
            })
            .collect())
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(book)
    }

    async fn get_with_author(&self, id: Uuid) -> AppResult<Option<BookWithAuthor>> {
        let Some(book) = self.get(id).await? else {
            return Ok(None);
        };
        Ok(with_authors(&self.pool, vec![book]).await?.pop())
    }

    async fn get_with_borrow_history(&self, id: Uuid) -> AppResult<Option<BookDetails>> {
        let Some(BookWithAuthor { book, author }) = self.get_with_author(id).await? else {
            return Ok(None);
        };
        let mut history = self.records_for(&[id], false).await?;
        Ok(Some(BookDetails {
            borrow_records: history.remove(&id).unwrap_or_default(),
            book,
            author,
        }))
    }

    async fn update(&self, id: Uuid, changes: &BookChanges) -> AppResult<Option<BookWithAuthor>> {
        let row = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET title = COALESCE($2, title),
                isbn = COALESCE($3, isbn),
                description = COALESCE($4, description),
                published_at = COALESCE($5, published_at),
                author_id = COALESCE($6, author_id),
                updated_at = $7
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.isbn)
        .bind(&changes.description)
        .bind(changes.published_at)
        .bind(changes.author_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            map_constraint_error(
                e,
                |c| AppError::Conflict(format!("Duplicate value for {}", c)),
                |_| author_reference_error(changes.author_id.unwrap_or_default()),
            )
        })?;

        match row {
            Some(book) => Ok(with_authors(&self.pool, vec![book]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn delete(&self, id: Uuid) -> AppResult<Option<Book>> {
        // borrow_records.book_id is ON DELETE CASCADE
        let row = sqlx::query_as::<_, Book>("DELETE FROM books WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}
