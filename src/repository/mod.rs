//! Repository layer for database operations
//!
//! Each entity has a repository trait; services only see the traits. Two
//! backends implement them: Postgres (`sqlx`) and an in-process store.

pub mod authors;
pub mod books;
pub mod borrow_records;
pub mod memory;
pub mod users;

use std::sync::Arc;

use sqlx::{Pool, Postgres};

use crate::error::{AppError, AppResult};

pub use authors::AuthorRepository;
pub use books::BookRepository;
pub use borrow_records::BorrowRecordRepository;
pub use users::UserRepository;

/// Store handle passed to every service
#[derive(Clone)]
pub struct Repository {
    pool: Option<Pool<Postgres>>,
    pub authors: Arc<dyn AuthorRepository>,
    pub books: Arc<dyn BookRepository>,
    pub users: Arc<dyn UserRepository>,
    pub borrow_records: Arc<dyn BorrowRecordRepository>,
}

impl Repository {
    /// Create a repository backed by the given database pool
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            authors: Arc::new(authors::PgAuthorRepository::new(pool.clone())),
            books: Arc::new(books::PgBookRepository::new(pool.clone())),
            users: Arc::new(users::PgUserRepository::new(pool.clone())),
            borrow_records: Arc::new(borrow_records::PgBorrowRecordRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Create a repository backed by a fresh in-process store
    pub fn memory() -> Self {
        let store = memory::MemoryStore::default();
        Self {
            pool: None,
            authors: Arc::new(store.clone()),
            books: Arc::new(store.clone()),
            users: Arc::new(store.clone()),
            borrow_records: Arc::new(store),
        }
    }

    /// Assemble a repository from individual implementations
    pub fn from_parts(
        authors: Arc<dyn AuthorRepository>,
        books: Arc<dyn BookRepository>,
        users: Arc<dyn UserRepository>,
        borrow_records: Arc<dyn BorrowRecordRepository>,
    ) -> Self {
        Self {
            pool: None,
            authors,
            books,
            users,
            borrow_records,
        }
    }

    /// Check the store is reachable
    pub async fn ping(&self) -> AppResult<()> {
        if let Some(ref pool) = self.pool {
            sqlx::query("SELECT 1").execute(pool).await?;
        }
        Ok(())
    }
}

// Postgres SQLSTATE codes
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Translate constraint violations into domain errors; `on_unique` and
/// `on_foreign_key` build the error for the respective violation.
pub(crate) fn map_constraint_error(
    err: sqlx::Error,
    on_unique: impl FnOnce(&str) -> AppError,
    on_foreign_key: impl FnOnce(&str) -> AppError,
) -> AppError {
    if let sqlx::Error::Database(ref db) = err {
        let constraint = db.constraint().unwrap_or_default().to_string();
        match db.code().as_deref() {
            Some(UNIQUE_VIOLATION) => return on_unique(&constraint),
            Some(FOREIGN_KEY_VIOLATION) => return on_foreign_key(&constraint),
            _ => {}
        }
    }
    AppError::Database(err)
}
