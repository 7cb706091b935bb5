//! Author repository trait and Postgres implementation

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        author::{Author, AuthorChanges, AuthorWithBooks, NewAuthor},
        book::Book,
    },
};

/// Author persistence. Deleting an author also deletes its books.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthorRepository: Send + Sync {
    async fn create(&self, author: &NewAuthor) -> AppResult<Author>;

    /// All authors, oldest first, each with its books
    async fn list_with_books(&self) -> AppResult<Vec<AuthorWithBooks>>;

    async fn get_with_books(&self, id: Uuid) -> AppResult<Option<AuthorWithBooks>>;

    /// Returns `None` if the author does not exist
    async fn update(&self, id: Uuid, changes: &AuthorChanges) -> AppResult<Option<Author>>;

    /// Returns the deleted author, or `None` if it did not exist
    async fn delete(&self, id: Uuid) -> AppResult<Option<Author>>;
}

#[derive(Clone)]
pub struct PgAuthorRepository {
    pool: Pool<Postgres>,
}

impl PgAuthorRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn books_by_author(&self, author_ids: &[Uuid]) -> AppResult<HashMap<Uuid, Vec<Book>>> {
        let books = sqlx::query_as::<_, Book>(
            "SELECT * FROM books WHERE author_id = ANY($1) ORDER BY created_at",
        )
        .bind(author_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<Book>> = HashMap::new();
        for book in books {
            grouped.entry(book.author_id).or_default().push(book);
        }
        Ok(grouped)
    }
}

#[async_trait]
impl AuthorRepository for PgAuthorRepository {
    async fn create(&self, author: &NewAuthor) -> AppResult<Author> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, Author>(
            r#"
            INSERT INTO authors (id, name, bio, birth_date, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&author.name)
        .bind(&author.bio)
        .bind(author.birth_date)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_with_books(&self) -> AppResult<Vec<AuthorWithBooks>> {
        let authors = sqlx::query_as::<_, Author>("SELECT * FROM authors ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;

        let ids: Vec<Uuid> = authors.iter().map(|a| a.id).collect();
        let mut books = self.books_by_author(&ids).await?;

        Ok(authors
            .into_iter()
            .map(|author| AuthorWithBooks {
                books: books.remove(&author.id).unwrap_or_default(),
                author,
            })
            .collect())
    }

    async fn get_with_books(&self, id: Uuid) -> AppResult<Option<AuthorWithBooks>> {
        let author = sqlx::query_as::<_, Author>("SELECT * FROM authors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(author) = author else {
            return Ok(None);
        };
        let mut books = self.books_by_author(&[id]).await?;
        Ok(Some(AuthorWithBooks {
            books: books.remove(&id).unwrap_or_default(),
            author,
        }))
    }

    async fn update(&self, id: Uuid, changes: &AuthorChanges) -> AppResult<Option<Author>> {
        let row = sqlx::query_as::<_, Author>(
            r#"
            UPDATE authors
            SET name = COALESCE($2, name),
                bio = COALESCE($3, bio),
                birth_date = COALESCE($4, birth_date),
                updated_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.bio)
        .bind(changes.birth_date)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete(&self, id: Uuid) -> AppResult<Option<Author>> {
        // books.author_id is ON DELETE CASCADE
        let row = sqlx::query_as::<_, Author>("DELETE FROM authors WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}
