//! Book catalog service

use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{
            Book, BookChanges, BookDetails, BookListEntry, BookQuery, BookWithAuthor, CreateBook,
            NewBook, UpdateBook,
        },
        parse_id, parse_optional_date,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Book with ID {} not found", id))
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Create a book under an existing author
    pub async fn create(&self, request: CreateBook) -> AppResult<BookWithAuthor> {
        request.validate()?;
        let book = NewBook {
            author_id: parse_id("authorId", &request.author_id)?,
            published_at: parse_optional_date("publishedAt", request.published_at.as_deref())?,
            title: request.title,
            isbn: request.isbn,
            description: request.description,
        };

        let created = self.repository.books.create(&book).await?;
        tracing::info!("Book {} created ({})", created.book.id, created.book.title);
        Ok(created)
    }

    /// Books matching every provided filter, newest first
    pub async fn list(&self, query: &BookQuery) -> AppResult<Vec<BookListEntry>> {
        self.repository.books.list(query).await
    }

    /// Book with author and full borrow history
    pub async fn get(&self, id: Uuid) -> AppResult<BookDetails> {
        self.repository
            .books
            .get_with_borrow_history(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    /// Merge the provided fields into an existing book
    pub async fn update(&self, id: Uuid, request: UpdateBook) -> AppResult<BookWithAuthor> {
        if self.repository.books.get(id).await?.is_none() {
            return Err(not_found(id));
        }

        request.validate()?;
        let changes = BookChanges {
            author_id: request
                .author_id
                .as_deref()
                .map(|v| parse_id("authorId", v))
                .transpose()?,
            published_at: parse_optional_date("publishedAt", request.published_at.as_deref())?,
            title: request.title,
            isbn: request.isbn,
            description: request.description,
        };

        self.repository
            .books
            .update(id, &changes)
            .await?
            .ok_or_else(|| not_found(id))
    }

    /// Delete a book. Active borrows do not block deletion; the book's
    /// borrow history is removed with it.
    pub async fn delete(&self, id: Uuid) -> AppResult<Book> {
        let deleted = self
            .repository
            .books
            .delete(id)
            .await?
            .ok_or_else(|| not_found(id))?;
        tracing::info!("Book {} deleted", id);
        Ok(deleted)
    }
}
