//! Author registry service

use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        author::{Author, AuthorChanges, AuthorWithBooks, CreateAuthor, NewAuthor, UpdateAuthor},
        parse_optional_date,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct AuthorsService {
    repository: Repository,
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Author with ID {} not found", id))
}

impl AuthorsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Create an author
    pub async fn create(&self, request: CreateAuthor) -> AppResult<Author> {
        request.validate()?;
        let author = NewAuthor {
            birth_date: parse_optional_date("birthDate", request.birth_date.as_deref())?,
            name: request.name,
            bio: request.bio,
        };

        let created = self.repository.authors.create(&author).await?;
        tracing::info!("Author {} created ({})", created.id, created.name);
        Ok(created)
    }

    /// All authors with their books
    pub async fn list(&self) -> AppResult<Vec<AuthorWithBooks>> {
        self.repository.authors.list_with_books().await
    }

    /// One author with its books
    pub async fn get(&self, id: Uuid) -> AppResult<AuthorWithBooks> {
        self.repository
            .authors
            .get_with_books(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    /// Merge the provided fields into an existing author
    pub async fn update(&self, id: Uuid, request: UpdateAuthor) -> AppResult<Author> {
        request.validate()?;
        let changes = AuthorChanges {
            birth_date: parse_optional_date("birthDate", request.birth_date.as_deref())?,
            name: request.name,
            bio: request.bio,
        };

        self.repository
            .authors
            .update(id, &changes)
            .await?
            .ok_or_else(|| not_found(id))
    }

    /// Delete an author and, through the store, all of its books
    pub async fn delete(&self, id: Uuid) -> AppResult<Author> {
        let deleted = self
            .repository
            .authors
            .delete(id)
            .await?
            .ok_or_else(|| not_found(id))?;
        tracing::info!("Author {} deleted with its books", id);
        Ok(deleted)
    }
}
