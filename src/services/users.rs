//! User directory service

use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use super::auth::PasswordService;
use crate::{
    error::{AppError, AppResult},
    models::user::{CreateUser, NewUser, User, UserCredentials},
    repository::Repository,
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    passwords: Arc<dyn PasswordService>,
}

impl UsersService {
    pub fn new(repository: Repository, passwords: Arc<dyn PasswordService>) -> Self {
        Self {
            repository,
            passwords,
        }
    }

    /// Register a user. The password is hashed before it reaches the store.
    pub async fn create(&self, request: CreateUser) -> AppResult<User> {
        request.validate()?;

        if self.repository.users.email_exists(&request.email).await? {
            tracing::warn!("Registration rejected: email already in use");
            return Err(AppError::Conflict("User with this email already exists".to_string()));
        }

        let user = NewUser {
            password: self.passwords.hash(&request.password)?,
            email: request.email,
            name: request.name,
        };

        let created = self.repository.users.create(&user).await?;
        tracing::info!("User {} registered", created.id);
        Ok(created)
    }

    pub async fn list(&self) -> AppResult<Vec<User>> {
        self.repository.users.list().await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<User> {
        self.repository
            .users
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with ID {} not found", id)))
    }

    /// Lookup including the password hash, for credential checks
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<UserCredentials>> {
        self.repository.users.find_by_email(email).await
    }
}
