//! User repository trait and Postgres implementation

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::map_constraint_error;
use crate::{
    error::{AppError, AppResult},
    models::user::{NewUser, User, UserCredentials},
};

const USER_COLUMNS: &str = "id, email, name, created_at, updated_at";

/// User persistence. Only `find_by_email` ever returns the password hash.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the email is already registered
    async fn create(&self, user: &NewUser) -> AppResult<User>;

    /// All users, oldest first
    async fn list(&self) -> AppResult<Vec<User>>;

    async fn get(&self, id: Uuid) -> AppResult<Option<User>>;

    async fn email_exists(&self, email: &str) -> AppResult<bool>;

    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserCredentials>>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: Pool<Postgres>,
}

impl PgUserRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

pub(crate) fn duplicate_email() -> AppError {
    AppError::Conflict("User with this email already exists".to_string())
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: &NewUser) -> AppResult<User> {
        let now = Utc::now();
        let query = format!(
            r#"
            INSERT INTO users (id, email, name, password, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&query)
            .bind(Uuid::new_v4())
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.password)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_constraint_error(e, |_| duplicate_email(), |_| duplicate_email()))
    }

    async fn list(&self) -> AppResult<Vec<User>> {
        let query = format!("SELECT {} FROM users ORDER BY created_at", USER_COLUMNS);
        let users = sqlx::query_as::<_, User>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn email_exists(&self, email: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserCredentials>> {
        let user = sqlx::query_as::<_, UserCredentials>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}
