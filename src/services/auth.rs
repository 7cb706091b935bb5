//! Credential capabilities and the login flow
//!
//! Password hashing and token issuance sit behind traits so the rest of the
//! crate never touches the cryptographic primitives directly.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{User, UserClaims},
    repository::Repository,
};

/// Password hashing capability
pub trait PasswordService: Send + Sync {
    fn hash(&self, plain: &str) -> AppResult<String>;

    /// `Ok(false)` on mismatch; errors only on an unreadable hash
    fn verify(&self, plain: &str, hash: &str) -> AppResult<bool>;
}

/// Bearer token capability
pub trait TokenService: Send + Sync {
    fn issue(&self, user: &User) -> AppResult<String>;

    fn validate(&self, token: &str) -> AppResult<UserClaims>;
}

/// Argon2id with a random salt per hash
#[derive(Clone, Default)]
pub struct Argon2PasswordService;

impl PasswordService for Argon2PasswordService {
    fn hash(&self, plain: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }

    fn verify(&self, plain: &str, hash: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(plain.as_bytes(), &parsed_hash)
            .is_ok())
    }
}

/// HS256 JWTs signed with the configured secret
#[derive(Clone)]
pub struct JwtTokenService {
    secret: String,
    expiration_hours: u64,
}

impl JwtTokenService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            expiration_hours: config.jwt_expiration_hours,
        }
    }
}

impl TokenService for JwtTokenService {
    fn issue(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let claims = UserClaims {
            sub: user.id,
            email: user.email.clone(),
            iat: now,
            exp: now + (self.expiration_hours as i64 * 3600),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    fn validate(&self, token: &str) -> AppResult<UserClaims> {
        decode::<UserClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| AppError::Authentication(e.to_string()))
    }
}

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    passwords: Arc<dyn PasswordService>,
    tokens: Arc<dyn TokenService>,
}

impl AuthService {
    pub fn new(
        repository: Repository,
        passwords: Arc<dyn PasswordService>,
        tokens: Arc<dyn TokenService>,
    ) -> Self {
        Self {
            repository,
            passwords,
            tokens,
        }
    }

    /// Check credentials and issue a token. Unknown email and wrong password
    /// produce the same error.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<(String, User)> {
        let invalid = || AppError::Authentication("Invalid email or password".to_string());

        let Some(credentials) = self.repository.users.find_by_email(email).await? else {
            tracing::warn!("Login rejected: unknown email");
            return Err(invalid());
        };

        if !self.passwords.verify(password, &credentials.password)? {
            tracing::warn!("Login rejected for user {}", credentials.user.id);
            return Err(invalid());
        }

        let token = self.tokens.issue(&credentials.user)?;
        tracing::info!("User {} logged in", credentials.user.id);
        Ok((token, credentials.user))
    }

    /// Validate a bearer token
    pub fn validate_token(&self, token: &str) -> AppResult<UserClaims> {
        self.tokens.validate(token)
    }

    /// The user a token was issued to
    pub async fn current_user(&self, user_id: Uuid) -> AppResult<User> {
        self.repository
            .users
            .get(user_id)
            .await?
            .ok_or_else(|| AppError::Authentication("User no longer exists".to_string()))
    }
}
