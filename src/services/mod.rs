//! Business logic services

pub mod auth;
pub mod authors;
pub mod borrowing;
pub mod catalog;
pub mod seed;
pub mod users;

use std::sync::Arc;

use crate::{config::AuthConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub repository: Repository,
    pub auth: auth::AuthService,
    pub authors: authors::AuthorsService,
    pub catalog: catalog::CatalogService,
    pub users: users::UsersService,
    pub borrowing: borrowing::BorrowingService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, auth_config: &AuthConfig) -> Self {
        let passwords: Arc<dyn auth::PasswordService> = Arc::new(auth::Argon2PasswordService);
        let tokens: Arc<dyn auth::TokenService> = Arc::new(auth::JwtTokenService::new(auth_config));

        Self {
            auth: auth::AuthService::new(repository.clone(), passwords.clone(), tokens),
            authors: authors::AuthorsService::new(repository.clone()),
            catalog: catalog::CatalogService::new(repository.clone()),
            users: users::UsersService::new(repository.clone(), passwords),
            borrowing: borrowing::BorrowingService::new(repository.clone()),
            repository,
        }
    }
}
