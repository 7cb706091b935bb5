//! Author model and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::book::Book;

/// Full author model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: Uuid,
    pub name: String,
    pub bio: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Author with every book attached
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthorWithBooks {
    #[serde(flatten)]
    pub author: Author,
    pub books: Vec<Book>,
}

/// Create author request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuthor {
    #[validate(length(min = 1, message = "Name must not be empty"))]
    pub name: String,
    pub bio: Option<String>,
    /// ISO-8601 date, e.g. `1965-07-31`
    pub birth_date: Option<String>,
}

/// Update author request; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAuthor {
    #[validate(length(min = 1, message = "Name must not be empty"))]
    pub name: Option<String>,
    pub bio: Option<String>,
    pub birth_date: Option<String>,
}

/// Validated author fields handed to the repository
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuthor {
    pub name: String,
    pub bio: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

/// Validated partial update handed to the repository
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthorChanges {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

impl Author {
    /// Merge provided fields, bumping `updated_at`
    pub fn apply(&mut self, changes: &AuthorChanges, now: DateTime<Utc>) {
        if let Some(ref name) = changes.name {
            self.name = name.clone();
        }
        if let Some(ref bio) = changes.bio {
            self.bio = Some(bio.clone());
        }
        if let Some(birth_date) = changes.birth_date {
            self.birth_date = Some(birth_date);
        }
        self.updated_at = now;
    }
}
