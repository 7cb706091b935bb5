//! Book catalog endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::{ApiJson, ApiPath, ApiQuery, AuthenticatedUser};
use crate::{
    error::AppResult,
    models::book::{
        Book, BookDetails, BookListEntry, BookQuery, BookWithAuthor, CreateBook, UpdateBook,
    },
    AppState,
};

/// List books, optionally filtered
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(
        ("authorId" = Option<Uuid>, Query, description = "Only books by this author"),
        ("borrowed" = Option<bool>, Query, description = "Only borrowed (true) or available (false) books"),
        ("search" = Option<String>, Query, description = "Case-insensitive match on title or description")
    ),
    responses(
        (status = 200, description = "Matching books, newest first", body = Vec<BookListEntry>)
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<BookQuery>,
) -> AppResult<Json<Vec<BookListEntry>>> {
    let books = state.services.catalog.list(&query).await?;
    Ok(Json(books))
}

/// Get a book with its author and borrow history
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = BookDetails),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<BookDetails>> {
    let book = state.services.catalog.get(id).await?;
    Ok(Json(book))
}

/// Create a book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = BookWithAuthor),
        (status = 400, description = "Invalid input or unknown author", body = crate::error::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    ApiJson(request): ApiJson<CreateBook>,
) -> AppResult<(StatusCode, Json<BookWithAuthor>)> {
    let book = state.services.catalog.create(request).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Update a book
#[utoipa::path(
    patch,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = BookWithAuthor),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateBook>,
) -> AppResult<Json<BookWithAuthor>> {
    let book = state.services.catalog.update(id, request).await?;
    Ok(Json(book))
}

/// Delete a book and its borrow history
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book deleted", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.delete(id).await?;
    Ok(Json(book))
}
