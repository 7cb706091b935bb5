//! Borrow and return endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::{ApiJson, ApiPath, AuthenticatedUser};
use crate::{
    error::AppResult,
    models::borrow_record::{BorrowBook, BorrowRecordDetails, BorrowRecordWithBook},
    AppState,
};

/// Borrow a book
#[utoipa::path(
    post,
    path = "/borrowed-books",
    tag = "borrowing",
    security(("bearer_auth" = [])),
    request_body = BorrowBook,
    responses(
        (status = 201, description = "Book borrowed", body = BorrowRecordDetails),
        (status = 400, description = "Invalid input or book already borrowed", body = crate::error::ErrorResponse),
        (status = 404, description = "Book or user not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow_book(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    ApiJson(request): ApiJson<BorrowBook>,
) -> AppResult<(StatusCode, Json<BorrowRecordDetails>)> {
    let record = state.services.borrowing.borrow(request).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Return a borrowed book
#[utoipa::path(
    patch,
    path = "/borrowed-books/{id}/return",
    tag = "borrowing",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Borrow record ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = BorrowRecordDetails),
        (status = 400, description = "Already returned", body = crate::error::ErrorResponse),
        (status = 404, description = "Borrow record not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<BorrowRecordDetails>> {
    let record = state.services.borrowing.return_book(id).await?;
    Ok(Json(record))
}

/// List every borrow record
#[utoipa::path(
    get,
    path = "/borrowed-books",
    tag = "borrowing",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All records, newest first", body = Vec<BorrowRecordDetails>),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_borrowed_books(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BorrowRecordDetails>>> {
    let records = state.services.borrowing.list_all().await?;
    Ok(Json(records))
}

/// List the borrow records of one user
#[utoipa::path(
    get,
    path = "/borrowed-books/user/{userId}",
    tag = "borrowing",
    security(("bearer_auth" = [])),
    params(
        ("userId" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Records of the user, newest first", body = Vec<BorrowRecordWithBook>)
    )
)]
pub async fn list_user_borrowed_books(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    ApiPath(user_id): ApiPath<Uuid>,
) -> AppResult<Json<Vec<BorrowRecordWithBook>>> {
    let records = state.services.borrowing.list_by_user(user_id).await?;
    Ok(Json(records))
}
