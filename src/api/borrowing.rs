//! Borrow and return endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{ActiveLoan, BorrowRequest},
    AppState,
};

use super::{
    extract::{JsonBody, PathParams},
    positive_id, AuthenticatedBorrower,
};

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowResponse {
    pub message: String,
    /// Borrowing process ID
    pub id: i32,
    pub borrower_id: i32,
    pub book_id: i32,
    pub return_date: NaiveDate,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReturnResponse {
    pub message: String,
    pub id: i32,
    pub borrower_id: i32,
    pub book_id: i32,
    pub confirmed_return_date: Option<NaiveDate>,
}

#[derive(Serialize, ToSchema)]
pub struct ActiveBorrowsResponse {
    pub message: String,
    pub count: usize,
    pub books: Vec<ActiveLoan>,
}

fn loan_path(ids: (i32, i32)) -> AppResult<(i32, i32)> {
    Ok((positive_id(ids.0, "id")?, positive_id(ids.1, "bookId")?))
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/borrowers/{id}/books/{bookId}/borrow",
    tag = "borrowing",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrower ID"),
        ("bookId" = i32, Path, description = "Book ID")
    ),
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Book borrowed", body = BorrowResponse),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorResponse),
        (status = 403, description = "Token belongs to another borrower", body = crate::error::ErrorResponse),
        (status = 404, description = "Borrower or book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Already borrowed or no copy available", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow_book(
    State(state): State<AppState>,
    AuthenticatedBorrower(claims): AuthenticatedBorrower,
    PathParams(ids): PathParams<(i32, i32)>,
    JsonBody(request): JsonBody<BorrowRequest>,
) -> AppResult<(StatusCode, Json<BorrowResponse>)> {
    let (borrower_id, book_id) = loan_path(ids)?;
    claims.require_self(borrower_id)?;

    let loan = state
        .services
        .borrowing
        .borrow(borrower_id, book_id, request.return_date)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(BorrowResponse {
            message: "the borrowing process is done successfully".to_string(),
            id: loan.id,
            borrower_id,
            book_id,
            return_date: loan.return_date,
        }),
    ))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/borrowers/{id}/books/{bookId}/return",
    tag = "borrowing",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrower ID"),
        ("bookId" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = ReturnResponse),
        (status = 400, description = "No active borrowing for this book", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorResponse),
        (status = 403, description = "Token belongs to another borrower", body = crate::error::ErrorResponse),
        (status = 404, description = "Borrower or book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AuthenticatedBorrower(claims): AuthenticatedBorrower,
    PathParams(ids): PathParams<(i32, i32)>,
) -> AppResult<Json<ReturnResponse>> {
    let (borrower_id, book_id) = loan_path(ids)?;
    claims.require_self(borrower_id)?;

    let loan = state
        .services
        .borrowing
        .return_book(borrower_id, book_id)
        .await?;

    Ok(Json(ReturnResponse {
        message: "returning the book is done successfully".to_string(),
        id: loan.id,
        borrower_id,
        book_id,
        confirmed_return_date: loan.confirmed_return_date,
    }))
}

/// Books currently borrowed by a borrower
#[utoipa::path(
    get,
    path = "/borrowers/{id}/active-borrows",
    tag = "borrowing",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrower ID")),
    responses(
        (status = 200, description = "Open loans, most recent first", body = ActiveBorrowsResponse),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorResponse),
        (status = 403, description = "Token belongs to another borrower", body = crate::error::ErrorResponse),
        (status = 404, description = "Borrower not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn active_borrows(
    State(state): State<AppState>,
    AuthenticatedBorrower(claims): AuthenticatedBorrower,
    PathParams(id): PathParams<i32>,
) -> AppResult<Json<ActiveBorrowsResponse>> {
    let id = positive_id(id, "id")?;
    claims.require_self(id)?;

    let books = state.services.borrowing.list_active_loans(id).await?;
    Ok(Json(ActiveBorrowsResponse {
        message: "success".to_string(),
        count: books.len(),
        books,
    }))
}
