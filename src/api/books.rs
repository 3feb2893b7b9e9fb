//! Book catalog endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{Book, BookQuery, CreateBook, UpdateBook},
    AppState,
};

use super::{
    extract::{JsonBody, PathParams, QueryParams},
    positive_id,
};

/// Page of books
#[derive(Serialize, ToSchema)]
pub struct BookListResponse {
    /// Total number of matching books
    pub count: i64,
    pub books: Vec<Book>,
}

#[derive(Serialize, ToSchema)]
pub struct BookResponse {
    pub book: Book,
}

#[derive(Serialize, ToSchema)]
pub struct BookUpdatedResponse {
    pub message: String,
    pub book: Book,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// List books
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(BookQuery),
    responses(
        (status = 200, description = "Page of books", body = BookListResponse),
        (status = 400, description = "Invalid query", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<BookQuery>,
) -> AppResult<Json<BookListResponse>> {
    let (books, count) = state.services.books.list_books(&query).await?;
    Ok(Json(BookListResponse { count, books }))
}

/// Get a book by id
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book details", body = BookResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    PathParams(id): PathParams<i32>,
) -> AppResult<Json<BookResponse>> {
    let book = state.services.books.get_book(positive_id(id, "id")?).await?;
    Ok(Json(BookResponse { book }))
}

/// Add a book to the catalog
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book added", body = BookResponse),
        (status = 400, description = "Invalid book", body = crate::error::ErrorResponse),
        (status = 409, description = "ISBN already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    JsonBody(book): JsonBody<CreateBook>,
) -> AppResult<(StatusCode, Json<BookResponse>)> {
    let book = state.services.books.add_book(book).await?;
    Ok((StatusCode::CREATED, Json(BookResponse { book })))
}

/// Update a book, including an inventory correction of its counters
#[utoipa::path(
    patch,
    path = "/books/{id}",
    tag = "books",
    params(("id" = i32, Path, description = "Book ID")),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = BookUpdatedResponse),
        (status = 400, description = "Invalid update", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "ISBN already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    PathParams(id): PathParams<i32>,
    JsonBody(update): JsonBody<UpdateBook>,
) -> AppResult<Json<BookUpdatedResponse>> {
    let book = state
        .services
        .books
        .update_book(positive_id(id, "id")?, update)
        .await?;

    Ok(Json(BookUpdatedResponse {
        message: "Book updated successfully".to_string(),
        book,
    }))
}

/// Delete a book and its borrowing history
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book deleted", body = MessageResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    PathParams(id): PathParams<i32>,
) -> AppResult<Json<MessageResponse>> {
    state.services.books.delete_book(positive_id(id, "id")?).await?;
    Ok(Json(MessageResponse {
        message: "Book deleted successfully".to_string(),
    }))
}
