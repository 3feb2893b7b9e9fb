//! Borrower registration, login and management endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{Borrower, BorrowerQuery, LoginRequest, RegisterBorrower, UpdateBorrower},
    AppState,
};

use super::{
    books::MessageResponse,
    extract::{JsonBody, PathParams, QueryParams},
    positive_id, AuthenticatedBorrower,
};

#[derive(Serialize, ToSchema)]
pub struct BorrowerListResponse {
    pub message: String,
    /// Total number of matching borrowers
    pub count: i64,
    pub borrowers: Vec<Borrower>,
}

/// Token and profile returned on registration and login
#[derive(Serialize, ToSchema)]
pub struct TokenResponse {
    pub message: String,
    pub token: String,
    pub borrower: Borrower,
}

#[derive(Serialize, ToSchema)]
pub struct BorrowerResponse {
    pub message: String,
    pub borrower: Borrower,
}

/// List borrowers
#[utoipa::path(
    get,
    path = "/borrowers",
    tag = "borrowers",
    params(BorrowerQuery),
    responses(
        (status = 200, description = "Page of borrowers", body = BorrowerListResponse),
        (status = 400, description = "Invalid query", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_borrowers(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<BorrowerQuery>,
) -> AppResult<Json<BorrowerListResponse>> {
    let (borrowers, count) = state.services.borrowers.list_borrowers(&query).await?;
    Ok(Json(BorrowerListResponse {
        message: "Success".to_string(),
        count,
        borrowers,
    }))
}

/// Register a new borrower
#[utoipa::path(
    post,
    path = "/borrowers/register",
    tag = "borrowers",
    request_body = RegisterBorrower,
    responses(
        (status = 201, description = "Borrower registered", body = TokenResponse),
        (status = 400, description = "Invalid registration", body = crate::error::ErrorResponse),
        (status = 409, description = "Borrower already exists", body = crate::error::ErrorResponse),
        (status = 429, description = "Too many requests", body = crate::error::ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RegisterBorrower>,
) -> AppResult<(StatusCode, Json<TokenResponse>)> {
    let (token, borrower) = state.services.borrowers.register(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            message: "Borrower registered successfully".to_string(),
            token,
            borrower,
        }),
    ))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/borrowers/login",
    tag = "borrowers",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse),
        (status = 429, description = "Too many requests", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let (token, borrower) = state.services.borrowers.login(request).await?;

    Ok(Json(TokenResponse {
        message: "Borrower logged-in successfully".to_string(),
        token,
        borrower,
    }))
}

/// Update the authenticated borrower's name or email
#[utoipa::path(
    patch,
    path = "/borrowers/{id}",
    tag = "borrowers",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrower ID")),
    request_body = UpdateBorrower,
    responses(
        (status = 200, description = "Borrower updated", body = BorrowerResponse),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorResponse),
        (status = 403, description = "Token belongs to another borrower", body = crate::error::ErrorResponse),
        (status = 404, description = "Borrower not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already in use", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_borrower(
    State(state): State<AppState>,
    AuthenticatedBorrower(claims): AuthenticatedBorrower,
    PathParams(id): PathParams<i32>,
    JsonBody(update): JsonBody<UpdateBorrower>,
) -> AppResult<Json<BorrowerResponse>> {
    let id = positive_id(id, "id")?;
    claims.require_self(id)?;

    let borrower = state.services.borrowers.update_borrower(id, update).await?;
    Ok(Json(BorrowerResponse {
        message: "Borrower updated successfully".to_string(),
        borrower,
    }))
}

/// Delete the authenticated borrower and their borrowing history
#[utoipa::path(
    delete,
    path = "/borrowers/{id}",
    tag = "borrowers",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrower ID")),
    responses(
        (status = 200, description = "Borrower deleted", body = MessageResponse),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorResponse),
        (status = 403, description = "Token belongs to another borrower", body = crate::error::ErrorResponse),
        (status = 404, description = "Borrower not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_borrower(
    State(state): State<AppState>,
    AuthenticatedBorrower(claims): AuthenticatedBorrower,
    PathParams(id): PathParams<i32>,
) -> AppResult<Json<MessageResponse>> {
    let id = positive_id(id, "id")?;
    claims.require_self(id)?;

    state.services.borrowers.delete_borrower(id).await?;
    Ok(Json(MessageResponse {
        message: "Borrower deleted successfully".to_string(),
    }))
}
