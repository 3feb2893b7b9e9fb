//! API handlers for the library REST endpoints

pub mod books;
pub mod borrowers;
pub mod borrowing;
pub mod extract;
pub mod health;
pub mod openapi;
pub mod reports;

use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::{self, Next},
    response::Response,
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    error::{AppError, AppResult},
    models::BorrowerClaims,
    AppState,
};

/// Extractor for the borrower authenticated by a bearer token
pub struct AuthenticatedBorrower(pub BorrowerClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedBorrower {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("No token provided".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| {
                AppError::Authentication("Invalid authorization header format".to_string())
            })?;

        let claims = state.services.borrowers.verify_token(token)?;

        Ok(AuthenticatedBorrower(claims))
    }
}

/// Reject non-positive ids before they reach a service
pub(crate) fn positive_id(id: i32, what: &str) -> AppResult<i32> {
    if id > 0 {
        Ok(id)
    } else {
        Err(AppError::Validation(format!("{} must be a positive integer", what)))
    }
}

/// Throttle requests per client address
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    state
        .services
        .rate_limiter
        .check(&format!("auth:{}", client))
        .await?;

    Ok(next.run(request).await)
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let throttled = Router::new()
        .route("/borrowers/register", post(borrowers::register))
        .route("/borrowers/login", post(borrowers::login))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    let api = Router::new()
        // Health
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route(
            "/books/:id",
            get(books::get_book)
                .patch(books::update_book)
                .delete(books::delete_book),
        )
        // Borrowers
        .route("/borrowers", get(borrowers::list_borrowers))
        .route(
            "/borrowers/:id",
            patch(borrowers::update_borrower).delete(borrowers::delete_borrower),
        )
        // Borrowing
        .route("/borrowers/:id/active-borrows", get(borrowing::active_borrows))
        .route("/borrowers/:id/books/:book_id/borrow", post(borrowing::borrow_book))
        .route("/borrowers/:id/books/:book_id/return", post(borrowing::return_book))
        // Reports
        .route("/borrowing-processes/overdue", get(reports::list_overdue))
        .route(
            "/borrowing-processes/last-month-borrows",
            get(reports::list_last_month_borrows),
        )
        .merge(throttled)
        .with_state(state);

    Router::new()
        .nest("/api", api)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}
