//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, borrowers, borrowing, health, reports};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Library API",
        version = "1.0.0",
        description = "Books, borrowers and borrowing processes"
    ),
    servers(
        (url = "/api", description = "API")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Borrowers
        borrowers::list_borrowers,
        borrowers::register,
        borrowers::login,
        borrowers::update_borrower,
        borrowers::delete_borrower,
        // Borrowing
        borrowing::borrow_book,
        borrowing::return_book,
        borrowing::active_borrows,
        // Reports
        reports::list_overdue,
        reports::list_last_month_borrows,
    ),
    components(
        schemas(
            // Books
            crate::models::Book,
            crate::models::CreateBook,
            crate::models::UpdateBook,
            crate::models::book::BookSortField,
            crate::models::SortOrder,
            books::BookListResponse,
            books::BookResponse,
            books::BookUpdatedResponse,
            books::MessageResponse,
            // Borrowers
            crate::models::Borrower,
            crate::models::RegisterBorrower,
            crate::models::LoginRequest,
            crate::models::UpdateBorrower,
            crate::models::borrower::BorrowerSortField,
            borrowers::BorrowerListResponse,
            borrowers::TokenResponse,
            borrowers::BorrowerResponse,
            // Borrowing
            crate::models::BorrowRequest,
            crate::models::ActiveLoan,
            borrowing::BorrowResponse,
            borrowing::ReturnResponse,
            borrowing::ActiveBorrowsResponse,
            // Reports
            crate::models::OverdueLoan,
            crate::models::LoanActivity,
            crate::models::borrowing::BorrowerSummary,
            crate::models::borrowing::BookSummary,
            crate::models::borrowing::BorrowerContact,
            crate::models::borrowing::BookInfo,
            reports::OverdueReport,
            reports::ActivityReport,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Book catalog"),
        (name = "borrowers", description = "Borrower registration and management"),
        (name = "borrowing", description = "Borrowing and returning books"),
        (name = "reports", description = "Overdue and monthly borrowing reports")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_borrowing_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/borrowers/{id}/books/{bookId}/borrow"));
        assert!(doc.paths.paths.contains_key("/borrowing-processes/overdue"));
    }
}
