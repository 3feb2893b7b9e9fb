//! Book model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::{SortOrder, ISBN_REGEX};

pub const DEFAULT_PAGE_LIMIT: i64 = 5;

/// Book model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub isbn: String,
    /// Physical copies owned by the library
    pub total_count: i32,
    /// Copies currently not on loan
    pub available_count: i32,
    pub shelf_location: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 255, message = "author must be 1-255 characters"))]
    pub author: String,
    #[validate(regex(path = *ISBN_REGEX, message = "isbn is not valid"))]
    pub isbn: String,
    #[validate(range(min = 1, message = "totalCount must be at least 1"))]
    pub total_count: i32,
    #[validate(length(min = 1, max = 255, message = "shelfLocation must be 1-255 characters"))]
    pub shelf_location: String,
}

/// Partial book update; absent fields are left unchanged.
///
/// `total_count` and `available_count` can be reset here directly, which is
/// the inventory-correction path outside of borrow/return.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255, message = "author must be 1-255 characters"))]
    pub author: Option<String>,
    #[validate(regex(path = *ISBN_REGEX, message = "isbn is not valid"))]
    pub isbn: Option<String>,
    #[validate(range(min = 1, message = "totalCount must be at least 1"))]
    pub total_count: Option<i32>,
    #[validate(range(min = 0, message = "availableCount cannot be negative"))]
    pub available_count: Option<i32>,
    #[validate(length(min = 1, max = 255, message = "shelfLocation must be 1-255 characters"))]
    pub shelf_location: Option<String>,
}

impl UpdateBook {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.isbn.is_none()
            && self.total_count.is_none()
            && self.available_count.is_none()
            && self.shelf_location.is_none()
    }

    pub fn touches_counters(&self) -> bool {
        self.total_count.is_some() || self.available_count.is_some()
    }

    /// Apply this update to a copy of `book`
    pub fn apply_to(&self, book: &Book) -> Book {
        let mut updated = book.clone();
        if let Some(ref title) = self.title {
            updated.title = title.clone();
        }
        if let Some(ref author) = self.author {
            updated.author = author.clone();
        }
        if let Some(ref isbn) = self.isbn {
            updated.isbn = isbn.clone();
        }
        if let Some(total) = self.total_count {
            updated.total_count = total;
        }
        if let Some(available) = self.available_count {
            updated.available_count = available;
        }
        if let Some(ref location) = self.shelf_location {
            updated.shelf_location = location.clone();
        }
        updated
    }
}

/// Sortable book columns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BookSortField {
    #[default]
    Title,
    Author,
    Isbn,
}

impl BookSortField {
    pub fn as_column(&self) -> &'static str {
        match self {
            BookSortField::Title => "title",
            BookSortField::Author => "author",
            BookSortField::Isbn => "isbn",
        }
    }
}

/// Book list query parameters
#[derive(Debug, Clone, Default, Deserialize, Validate, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    #[validate(range(min = 5, max = 10, message = "limit must be between 5 and 10"))]
    pub limit: Option<i64>,
    #[validate(range(min = 0, message = "offset cannot be negative"))]
    pub offset: Option<i64>,
    pub sort_by: Option<BookSortField>,
    pub sort_order: Option<SortOrder>,
    /// Matches title, author or isbn (case-insensitive)
    pub search_term: Option<String>,
}

impl BookQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0)
    }

    pub fn sort_by(&self) -> BookSortField {
        self.sort_by.unwrap_or_default()
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order.unwrap_or_default()
    }

    /// Search term, ignoring blank input
    pub fn search_term(&self) -> Option<&str> {
        self.search_term
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
