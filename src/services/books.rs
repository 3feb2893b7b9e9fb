//! Catalog service

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{Book, BookQuery, CreateBook, UpdateBook},
    repository::BookRepository,
};

#[derive(Clone)]
pub struct BooksService {
    repository: Arc<dyn BookRepository>,
}

impl BooksService {
    pub fn new(repository: Arc<dyn BookRepository>) -> Self {
        Self { repository }
    }

    pub async fn list_books(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        query.validate()?;
        self.repository.list_books(query).await
    }

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository
            .book_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
    }

    pub async fn add_book(&self, book: CreateBook) -> AppResult<Book> {
        book.validate()?;

        if self.repository.isbn_exists(&book.isbn, None).await? {
            return Err(AppError::Conflict("A book with this isbn already exists".to_string()));
        }

        let created = self.repository.create_book(&book).await?;
        tracing::info!(book_id = created.id, isbn = %created.isbn, "Book added");
        Ok(created)
    }

    /// Partial update. Counter changes must keep
    /// `0 <= available_count <= total_count` and are logged with both values.
    pub async fn update_book(&self, id: i32, update: UpdateBook) -> AppResult<Book> {
        update.validate()?;
        if update.is_empty() {
            return Err(AppError::BadRequest("No fields to update".to_string()));
        }

        let current = self.get_book(id).await?;

        if let Some(ref isbn) = update.isbn {
            if self.repository.isbn_exists(isbn, Some(id)).await? {
                return Err(AppError::Conflict(
                    "A book with this isbn already exists".to_string(),
                ));
            }
        }

        if update.touches_counters() {
            let target = update.apply_to(&current);
            if target.available_count < 0 || target.available_count > target.total_count {
                return Err(AppError::Validation(format!(
                    "availableCount ({}) must be between 0 and totalCount ({})",
                    target.available_count, target.total_count
                )));
            }
        }

        let updated = self.repository.update_book(id, &update).await?;

        if update.touches_counters() {
            tracing::info!(
                book_id = id,
                old_total = current.total_count,
                new_total = updated.total_count,
                old_available = current.available_count,
                new_available = updated.available_count,
                "Book counters changed by administrative update"
            );
        }

        Ok(updated)
    }

    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        if !self.repository.delete_book(id).await? {
            return Err(AppError::NotFound("Book not found".to_string()));
        }
        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryStore;

    fn service() -> BooksService {
        BooksService::new(Arc::new(MemoryStore::new()))
    }

    fn dune() -> CreateBook {
        CreateBook {
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            isbn: "978-044-11729-271-3".to_string(),
            total_count: 3,
            shelf_location: "A-12".to_string(),
        }
    }

    #[tokio::test]
    async fn test_add_book_sets_available_to_total() {
        let service = service();
        let book = service.add_book(dune()).await.unwrap();
        assert_eq!(book.available_count, 3);

        let err = service.add_book(dune()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_counters_within_bounds() {
        let service = service();
        let book = service.add_book(dune()).await.unwrap();

        let err = service
            .update_book(
                book.id,
                UpdateBook {
                    total_count: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let updated = service
            .update_book(
                book.id,
                UpdateBook {
                    total_count: Some(1),
                    available_count: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!((updated.total_count, updated.available_count), (1, 1));
    }

    #[tokio::test]
    async fn test_missing_book() {
        let service = service();
        assert!(matches!(service.get_book(42).await, Err(AppError::NotFound(_))));
        assert!(matches!(service.delete_book(42).await, Err(AppError::NotFound(_))));
        let err = service
            .update_book(
                42,
                UpdateBook {
                    title: Some("X".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_rejects_out_of_range_limit() {
        let query = BookQuery {
            limit: Some(11),
            ..Default::default()
        };
        assert!(matches!(service().list_books(&query).await, Err(AppError::Validation(_))));
    }
}
