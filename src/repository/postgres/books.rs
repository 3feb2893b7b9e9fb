//! Books queries

use async_trait::async_trait;
use chrono::Utc;

use super::{like_pattern, map_constraint_error, PgStore};
use crate::{
    error::{AppError, AppResult},
    models::{book::BookSortField, Book, BookQuery, CreateBook, UpdateBook},
    repository::BookRepository,
};

const DUPLICATE_ISBN: &str = "A book with this isbn already exists";

fn order_expression(field: BookSortField) -> String {
    match field {
        BookSortField::Isbn => field.as_column().to_string(),
        _ => format!("LOWER({})", field.as_column()),
    }
}

#[async_trait]
impl BookRepository for PgStore {
    async fn book_by_id(&self, id: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(book)
    }

    async fn list_books(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let pattern = query.search_term().map(like_pattern);
        let where_clause =
            "$1::text IS NULL OR title ILIKE $1 OR author ILIKE $1 OR isbn ILIKE $1";

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM books WHERE {}", where_clause))
                .bind(pattern.as_deref())
                .fetch_one(&self.pool)
                .await?;

        let select_query = format!(
            r#"
            SELECT * FROM books
            WHERE {}
            ORDER BY {} {}, id ASC
            LIMIT $2 OFFSET $3
            "#,
            where_clause,
            order_expression(query.sort_by()),
            query.sort_order().as_sql()
        );

        let books = sqlx::query_as::<_, Book>(&select_query)
            .bind(pattern.as_deref())
            .bind(query.limit())
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((books, total))
    }

    async fn create_book(&self, book: &CreateBook) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, isbn, total_count, available_count, shelf_location)
            VALUES ($1, $2, $3, $4, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(book.total_count)
        .bind(&book.shelf_location)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_constraint_error(e, DUPLICATE_ISBN))
    }

    async fn update_book(&self, id: i32, update: &UpdateBook) -> AppResult<Book> {
        let now = Utc::now();
        let mut sets = vec!["updated_at = $1".to_string()];
        let mut idx = 2;

        macro_rules! add_field {
            ($field:expr, $name:expr) => {
                if $field.is_some() {
                    sets.push(format!("{} = ${}", $name, idx));
                    idx += 1;
                }
            };
        }

        add_field!(update.title, "title");
        add_field!(update.author, "author");
        add_field!(update.isbn, "isbn");
        add_field!(update.total_count, "total_count");
        add_field!(update.available_count, "available_count");
        add_field!(update.shelf_location, "shelf_location");

        let query = format!(
            "UPDATE books SET {} WHERE id = ${} RETURNING *",
            sets.join(", "),
            idx
        );

        let mut builder = sqlx::query_as::<_, Book>(&query).bind(now);

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(update.title);
        bind_field!(update.author);
        bind_field!(update.isbn);
        bind_field!(update.total_count);
        bind_field!(update.available_count);
        bind_field!(update.shelf_location);

        builder
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_constraint_error(e, DUPLICATE_ISBN))?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
    }

    async fn delete_book(&self, id: i32) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn isbn_exists(&self, isbn: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1 AND ($2::int IS NULL OR id <> $2))",
        )
        .bind(isbn)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}
