//! Borrowers queries

use async_trait::async_trait;
use chrono::Utc;

use super::{like_pattern, map_constraint_error, PgStore};
use crate::{
    error::{AppError, AppResult},
    models::{
        borrower::BorrowerSortField, Borrower, BorrowerQuery, NewBorrower, UpdateBorrower,
    },
    repository::BorrowerRepository,
};

fn order_expression(field: BorrowerSortField) -> String {
    match field {
        BorrowerSortField::Name => format!("LOWER({})", field.as_column()),
        _ => field.as_column().to_string(),
    }
}

#[async_trait]
impl BorrowerRepository for PgStore {
    async fn borrower_by_id(&self, id: i32) -> AppResult<Option<Borrower>> {
        let borrower = sqlx::query_as::<_, Borrower>("SELECT * FROM borrowers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(borrower)
    }

    async fn borrower_by_email(&self, email: &str) -> AppResult<Option<Borrower>> {
        let borrower = sqlx::query_as::<_, Borrower>("SELECT * FROM borrowers WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(borrower)
    }

    async fn email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM borrowers WHERE email = $1 AND ($2::int IS NULL OR id <> $2))",
        )
        .bind(email)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn list_borrowers(&self, query: &BorrowerQuery) -> AppResult<(Vec<Borrower>, i64)> {
        let pattern = query.search_term().map(like_pattern);
        let where_clause = "$1::text IS NULL OR name ILIKE $1 OR email ILIKE $1";

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM borrowers WHERE {}", where_clause))
                .bind(pattern.as_deref())
                .fetch_one(&self.pool)
                .await?;

        let select_query = format!(
            "SELECT * FROM borrowers WHERE {} ORDER BY {} {}, id ASC LIMIT $2 OFFSET $3",
            where_clause,
            order_expression(query.sort_by()),
            query.sort_order().as_sql()
        );

        let borrowers = sqlx::query_as::<_, Borrower>(&select_query)
            .bind(pattern.as_deref())
            .bind(query.limit())
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((borrowers, total))
    }

    async fn create_borrower(&self, borrower: &NewBorrower) -> AppResult<Borrower> {
        sqlx::query_as::<_, Borrower>(
            r#"
            INSERT INTO borrowers (name, email, password)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&borrower.name)
        .bind(&borrower.email)
        .bind(&borrower.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_constraint_error(e, "Borrower already exists"))
    }

    async fn update_borrower(&self, id: i32, update: &UpdateBorrower) -> AppResult<Borrower> {
        sqlx::query_as::<_, Borrower>(
            r#"
            UPDATE borrowers
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.email)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_constraint_error(e, "Email already in use"))?
        .ok_or_else(|| AppError::NotFound("Borrower not found".to_string()))
    }

    async fn delete_borrower(&self, id: i32) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM borrowers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
