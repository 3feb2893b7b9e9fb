//! PostgreSQL store

mod books;
mod borrowers;
mod borrowings;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use super::Ping;
use crate::{
    config::DatabaseConfig,
    error::{AppError, AppResult},
};

pub use borrowings::PgUnitOfWork;

/// Repositories backed by a PostgreSQL connection pool
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Open a pool using the database section of the configuration
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to run migrations: {}", e)))
    }
}

#[async_trait]
impl Ping for PgStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Translate constraint violations into domain errors.
///
/// `23505` is a unique violation, `23514` a check violation and `23503` a
/// foreign key violation.
pub(crate) fn map_constraint_error(err: sqlx::Error, conflict_message: &str) -> AppError {
    if let sqlx::Error::Database(ref db) = err {
        match db.code().as_deref() {
            Some("23505") => return AppError::Conflict(conflict_message.to_string()),
            Some("23514") => {
                return AppError::Validation(
                    "availableCount must be between 0 and totalCount".to_string(),
                )
            }
            Some("23503") => return AppError::NotFound("Borrower or book not found".to_string()),
            _ => {}
        }
    }
    AppError::Database(err)
}

/// `%term%` for ILIKE, with the pattern metacharacters escaped
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
