//! Borrowing processes: transactional unit of work and report queries

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Postgres, Transaction};

use super::{map_constraint_error, PgStore};
use crate::{
    error::{AppError, AppResult},
    models::{
        borrowing::{LoanActivityRow, OverdueLoanRow},
        ActiveLoan, Book, Borrower, BorrowingProcess, LoanActivity, NewBorrowing, OverdueLoan,
    },
    repository::{BorrowingRepository, UnitOfWork},
};

#[async_trait]
impl BorrowingRepository for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn active_loans(&self, borrower_id: i32) -> AppResult<Vec<ActiveLoan>> {
        let loans = sqlx::query_as::<_, ActiveLoan>(
            r#"
            SELECT bp.id AS loan_id, b.id AS book_id,
                   b.title AS book_title, b.author AS book_author, b.isbn AS book_isbn,
                   bp.return_date, bp.created_at AS borrowed_at
            FROM borrowing_processes bp
            JOIN books b ON b.id = bp.book_id
            WHERE bp.borrower_id = $1 AND bp.confirmed_return_date IS NULL
            ORDER BY bp.created_at DESC, bp.id DESC
            "#,
        )
        .bind(borrower_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    async fn overdue_loans(&self, today: NaiveDate) -> AppResult<Vec<OverdueLoan>> {
        let rows = sqlx::query_as::<_, OverdueLoanRow>(
            r#"
            SELECT bp.id, bp.return_date,
                   br.id AS borrower_id, br.name AS borrower_name, br.email AS borrower_email,
                   b.id AS book_id, b.title AS book_title
            FROM borrowing_processes bp
            JOIN borrowers br ON br.id = bp.borrower_id
            JOIN books b ON b.id = bp.book_id
            WHERE bp.confirmed_return_date IS NULL AND bp.return_date < $1
            ORDER BY bp.return_date ASC, bp.id ASC
            "#,
        )
        .bind(today)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(OverdueLoan::from).collect())
    }

    async fn loans_created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        only_late: bool,
    ) -> AppResult<Vec<LoanActivity>> {
        let rows = sqlx::query_as::<_, LoanActivityRow>(
            r#"
            SELECT bp.id, bp.return_date, bp.confirmed_return_date, bp.created_at,
                   br.name AS borrower_name, br.email AS borrower_email,
                   b.title AS book_title, b.author AS book_author
            FROM borrowing_processes bp
            JOIN borrowers br ON br.id = bp.borrower_id
            JOIN books b ON b.id = bp.book_id
            WHERE bp.created_at >= $1 AND bp.created_at < $2
              AND (NOT $3::boolean
                   OR bp.confirmed_return_date IS NULL
                   OR bp.confirmed_return_date > bp.return_date)
            ORDER BY bp.created_at ASC, bp.id ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .bind(only_late)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(LoanActivity::from).collect())
    }
}

/// Unit of work wrapping a database transaction.
///
/// Dropping it without commit rolls the transaction back.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn find_borrower(&mut self, id: i32) -> AppResult<Option<Borrower>> {
        let borrower = sqlx::query_as::<_, Borrower>("SELECT * FROM borrowers WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(borrower)
    }

    async fn lock_book(&mut self, id: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(book)
    }

    async fn find_open_loan(
        &mut self,
        borrower_id: i32,
        book_id: i32,
    ) -> AppResult<Option<BorrowingProcess>> {
        let loan = sqlx::query_as::<_, BorrowingProcess>(
            r#"
            SELECT * FROM borrowing_processes
            WHERE borrower_id = $1 AND book_id = $2 AND confirmed_return_date IS NULL
            "#,
        )
        .bind(borrower_id)
        .bind(book_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(loan)
    }

    async fn decrement_available(&mut self, book_id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET available_count = available_count - 1, updated_at = NOW()
            WHERE id = $1 AND available_count > 0
            RETURNING *
            "#,
        )
        .bind(book_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::Conflict("No copies of the book are available".to_string()))
    }

    async fn increment_available(&mut self, book_id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET available_count = LEAST(available_count + 1, total_count), updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(book_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
    }

    async fn insert_loan(&mut self, loan: &NewBorrowing) -> AppResult<BorrowingProcess> {
        sqlx::query_as::<_, BorrowingProcess>(
            r#"
            INSERT INTO borrowing_processes (borrower_id, book_id, return_date, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING *
            "#,
        )
        .bind(loan.borrower_id)
        .bind(loan.book_id)
        .bind(loan.return_date)
        .bind(loan.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_constraint_error(e, "Borrower has already borrowed this book"))
    }

    async fn close_loan(
        &mut self,
        loan_id: i32,
        returned_on: NaiveDate,
        at: DateTime<Utc>,
    ) -> AppResult<BorrowingProcess> {
        sqlx::query_as::<_, BorrowingProcess>(
            r#"
            UPDATE borrowing_processes
            SET confirmed_return_date = $2, updated_at = $3
            WHERE id = $1 AND confirmed_return_date IS NULL
            RETURNING *
            "#,
        )
        .bind(loan_id)
        .bind(returned_on)
        .bind(at)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| {
            AppError::InvalidState(format!("Borrowing process {} is not open", loan_id))
        })
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
