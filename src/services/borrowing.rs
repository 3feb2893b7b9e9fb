//! Borrowing state machine
//!
//! A (borrower, book) pair is either without an open loan or with exactly
//! one. Borrow opens a loan and takes a copy off the shelf, return closes it
//! and puts the copy back. Both run inside a single unit of work: the
//! preconditions are checked against the locked book row and the effect is
//! committed as a whole or not at all.

use std::sync::Arc;

use chrono::NaiveDate;

use super::clock::Clock;
use crate::{
    error::{AppError, AppResult},
    models::{ActiveLoan, Book, BorrowingProcess, NewBorrowing},
    repository::{BorrowerRepository, BorrowingRepository, UnitOfWork},
};

#[derive(Clone)]
pub struct BorrowingService {
    repository: Arc<dyn BorrowingRepository>,
    borrowers: Arc<dyn BorrowerRepository>,
    clock: Arc<dyn Clock>,
}

impl BorrowingService {
    pub fn new(
        repository: Arc<dyn BorrowingRepository>,
        borrowers: Arc<dyn BorrowerRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            borrowers,
            clock,
        }
    }

    /// Lend one copy of a book to a borrower until `return_date`
    pub async fn borrow(
        &self,
        borrower_id: i32,
        book_id: i32,
        return_date: NaiveDate,
    ) -> AppResult<BorrowingProcess> {
        let mut uow = self.repository.begin().await?;

        if let Err(e) = check_borrow(uow.as_mut(), borrower_id, book_id).await {
            tracing::debug!(borrower_id, book_id, error = %e, "Borrow rejected");
            rollback(uow).await;
            return Err(e);
        }

        let new_loan = NewBorrowing {
            borrower_id,
            book_id,
            return_date,
            created_at: self.clock.now(),
        };

        let loan = match apply_borrow(uow.as_mut(), &new_loan).await {
            Ok(loan) => loan,
            Err(e) => {
                tracing::warn!(borrower_id, book_id, error = %e, "Borrow failed, rolling back");
                rollback(uow).await;
                return Err(AppError::Internal(format!("Borrowing failed: {}", e)));
            }
        };

        uow.commit()
            .await
            .map_err(|e| AppError::Internal(format!("Borrowing failed: {}", e)))?;

        tracing::info!(
            loan_id = loan.id,
            borrower_id,
            book_id,
            return_date = %loan.return_date,
            "Book borrowed"
        );
        Ok(loan)
    }

    /// Close the open loan of a book and put the copy back on the shelf
    pub async fn return_book(&self, borrower_id: i32, book_id: i32) -> AppResult<BorrowingProcess> {
        let mut uow = self.repository.begin().await?;

        let (book, open_loan) = match check_return(uow.as_mut(), borrower_id, book_id).await {
            Ok(found) => found,
            Err(e) => {
                tracing::debug!(borrower_id, book_id, error = %e, "Return rejected");
                rollback(uow).await;
                return Err(e);
            }
        };

        if book.available_count >= book.total_count {
            tracing::warn!(
                book_id,
                total_count = book.total_count,
                "All copies already on the shelf, available count left unchanged"
            );
        }

        let now = self.clock.now();
        let closed = match apply_return(uow.as_mut(), &open_loan, now.date_naive(), now).await {
            Ok(loan) => loan,
            Err(e) => {
                tracing::warn!(borrower_id, book_id, error = %e, "Return failed, rolling back");
                rollback(uow).await;
                return Err(AppError::Internal(format!("Book return failed: {}", e)));
            }
        };

        uow.commit()
            .await
            .map_err(|e| AppError::Internal(format!("Book return failed: {}", e)))?;

        tracing::info!(loan_id = closed.id, borrower_id, book_id, "Book returned");
        Ok(closed)
    }

    /// Open loans of a borrower, most recent first
    pub async fn list_active_loans(&self, borrower_id: i32) -> AppResult<Vec<ActiveLoan>> {
        if self.borrowers.borrower_by_id(borrower_id).await?.is_none() {
            return Err(AppError::NotFound("Borrower not found".to_string()));
        }
        self.repository.active_loans(borrower_id).await
    }
}

async fn rollback(uow: Box<dyn UnitOfWork>) {
    if let Err(e) = uow.rollback().await {
        tracing::error!(error = %e, "Rollback failed");
    }
}

/// Preconditions of a borrow, first failure wins
async fn check_borrow(
    uow: &mut dyn UnitOfWork,
    borrower_id: i32,
    book_id: i32,
) -> AppResult<Book> {
    uow.find_borrower(borrower_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Borrower not found".to_string()))?;

    let book = uow
        .lock_book(book_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

    if uow.find_open_loan(borrower_id, book_id).await?.is_some() {
        return Err(AppError::Conflict(
            "Borrower has already borrowed this book".to_string(),
        ));
    }

    if book.available_count <= 0 {
        return Err(AppError::Conflict("No copies of the book are available".to_string()));
    }

    Ok(book)
}

async fn apply_borrow(
    uow: &mut dyn UnitOfWork,
    loan: &NewBorrowing,
) -> AppResult<BorrowingProcess> {
    uow.decrement_available(loan.book_id).await?;
    uow.insert_loan(loan).await
}

async fn check_return(
    uow: &mut dyn UnitOfWork,
    borrower_id: i32,
    book_id: i32,
) -> AppResult<(Book, BorrowingProcess)> {
    uow.find_borrower(borrower_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Borrower not found".to_string()))?;

    let book = uow
        .lock_book(book_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

    let loan = uow
        .find_open_loan(borrower_id, book_id)
        .await?
        .ok_or_else(|| {
            AppError::InvalidState("No active borrowing found for this book".to_string())
        })?;

    Ok((book, loan))
}

async fn apply_return(
    uow: &mut dyn UnitOfWork,
    loan: &BorrowingProcess,
    returned_on: NaiveDate,
    at: chrono::DateTime<chrono::Utc>,
) -> AppResult<BorrowingProcess> {
    uow.increment_available(loan.book_id).await?;
    uow.close_loan(loan.id, returned_on, at).await
}
