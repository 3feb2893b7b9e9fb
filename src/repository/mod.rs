//! Repository layer: persistence contracts and their backends
//!
//! Services depend on the traits below rather than on a concrete database.
//! [`postgres::PgStore`] is the production backend; [`memory::MemoryStore`]
//! keeps everything in process and backs the test suite.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::{
    error::AppResult,
    models::{
        ActiveLoan, Book, BookQuery, Borrower, BorrowerQuery, BorrowingProcess, CreateBook,
        LoanActivity, NewBorrower, NewBorrowing, OverdueLoan, UpdateBook, UpdateBorrower,
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn book_by_id(&self, id: i32) -> AppResult<Option<Book>>;

    /// Page of books plus the total number of matches
    async fn list_books(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)>;

    /// Insert a book with every copy available
    async fn create_book(&self, book: &CreateBook) -> AppResult<Book>;

    async fn update_book(&self, id: i32, update: &UpdateBook) -> AppResult<Book>;

    /// Delete a book and, by cascade, its borrowing processes
    async fn delete_book(&self, id: i32) -> AppResult<bool>;

    async fn isbn_exists(&self, isbn: &str, exclude_id: Option<i32>) -> AppResult<bool>;
}

#[async_trait]
pub trait BorrowerRepository: Send + Sync {
    async fn borrower_by_id(&self, id: i32) -> AppResult<Option<Borrower>>;

    async fn borrower_by_email(&self, email: &str) -> AppResult<Option<Borrower>>;

    async fn email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool>;

    async fn list_borrowers(&self, query: &BorrowerQuery) -> AppResult<(Vec<Borrower>, i64)>;

    async fn create_borrower(&self, borrower: &NewBorrower) -> AppResult<Borrower>;

    async fn update_borrower(&self, id: i32, update: &UpdateBorrower) -> AppResult<Borrower>;

    /// Delete a borrower and, by cascade, their borrowing processes
    async fn delete_borrower(&self, id: i32) -> AppResult<bool>;
}

#[async_trait]
pub trait BorrowingRepository: Send + Sync {
    /// Start a unit of work. Nothing done through it is visible to others
    /// until [`UnitOfWork::commit`].
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;

    /// Open loans of a borrower, most recent first
    async fn active_loans(&self, borrower_id: i32) -> AppResult<Vec<ActiveLoan>>;

    /// Open loans due strictly before `today`, most overdue first
    async fn overdue_loans(&self, today: NaiveDate) -> AppResult<Vec<OverdueLoan>>;

    /// Loans created in `[from, to)`, oldest first. With `only_late`, keep
    /// only loans still open or returned after their due date.
    async fn loans_created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        only_late: bool,
    ) -> AppResult<Vec<LoanActivity>>;
}

/// Atomic group of store operations.
///
/// Dropping a unit of work without committing discards its changes.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn find_borrower(&mut self, id: i32) -> AppResult<Option<Borrower>>;

    /// Fetch a book and hold it against concurrent changes until the unit
    /// of work ends
    async fn lock_book(&mut self, id: i32) -> AppResult<Option<Book>>;

    async fn find_open_loan(
        &mut self,
        borrower_id: i32,
        book_id: i32,
    ) -> AppResult<Option<BorrowingProcess>>;

    /// Take one copy off the shelf. Fails if none is available.
    async fn decrement_available(&mut self, book_id: i32) -> AppResult<Book>;

    /// Put one copy back, never beyond `total_count`
    async fn increment_available(&mut self, book_id: i32) -> AppResult<Book>;

    async fn insert_loan(&mut self, loan: &NewBorrowing) -> AppResult<BorrowingProcess>;

    async fn close_loan(
        &mut self,
        loan_id: i32,
        returned_on: NaiveDate,
        at: DateTime<Utc>,
    ) -> AppResult<BorrowingProcess>;

    async fn commit(self: Box<Self>) -> AppResult<()>;

    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// Store connectivity check
#[async_trait]
pub trait Ping: Send + Sync {
    async fn ping(&self) -> AppResult<()>;
}
