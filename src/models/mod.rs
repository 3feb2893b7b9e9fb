//! Data models for the library server

pub mod book;
pub mod borrower;
pub mod borrowing;
pub mod enums;

// Re-export commonly used types
pub use book::{Book, BookQuery, CreateBook, UpdateBook};
pub use borrower::{
    Borrower, BorrowerClaims, BorrowerQuery, LoginRequest, NewBorrower, RegisterBorrower,
    UpdateBorrower,
};
pub use borrowing::{
    ActiveLoan, BorrowRequest, BorrowingProcess, LastMonthQuery, LoanActivity, NewBorrowing,
    OverdueLoan,
};
pub use enums::SortOrder;
