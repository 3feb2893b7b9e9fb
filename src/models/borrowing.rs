//! Borrowing process model and the read models built on it

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

/// One loan of one book to one borrower.
///
/// `confirmed_return_date` is `None` while the loan is open and is set
/// exactly once, when the book comes back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowingProcess {
    pub id: i32,
    pub borrower_id: i32,
    pub book_id: i32,
    /// Due date
    pub return_date: NaiveDate,
    pub confirmed_return_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BorrowingProcess {
    pub fn is_open(&self) -> bool {
        self.confirmed_return_date.is_none()
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.is_open() && self.return_date < today
    }

    /// Still open, or closed after the due date
    pub fn is_late(&self) -> bool {
        match self.confirmed_return_date {
            None => true,
            Some(returned) => returned > self.return_date,
        }
    }
}

/// Loan row to insert
#[derive(Debug, Clone)]
pub struct NewBorrowing {
    pub borrower_id: i32,
    pub book_id: i32,
    pub return_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Borrow request body
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRequest {
    /// Expected return date (YYYY-MM-DD)
    pub return_date: NaiveDate,
}

/// Open loan of a borrower, with the borrowed book's details
#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActiveLoan {
    pub loan_id: i32,
    pub book_id: i32,
    pub book_title: String,
    pub book_author: String,
    pub book_isbn: String,
    pub return_date: NaiveDate,
    pub borrowed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BorrowerSummary {
    pub id: i32,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BookSummary {
    pub id: i32,
    pub title: String,
}

/// Open loan past its due date
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OverdueLoan {
    pub id: i32,
    pub return_date: NaiveDate,
    pub borrower: BorrowerSummary,
    pub book: BookSummary,
}

/// Internal row structure for overdue queries
#[derive(Debug, Clone, FromRow)]
pub struct OverdueLoanRow {
    id: i32,
    return_date: NaiveDate,
    borrower_id: i32,
    borrower_name: String,
    borrower_email: String,
    book_id: i32,
    book_title: String,
}

impl From<OverdueLoanRow> for OverdueLoan {
    fn from(row: OverdueLoanRow) -> Self {
        OverdueLoan {
            id: row.id,
            return_date: row.return_date,
            borrower: BorrowerSummary {
                id: row.borrower_id,
                name: row.borrower_name,
                email: row.borrower_email,
            },
            book: BookSummary {
                id: row.book_id,
                title: row.book_title,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BorrowerContact {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BookInfo {
    pub title: String,
    pub author: String,
}

/// Loan created during a reporting period
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoanActivity {
    pub id: i32,
    pub return_date: NaiveDate,
    pub confirmed_return_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub borrower: BorrowerContact,
    pub book: BookInfo,
}

/// Internal row structure for activity queries
#[derive(Debug, Clone, FromRow)]
pub struct LoanActivityRow {
    id: i32,
    return_date: NaiveDate,
    confirmed_return_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    borrower_name: String,
    borrower_email: String,
    book_title: String,
    book_author: String,
}

impl From<LoanActivityRow> for LoanActivity {
    fn from(row: LoanActivityRow) -> Self {
        LoanActivity {
            id: row.id,
            return_date: row.return_date,
            confirmed_return_date: row.confirmed_return_date,
            created_at: row.created_at,
            borrower: BorrowerContact {
                name: row.borrower_name,
                email: row.borrower_email,
            },
            book: BookInfo {
                title: row.book_title,
                author: row.book_author,
            },
        }
    }
}

/// Last-month report query parameters
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LastMonthQuery {
    /// Only loans still open or returned late
    pub only_overdue: Option<bool>,
}
