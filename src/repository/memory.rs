//! In-process store
//!
//! All tables live behind one async mutex. A unit of work holds that mutex
//! for its whole lifetime and edits a private copy of the tables, so units
//! of work are fully serialized and a rollback simply drops the copy.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{BookRepository, BorrowerRepository, BorrowingRepository, Ping, UnitOfWork};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::BookSortField,
        borrower::BorrowerSortField,
        borrowing::{BookInfo, BookSummary, BorrowerContact, BorrowerSummary},
        ActiveLoan, Book, BookQuery, Borrower, BorrowerQuery, BorrowingProcess, CreateBook,
        LoanActivity, NewBorrower, NewBorrowing, OverdueLoan, UpdateBook, UpdateBorrower,
    },
};

#[derive(Debug, Clone, Default)]
struct Tables {
    books: BTreeMap<i32, Book>,
    borrowers: BTreeMap<i32, Borrower>,
    loans: BTreeMap<i32, BorrowingProcess>,
    last_book_id: i32,
    last_borrower_id: i32,
    last_loan_id: i32,
}

impl Tables {
    fn open_loan(&self, borrower_id: i32, book_id: i32) -> Option<&BorrowingProcess> {
        self.loans
            .values()
            .find(|l| l.borrower_id == borrower_id && l.book_id == book_id && l.is_open())
    }

    fn isbn_taken(&self, isbn: &str, exclude_id: Option<i32>) -> bool {
        self.books
            .values()
            .any(|b| b.isbn == isbn && Some(b.id) != exclude_id)
    }

    fn email_taken(&self, email: &str, exclude_id: Option<i32>) -> bool {
        self.borrowers
            .values()
            .any(|b| b.email == email && Some(b.id) != exclude_id)
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn cmp_ci(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

fn page<T>(items: Vec<T>, offset: i64, limit: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

/// In-process implementation of every repository trait
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Ping for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl BookRepository for MemoryStore {
    async fn book_by_id(&self, id: i32) -> AppResult<Option<Book>> {
        Ok(self.tables.lock().await.books.get(&id).cloned())
    }

    async fn list_books(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let tables = self.tables.lock().await;

        let mut books: Vec<Book> = tables
            .books
            .values()
            .filter(|b| match query.search_term() {
                Some(term) => {
                    contains_ci(&b.title, term)
                        || contains_ci(&b.author, term)
                        || contains_ci(&b.isbn, term)
                }
                None => true,
            })
            .cloned()
            .collect();

        let order = query.sort_order();
        books.sort_by(|a, b| {
            let ordering = match query.sort_by() {
                BookSortField::Title => cmp_ci(&a.title, &b.title),
                BookSortField::Author => cmp_ci(&a.author, &b.author),
                BookSortField::Isbn => a.isbn.cmp(&b.isbn),
            };
            order.apply(ordering).then(a.id.cmp(&b.id))
        });

        let total = books.len() as i64;
        Ok((page(books, query.offset(), query.limit()), total))
    }

    async fn create_book(&self, book: &CreateBook) -> AppResult<Book> {
        let mut tables = self.tables.lock().await;

        if tables.isbn_taken(&book.isbn, None) {
            return Err(AppError::Conflict("A book with this isbn already exists".to_string()));
        }

        tables.last_book_id += 1;
        let now = Utc::now();
        let created = Book {
            id: tables.last_book_id,
            title: book.title.clone(),
            author: book.author.clone(),
            isbn: book.isbn.clone(),
            total_count: book.total_count,
            available_count: book.total_count,
            shelf_location: book.shelf_location.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.books.insert(created.id, created.clone());

        Ok(created)
    }

    async fn update_book(&self, id: i32, update: &UpdateBook) -> AppResult<Book> {
        let mut tables = self.tables.lock().await;

        let current = tables
            .books
            .get(&id)
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

        if let Some(ref isbn) = update.isbn {
            if tables.isbn_taken(isbn, Some(id)) {
                return Err(AppError::Conflict("A book with this isbn already exists".to_string()));
            }
        }

        let mut updated = update.apply_to(current);
        if updated.available_count < 0 || updated.available_count > updated.total_count {
            return Err(AppError::Validation(
                "availableCount must be between 0 and totalCount".to_string(),
            ));
        }
        updated.updated_at = Utc::now();
        tables.books.insert(id, updated.clone());

        Ok(updated)
    }

    async fn delete_book(&self, id: i32) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;

        if tables.books.remove(&id).is_none() {
            return Ok(false);
        }
        tables.loans.retain(|_, loan| loan.book_id != id);

        Ok(true)
    }

    async fn isbn_exists(&self, isbn: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        Ok(self.tables.lock().await.isbn_taken(isbn, exclude_id))
    }
}

#[async_trait]
impl BorrowerRepository for MemoryStore {
    async fn borrower_by_id(&self, id: i32) -> AppResult<Option<Borrower>> {
        Ok(self.tables.lock().await.borrowers.get(&id).cloned())
    }

    async fn borrower_by_email(&self, email: &str) -> AppResult<Option<Borrower>> {
        Ok(self
            .tables
            .lock()
            .await
            .borrowers
            .values()
            .find(|b| b.email == email)
            .cloned())
    }

    async fn email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        Ok(self.tables.lock().await.email_taken(email, exclude_id))
    }

    async fn list_borrowers(&self, query: &BorrowerQuery) -> AppResult<(Vec<Borrower>, i64)> {
        let tables = self.tables.lock().await;

        let mut borrowers: Vec<Borrower> = tables
            .borrowers
            .values()
            .filter(|b| match query.search_term() {
                Some(term) => contains_ci(&b.name, term) || contains_ci(&b.email, term),
                None => true,
            })
            .cloned()
            .collect();

        let order = query.sort_order();
        borrowers.sort_by(|a, b| {
            let ordering = match query.sort_by() {
                BorrowerSortField::RegisterAt => a.registered_at.cmp(&b.registered_at),
                BorrowerSortField::Email => a.email.cmp(&b.email),
                BorrowerSortField::Name => cmp_ci(&a.name, &b.name),
            };
            order.apply(ordering).then(a.id.cmp(&b.id))
        });

        let total = borrowers.len() as i64;
        Ok((page(borrowers, query.offset(), query.limit()), total))
    }

    async fn create_borrower(&self, borrower: &NewBorrower) -> AppResult<Borrower> {
        let mut tables = self.tables.lock().await;

        if tables.email_taken(&borrower.email, None) {
            return Err(AppError::Conflict("Borrower already exists".to_string()));
        }

        tables.last_borrower_id += 1;
        let now = Utc::now();
        let created = Borrower {
            id: tables.last_borrower_id,
            name: borrower.name.clone(),
            email: borrower.email.clone(),
            password: borrower.password_hash.clone(),
            registered_at: now,
            updated_at: now,
        };
        tables.borrowers.insert(created.id, created.clone());

        Ok(created)
    }

    async fn update_borrower(&self, id: i32, update: &UpdateBorrower) -> AppResult<Borrower> {
        let mut tables = self.tables.lock().await;

        if let Some(ref email) = update.email {
            if tables.email_taken(email, Some(id)) {
                return Err(AppError::Conflict("Email already in use".to_string()));
            }
        }

        let borrower = tables
            .borrowers
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Borrower not found".to_string()))?;

        if let Some(ref name) = update.name {
            borrower.name = name.clone();
        }
        if let Some(ref email) = update.email {
            borrower.email = email.clone();
        }
        borrower.updated_at = Utc::now();

        Ok(borrower.clone())
    }

    async fn delete_borrower(&self, id: i32) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;

        if tables.borrowers.remove(&id).is_none() {
            return Ok(false);
        }
        tables.loans.retain(|_, loan| loan.borrower_id != id);

        Ok(true)
    }
}

#[async_trait]
impl BorrowingRepository for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let guard = self.tables.clone().lock_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(MemoryUnitOfWork { guard, working }))
    }

    async fn active_loans(&self, borrower_id: i32) -> AppResult<Vec<ActiveLoan>> {
        let tables = self.tables.lock().await;

        let mut loans: Vec<(&BorrowingProcess, &Book)> = tables
            .loans
            .values()
            .filter(|l| l.borrower_id == borrower_id && l.is_open())
            .filter_map(|l| tables.books.get(&l.book_id).map(|b| (l, b)))
            .collect();
        loans.sort_by(|(a, _), (b, _)| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(loans
            .into_iter()
            .map(|(loan, book)| ActiveLoan {
                loan_id: loan.id,
                book_id: book.id,
                book_title: book.title.clone(),
                book_author: book.author.clone(),
                book_isbn: book.isbn.clone(),
                return_date: loan.return_date,
                borrowed_at: loan.created_at,
            })
            .collect())
    }

    async fn overdue_loans(&self, today: NaiveDate) -> AppResult<Vec<OverdueLoan>> {
        let tables = self.tables.lock().await;

        let mut loans: Vec<OverdueLoan> = tables
            .loans
            .values()
            .filter(|l| l.is_overdue(today))
            .filter_map(|l| {
                let borrower = tables.borrowers.get(&l.borrower_id)?;
                let book = tables.books.get(&l.book_id)?;
                Some(OverdueLoan {
                    id: l.id,
                    return_date: l.return_date,
                    borrower: BorrowerSummary {
                        id: borrower.id,
                        name: borrower.name.clone(),
                        email: borrower.email.clone(),
                    },
                    book: BookSummary {
                        id: book.id,
                        title: book.title.clone(),
                    },
                })
            })
            .collect();
        loans.sort_by(|a, b| a.return_date.cmp(&b.return_date).then(a.id.cmp(&b.id)));

        Ok(loans)
    }

    async fn loans_created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        only_late: bool,
    ) -> AppResult<Vec<LoanActivity>> {
        let tables = self.tables.lock().await;

        let mut loans: Vec<LoanActivity> = tables
            .loans
            .values()
            .filter(|l| l.created_at >= from && l.created_at < to)
            .filter(|l| !only_late || l.is_late())
            .filter_map(|l| {
                let borrower = tables.borrowers.get(&l.borrower_id)?;
                let book = tables.books.get(&l.book_id)?;
                Some(LoanActivity {
                    id: l.id,
                    return_date: l.return_date,
                    confirmed_return_date: l.confirmed_return_date,
                    created_at: l.created_at,
                    borrower: BorrowerContact {
                        name: borrower.name.clone(),
                        email: borrower.email.clone(),
                    },
                    book: BookInfo {
                        title: book.title.clone(),
                        author: book.author.clone(),
                    },
                })
            })
            .collect();
        loans.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(loans)
    }
}

/// Unit of work over a private copy of the tables
struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn find_borrower(&mut self, id: i32) -> AppResult<Option<Borrower>> {
        Ok(self.working.borrowers.get(&id).cloned())
    }

    async fn lock_book(&mut self, id: i32) -> AppResult<Option<Book>> {
        // The whole store is already held by this unit of work
        Ok(self.working.books.get(&id).cloned())
    }

    async fn find_open_loan(
        &mut self,
        borrower_id: i32,
        book_id: i32,
    ) -> AppResult<Option<BorrowingProcess>> {
        Ok(self.working.open_loan(borrower_id, book_id).cloned())
    }

    async fn decrement_available(&mut self, book_id: i32) -> AppResult<Book> {
        let book = self
            .working
            .books
            .get_mut(&book_id)
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

        if book.available_count <= 0 {
            return Err(AppError::Conflict("No copies of the book are available".to_string()));
        }
        book.available_count -= 1;
        book.updated_at = Utc::now();

        Ok(book.clone())
    }

    async fn increment_available(&mut self, book_id: i32) -> AppResult<Book> {
        let book = self
            .working
            .books
            .get_mut(&book_id)
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

        if book.available_count < book.total_count {
            book.available_count += 1;
        }
        book.updated_at = Utc::now();

        Ok(book.clone())
    }

    async fn insert_loan(&mut self, loan: &NewBorrowing) -> AppResult<BorrowingProcess> {
        if self.working.open_loan(loan.borrower_id, loan.book_id).is_some() {
            return Err(AppError::Conflict(
                "Borrower has already borrowed this book".to_string(),
            ));
        }
        if !self.working.borrowers.contains_key(&loan.borrower_id)
            || !self.working.books.contains_key(&loan.book_id)
        {
            return Err(AppError::NotFound("Borrower or book not found".to_string()));
        }

        self.working.last_loan_id += 1;
        let created = BorrowingProcess {
            id: self.working.last_loan_id,
            borrower_id: loan.borrower_id,
            book_id: loan.book_id,
            return_date: loan.return_date,
            confirmed_return_date: None,
            created_at: loan.created_at,
            updated_at: loan.created_at,
        };
        self.working.loans.insert(created.id, created.clone());

        Ok(created)
    }

    async fn close_loan(
        &mut self,
        loan_id: i32,
        returned_on: NaiveDate,
        at: DateTime<Utc>,
    ) -> AppResult<BorrowingProcess> {
        let loan = self
            .working
            .loans
            .get_mut(&loan_id)
            .ok_or_else(|| AppError::NotFound(format!("Borrowing process {} not found", loan_id)))?;

        if !loan.is_open() {
            return Err(AppError::InvalidState("Borrowing process already closed".to_string()));
        }
        loan.confirmed_return_date = Some(returned_on);
        loan.updated_at = at;

        Ok(loan.clone())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn new_book(isbn: &str, total: i32) -> CreateBook {
        CreateBook {
            title: format!("Book {}", isbn),
            author: "Author".to_string(),
            isbn: isbn.to_string(),
            total_count: total,
            shelf_location: "A-1".to_string(),
        }
    }

    fn new_borrower(email: &str) -> NewBorrower {
        NewBorrower {
            name: "Reader".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_unique_isbn_and_email() {
        let store = MemoryStore::new();
        store.create_book(&new_book("978-000-00000-000-1", 1)).await.unwrap();
        let err = store.create_book(&new_book("978-000-00000-000-1", 2)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        store.create_borrower(&new_borrower("a@example.com")).await.unwrap();
        let err = store.create_borrower(&new_borrower("a@example.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_rollback_discards_and_commit_persists() {
        let store = MemoryStore::new();
        let book = store.create_book(&new_book("978-000-00000-000-1", 2)).await.unwrap();

        let mut uow = store.begin().await.unwrap();
        uow.decrement_available(book.id).await.unwrap();
        uow.rollback().await.unwrap();
        assert_eq!(store.book_by_id(book.id).await.unwrap().unwrap().available_count, 2);

        let mut uow = store.begin().await.unwrap();
        uow.decrement_available(book.id).await.unwrap();
        drop(uow);
        assert_eq!(store.book_by_id(book.id).await.unwrap().unwrap().available_count, 2);

        let mut uow = store.begin().await.unwrap();
        uow.decrement_available(book.id).await.unwrap();
        uow.commit().await.unwrap();
        assert_eq!(store.book_by_id(book.id).await.unwrap().unwrap().available_count, 1);
    }

    #[tokio::test]
    async fn test_counters_stay_in_bounds() {
        let store = MemoryStore::new();
        let book = store.create_book(&new_book("978-000-00000-000-1", 1)).await.unwrap();

        let mut uow = store.begin().await.unwrap();
        assert_eq!(uow.increment_available(book.id).await.unwrap().available_count, 1);
        assert_eq!(uow.decrement_available(book.id).await.unwrap().available_count, 0);
        let err = uow.decrement_available(book.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_units_of_work_are_serialized() {
        let store = MemoryStore::new();
        let first = store.begin().await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(50), store.begin()).await;
        assert!(blocked.is_err());

        drop(first);
        let second = tokio::time::timeout(Duration::from_millis(50), store.begin()).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_delete_cascades_to_loans() {
        let store = MemoryStore::new();
        let book = store.create_book(&new_book("978-000-00000-000-1", 1)).await.unwrap();
        let borrower = store.create_borrower(&new_borrower("a@example.com")).await.unwrap();

        let mut uow = store.begin().await.unwrap();
        uow.insert_loan(&NewBorrowing {
            borrower_id: borrower.id,
            book_id: book.id,
            return_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            created_at: Utc::now(),
        })
        .await
        .unwrap();
        uow.commit().await.unwrap();
        assert_eq!(store.active_loans(borrower.id).await.unwrap().len(), 1);

        assert!(store.delete_book(book.id).await.unwrap());
        assert!(store.active_loans(borrower.id).await.unwrap().is_empty());
        assert!(!store.delete_book(book.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_books_search_sort_and_page() {
        let store = MemoryStore::new();
        for (i, title) in ["Zeta", "alpha", "Mu", "Beta", "Omega", "Gamma"].iter().enumerate() {
            store
                .create_book(&CreateBook {
                    title: title.to_string(),
                    ..new_book(&format!("978-000-00000-000-{}", i), 1)
                })
                .await
                .unwrap();
        }

        let query = BookQuery {
            limit: Some(5),
            ..Default::default()
        };
        let (books, total) = store.list_books(&query).await.unwrap();
        assert_eq!(total, 6);
        let titles: Vec<&str> = books.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["alpha", "Beta", "Gamma", "Mu", "Omega"]);

        let query = BookQuery {
            offset: Some(5),
            ..Default::default()
        };
        let (books, _) = store.list_books(&query).await.unwrap();
        assert_eq!(books[0].title, "Zeta");

        let query = BookQuery {
            search_term: Some("TA".to_string()),
            sort_order: Some(crate::models::SortOrder::Desc),
            ..Default::default()
        };
        let (books, total) = store.list_books(&query).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(books[0].title, "Zeta");
        assert_eq!(books[1].title, "Beta");
    }
}
