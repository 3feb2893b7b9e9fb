//! Read-only reports over borrowing processes

use std::sync::Arc;

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};

use super::clock::Clock;
use crate::{
    error::{AppError, AppResult},
    models::{LoanActivity, OverdueLoan},
    repository::BorrowingRepository,
};

#[derive(Clone)]
pub struct ReportsService {
    repository: Arc<dyn BorrowingRepository>,
    clock: Arc<dyn Clock>,
}

impl ReportsService {
    pub fn new(repository: Arc<dyn BorrowingRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Open loans whose due date is before today
    pub async fn list_overdue(&self) -> AppResult<Vec<OverdueLoan>> {
        self.repository.overdue_loans(self.clock.today()).await
    }

    /// Loans created during the previous calendar month. With `only_overdue`,
    /// keep those still open or returned after their due date.
    pub async fn list_last_month_borrows(&self, only_overdue: bool) -> AppResult<Vec<LoanActivity>> {
        let (from, to) = previous_month_window(self.clock.now())?;
        tracing::debug!(%from, %to, only_overdue, "Last month borrows");
        self.repository
            .loans_created_between(from, to, only_overdue)
            .await
    }
}

/// `[first day of previous month, first day of current month)` in UTC
pub fn previous_month_window(now: DateTime<Utc>) -> AppResult<(DateTime<Utc>, DateTime<Utc>)> {
    let current = NaiveDate::from_ymd_opt(now.year(), now.month(), 1);
    let previous = current.and_then(|d| d.checked_sub_months(Months::new(1)));

    match (current, previous) {
        (Some(current), Some(previous)) => Ok((midnight(previous)?, midnight(current)?)),
        _ => Err(AppError::Internal(format!("No previous month for {}", now))),
    }
}

fn midnight(day: NaiveDate) -> AppResult<DateTime<Utc>> {
    day.and_hms_opt(0, 0, 0)
        .map(|d| d.and_utc())
        .ok_or_else(|| AppError::Internal(format!("Invalid date {}", day)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::borrowing::tests::Fixture;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_previous_month_window() {
        let (from, to) = previous_month_window(at("2024-03-15T10:30:00Z")).unwrap();
        assert_eq!(from, at("2024-02-01T00:00:00Z"));
        assert_eq!(to, at("2024-03-01T00:00:00Z"));

        let (from, to) = previous_month_window(at("2024-01-01T00:00:00Z")).unwrap();
        assert_eq!(from, at("2023-12-01T00:00:00Z"));
        assert_eq!(to, at("2024-01-01T00:00:00Z"));
    }

    #[tokio::test]
    async fn test_overdue_follows_the_clock() {
        let fx = Fixture::at("2024-06-01");
        let reports = ReportsService::new(fx.store.clone(), fx.clock.clone());
        let book = fx.book("978-000-00000-000-1", 2).await;
        let ada = fx.borrower("ada@example.com").await;

        let loan = fx.service.borrow(ada.id, book.id, date("2024-06-05")).await.unwrap();

        fx.clock.set(at("2024-06-05T18:00:00Z"));
        assert!(reports.list_overdue().await.unwrap().is_empty());

        fx.clock.set(at("2024-06-06T08:00:00Z"));
        let overdue = reports.list_overdue().await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, loan.id);
        assert_eq!(overdue[0].borrower.email, "ada@example.com");
        assert_eq!(overdue[0].book.id, book.id);

        fx.service.return_book(ada.id, book.id).await.unwrap();
        assert!(reports.list_overdue().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overdue_ordered_by_due_date() {
        let fx = Fixture::at("2024-06-01");
        let reports = ReportsService::new(fx.store.clone(), fx.clock.clone());
        let first = fx.book("978-000-00000-000-1", 1).await;
        let second = fx.book("978-000-00000-000-2", 1).await;
        let ada = fx.borrower("ada@example.com").await;

        fx.service.borrow(ada.id, first.id, date("2024-06-10")).await.unwrap();
        fx.service.borrow(ada.id, second.id, date("2024-06-03")).await.unwrap();

        fx.clock.set(at("2024-07-01T00:00:00Z"));
        let overdue = reports.list_overdue().await.unwrap();
        let books: Vec<i32> = overdue.iter().map(|l| l.book.id).collect();
        assert_eq!(books, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_last_month_borrows() {
        let fx = Fixture::at("2024-01-31");
        let reports = ReportsService::new(fx.store.clone(), fx.clock.clone());
        let ada = fx.borrower("ada@example.com").await;
        let books = [
            fx.book("978-000-00000-000-1", 1).await,
            fx.book("978-000-00000-000-2", 1).await,
            fx.book("978-000-00000-000-3", 1).await,
            fx.book("978-000-00000-000-4", 1).await,
            fx.book("978-000-00000-000-5", 1).await,
        ];

        // January: outside the window
        fx.service.borrow(ada.id, books[0].id, date("2024-02-10")).await.unwrap();

        // February: returned on time
        fx.clock.set(at("2024-02-01T00:00:00Z"));
        fx.service.borrow(ada.id, books[1].id, date("2024-02-10")).await.unwrap();
        fx.clock.set(at("2024-02-09T12:00:00Z"));
        fx.service.return_book(ada.id, books[1].id).await.unwrap();

        // February: returned late
        fx.clock.set(at("2024-02-12T00:00:00Z"));
        fx.service.borrow(ada.id, books[2].id, date("2024-02-14")).await.unwrap();
        fx.clock.set(at("2024-02-20T00:00:00Z"));
        fx.service.return_book(ada.id, books[2].id).await.unwrap();

        // February: still open
        fx.clock.set(at("2024-02-29T23:59:59Z"));
        fx.service.borrow(ada.id, books[3].id, date("2024-03-20")).await.unwrap();

        // March: outside the window
        fx.clock.set(at("2024-03-01T00:00:00Z"));
        fx.service.borrow(ada.id, books[4].id, date("2024-03-20")).await.unwrap();

        fx.clock.set(at("2024-03-15T09:00:00Z"));
        let all = reports.list_last_month_borrows(false).await.unwrap();
        let titles: Vec<&str> = all.iter().map(|l| l.book.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                books[1].title.as_str(),
                books[2].title.as_str(),
                books[3].title.as_str()
            ]
        );

        let late = reports.list_last_month_borrows(true).await.unwrap();
        let titles: Vec<&str> = late.iter().map(|l| l.book.title.as_str()).collect();
        assert_eq!(titles, vec![books[2].title.as_str(), books[3].title.as_str()]);
        assert_eq!(late[0].confirmed_return_date, Some(date("2024-02-20")));
        assert_eq!(late[1].confirmed_return_date, None);
    }
}
