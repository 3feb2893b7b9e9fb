//! Business logic services

pub mod books;
pub mod borrowers;
pub mod borrowing;
pub mod clock;
pub mod rate_limit;
pub mod redis;
pub mod reports;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    repository::{BookRepository, BorrowerRepository, BorrowingRepository, Ping},
};

use clock::Clock;
use rate_limit::{RateLimiter, RequestCounter};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub books: books::BooksService,
    pub borrowers: borrowers::BorrowersService,
    pub borrowing: borrowing::BorrowingService,
    pub reports: reports::ReportsService,
    pub rate_limiter: RateLimiter,
    pub store: Arc<dyn Ping>,
}

impl Services {
    /// Create all services over one store
    pub fn new<S>(
        store: Arc<S>,
        config: &AppConfig,
        counter: Arc<dyn RequestCounter>,
        clock: Arc<dyn Clock>,
    ) -> Self
    where
        S: BookRepository + BorrowerRepository + BorrowingRepository + Ping + 'static,
    {
        Self {
            books: books::BooksService::new(store.clone()),
            borrowers: borrowers::BorrowersService::new(
                store.clone(),
                config.auth.clone(),
                clock.clone(),
            ),
            borrowing: borrowing::BorrowingService::new(store.clone(), store.clone(), clock.clone()),
            reports: reports::ReportsService::new(store.clone(), clock),
            rate_limiter: RateLimiter::new(counter, &config.rate_limit),
            store,
        }
    }
}
