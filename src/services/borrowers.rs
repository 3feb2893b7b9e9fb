//! Borrower registration, authentication and management

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use validator::Validate;

use super::clock::Clock;
use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        Borrower, BorrowerClaims, BorrowerQuery, LoginRequest, NewBorrower, RegisterBorrower,
        UpdateBorrower,
    },
    repository::BorrowerRepository,
};

#[derive(Clone)]
pub struct BorrowersService {
    repository: Arc<dyn BorrowerRepository>,
    config: AuthConfig,
    clock: Arc<dyn Clock>,
}

impl BorrowersService {
    pub fn new(
        repository: Arc<dyn BorrowerRepository>,
        config: AuthConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            config,
            clock,
        }
    }

    /// Register a new borrower and issue a token for them
    pub async fn register(&self, request: RegisterBorrower) -> AppResult<(String, Borrower)> {
        request.validate()?;

        if self.repository.email_exists(&request.email, None).await? {
            return Err(AppError::Conflict("Borrower already exists".to_string()));
        }

        let borrower = self
            .repository
            .create_borrower(&NewBorrower {
                name: request.name,
                email: request.email,
                password_hash: self.hash_password(&request.password)?,
            })
            .await?;

        tracing::info!(borrower_id = borrower.id, "Borrower registered");

        let token = self.create_token(&borrower)?;
        Ok((token, borrower))
    }

    /// Authenticate by email and password
    pub async fn login(&self, request: LoginRequest) -> AppResult<(String, Borrower)> {
        request.validate()?;
        let invalid = || AppError::Authentication("Invalid email or password".to_string());

        let borrower = self
            .repository
            .borrower_by_email(&request.email)
            .await?
            .ok_or_else(invalid)?;

        if !self.verify_password(&borrower, &request.password)? {
            tracing::debug!(borrower_id = borrower.id, "Rejected login: wrong password");
            return Err(invalid());
        }

        let token = self.create_token(&borrower)?;
        Ok((token, borrower))
    }

    /// Decode and check a bearer token
    pub fn verify_token(&self, token: &str) -> AppResult<BorrowerClaims> {
        BorrowerClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|_| AppError::Authentication("Invalid or expired token".to_string()))
    }

    pub async fn get_borrower(&self, id: i32) -> AppResult<Borrower> {
        self.repository
            .borrower_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Borrower not found".to_string()))
    }

    pub async fn list_borrowers(&self, query: &BorrowerQuery) -> AppResult<(Vec<Borrower>, i64)> {
        query.validate()?;
        self.repository.list_borrowers(query).await
    }

    pub async fn update_borrower(&self, id: i32, update: UpdateBorrower) -> AppResult<Borrower> {
        update.validate()?;
        if update.is_empty() {
            return Err(AppError::BadRequest("No fields to update".to_string()));
        }

        self.get_borrower(id).await?;

        if let Some(ref email) = update.email {
            if self.repository.email_exists(email, Some(id)).await? {
                return Err(AppError::Conflict("Email already in use".to_string()));
            }
        }

        let borrower = self.repository.update_borrower(id, &update).await?;
        tracing::info!(borrower_id = id, "Borrower updated");
        Ok(borrower)
    }

    pub async fn delete_borrower(&self, id: i32) -> AppResult<()> {
        if !self.repository.delete_borrower(id).await? {
            return Err(AppError::NotFound("Borrower not found".to_string()));
        }
        tracing::info!(borrower_id = id, "Borrower deleted");
        Ok(())
    }

    fn create_token(&self, borrower: &Borrower) -> AppResult<String> {
        BorrowerClaims::new(borrower, self.clock.now(), self.config.jwt_expiration_hours)
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Hash a password using Argon2
    fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }

    fn verify_password(&self, borrower: &Borrower, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&borrower.password)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }
}
