//! Borrower model, requests and authentication claims

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use super::book::DEFAULT_PAGE_LIMIT;
use super::enums::{SortOrder, NAME_REGEX};
use crate::error::AppError;

/// Registered borrower
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Borrower {
    pub id: i32,
    pub name: String,
    pub email: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing, default)]
    pub password: String,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterBorrower {
    #[validate(regex(path = *NAME_REGEX, message = "name must be 3-30 letters, spaces, ' or -"))]
    pub name: String,
    #[validate(
        email(message = "Invalid email format"),
        length(min = 8, max = 50, message = "email must be 8-50 characters")
    )]
    pub email: String,
    #[validate(custom(function = validate_password))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 8, max = 50))]
    pub email: String,
    #[validate(length(min = 8, max = 50))]
    pub password: String,
}

/// Borrower ready to be stored, password already hashed
#[derive(Debug, Clone)]
pub struct NewBorrower {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Partial borrower update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBorrower {
    #[validate(regex(path = *NAME_REGEX, message = "name must be 3-30 letters, spaces, ' or -"))]
    pub name: Option<String>,
    #[validate(
        email(message = "Invalid email format"),
        length(min = 8, max = 50, message = "email must be 8-50 characters")
    )]
    pub email: Option<String>,
}

impl UpdateBorrower {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }
}

/// Passwords: 8-50 characters, at least one letter and one digit
fn validate_password(password: &str) -> Result<(), ValidationError> {
    const SYMBOLS: &str = "!@#$%^&*(),.?\":{}|<>";

    let len = password.chars().count();
    let allowed = password
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || SYMBOLS.contains(c));
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if (8..=50).contains(&len) && allowed && has_letter && has_digit {
        Ok(())
    } else {
        let mut error = ValidationError::new("password");
        error.message = Some(
            "password must be 8-50 characters with at least one letter and one digit".into(),
        );
        Err(error)
    }
}

/// Sortable borrower columns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum BorrowerSortField {
    #[default]
    RegisterAt,
    Email,
    Name,
}

impl BorrowerSortField {
    pub fn as_column(&self) -> &'static str {
        match self {
            BorrowerSortField::RegisterAt => "registered_at",
            BorrowerSortField::Email => "email",
            BorrowerSortField::Name => "name",
        }
    }
}

/// Borrower list query parameters
#[derive(Debug, Clone, Default, Deserialize, Validate, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BorrowerQuery {
    #[validate(range(min = 5, max = 10, message = "limit must be between 5 and 10"))]
    pub limit: Option<i64>,
    #[validate(range(min = 0, message = "offset cannot be negative"))]
    pub offset: Option<i64>,
    pub sort_by: Option<BorrowerSortField>,
    pub sort_order: Option<SortOrder>,
    /// Matches name or email (case-insensitive)
    pub search_term: Option<String>,
}

impl BorrowerQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0)
    }

    pub fn sort_by(&self) -> BorrowerSortField {
        self.sort_by.unwrap_or_default()
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order.unwrap_or_default()
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search_term
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// JWT claims for an authenticated borrower
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowerClaims {
    pub sub: String,
    pub borrower_id: i32,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

impl BorrowerClaims {
    pub fn new(borrower: &Borrower, issued_at: DateTime<Utc>, expiration_hours: u64) -> Self {
        let iat = issued_at.timestamp();
        Self {
            sub: borrower.id.to_string(),
            borrower_id: borrower.id,
            email: borrower.email.clone(),
            exp: iat + expiration_hours as i64 * 3600,
            iat,
        }
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Borrower-scoped routes may only be used by the borrower themselves
    pub fn require_self(&self, borrower_id: i32) -> Result<(), AppError> {
        if self.borrower_id == borrower_id {
            Ok(())
        } else {
            Err(AppError::Authorization("Access denied".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn borrower() -> Borrower {
        let now = Utc::now();
        Borrower {
            id: 7,
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password: "hash".to_string(),
            registered_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_password("secret123").is_ok());
        assert!(validate_password("s3cr3t!?").is_ok());
        assert!(validate_password("short1").is_err());
        assert!(validate_password("onlyletters").is_err());
        assert!(validate_password("12345678").is_err());
        assert!(validate_password("with space 1").is_err());
    }

    #[test]
    fn test_token_round_trip() {
        let claims = BorrowerClaims::new(&borrower(), Utc::now(), 1);
        let token = claims.create_token("secret").unwrap();

        let parsed = BorrowerClaims::from_token(&token, "secret").unwrap();
        assert_eq!(parsed.borrower_id, 7);
        assert!(parsed.require_self(7).is_ok());
        assert!(matches!(parsed.require_self(8), Err(AppError::Authorization(_))));

        assert!(BorrowerClaims::from_token(&token, "other-secret").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let issued = Utc::now() - chrono::Duration::hours(5);
        let claims = BorrowerClaims::new(&borrower(), issued, 1);
        let token = claims.create_token("secret").unwrap();
        assert!(BorrowerClaims::from_token(&token, "secret").is_err());
    }

    #[test]
    fn test_password_not_serialized() {
        let json = serde_json::to_value(borrower()).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["registeredAt"].is_string(), true);
    }

    #[test]
    fn test_register_validation() {
        let request = RegisterBorrower {
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password: "analytical1".to_string(),
        };
        assert!(request.validate().is_ok());

        let bad = RegisterBorrower {
            email: "not-an-email".to_string(),
            ..request
        };
        assert!(bad.validate().is_err());
    }
}
