//! Shared enums and validation patterns

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Hyphenated ISBN-13, e.g. `978-316-14841-010-0`
pub static ISBN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(97[89])-\d{3}-\d{5}-\d{3}-\d$").expect("valid ISBN regex"));

pub static NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z\s'-]{3,30}$").expect("valid name regex"));

/// Sort direction for list endpoints
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    /// Apply this direction to an ascending ordering
    pub fn apply(&self, ordering: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isbn_pattern() {
        assert!(ISBN_REGEX.is_match("978-316-14841-010-0"));
        assert!(ISBN_REGEX.is_match("979-123-45678-901-2"));
        assert!(!ISBN_REGEX.is_match("978-3-16148-410-0"));
        assert!(!ISBN_REGEX.is_match("9783161484100"));
        assert!(!ISBN_REGEX.is_match("977-316-14841-010-0"));
    }

    #[test]
    fn test_name_pattern() {
        assert!(NAME_REGEX.is_match("Mary O'Neil"));
        assert!(NAME_REGEX.is_match("Jean-Luc"));
        assert!(!NAME_REGEX.is_match("Al"));
        assert!(!NAME_REGEX.is_match("R2D2 unit"));
    }

    #[test]
    fn test_sort_order_apply() {
        use std::cmp::Ordering;
        assert_eq!(SortOrder::Asc.apply(Ordering::Less), Ordering::Less);
        assert_eq!(SortOrder::Desc.apply(Ordering::Less), Ordering::Greater);
    }
}
