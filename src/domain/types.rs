//! Shared domain enumerations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::DomainError;

/// Profile role as stored on the `profiles.role` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Member,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Admin => "admin",
        }
    }

    /// Unknown or missing role values read as `Member`.
    pub fn from_column(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(role) if role.eq_ignore_ascii_case("admin") => Role::Admin,
            _ => Role::Member,
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// Category restriction applied to a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Uuid),
}

impl CategoryFilter {
    pub fn category_id(self) -> Option<Uuid> {
        match self {
            CategoryFilter::All => None,
            CategoryFilter::Only(id) => Some(id),
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => f.write_str("all"),
            CategoryFilter::Only(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Ok(CategoryFilter::All);
        }
        Uuid::parse_str(trimmed)
            .map(CategoryFilter::Only)
            .map_err(|_| DomainError::invalid_identifier(trimmed))
    }
}

/// Column a free-text listing search is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchField {
    Summary,
    Title,
}

impl SearchField {
    pub fn column(self) -> &'static str {
        match self {
            SearchField::Summary => "summary",
            SearchField::Title => "title",
        }
    }
}
