//! Error types for group operations

use super::types::GroupId;
use std::fmt;
use thiserror::Error;

/// Result type for group operations
pub type GroupResult<T> = Result<T, GroupError>;

/// Errors surfaced by the group rule engine
#[derive(Debug, Error)]
pub enum GroupError {
    /// One or more invariants were violated; all of them are reported
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// A top-level group is already at its member capacity
    #[error("Maximum memberships exceeded for group {group_id}: {memberships_count} of {max_size}")]
    CapacityExceeded {
        group_id: GroupId,
        max_size: i64,
        memberships_count: i64,
    },

    /// Unrecognised visibility term or enum string
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A stored value is outside its domain; indicates a programming error
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<ValidationErrors> for GroupError {
    fn from(errors: ValidationErrors) -> Self {
        GroupError::Validation(errors)
    }
}

/// Errors raised by the storage collaborator
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// A rollback reached a migration without down SQL
    #[error("Migration v{0} cannot be rolled back")]
    IrreversibleMigration(i32),
}

/// A single violated rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Attribute name, or "base" for rules spanning several attributes
    pub field: &'static str,
    pub message: String,
}

/// All violations found by one validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a single-violation error
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn has_error_on(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// `Ok(())` when nothing was collected
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{} {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}
