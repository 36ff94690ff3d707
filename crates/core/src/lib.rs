//! Shared primitives for all Rust crates in Strata.

#![forbid(unsafe_code)]

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across Strata crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for NonEmptyString {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl Display for NonEmptyString {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An exclusive lock could not be obtained within its wait budget.
    ///
    /// Transient: callers retry on the next scheduled run.
    #[error("lock timeout: {0}")]
    LockTimeout(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns a stable machine-readable kind for audit rows.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::LockTimeout(_) => "lock_timeout",
            Self::Internal(_) => "internal",
        }
    }

    /// Returns whether the error is expected to clear on a later run.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::LockTimeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::{AppError, NonEmptyString};

    #[test]
    fn non_empty_string_rejects_whitespace() {
        let result = NonEmptyString::new("   ");
        assert!(result.is_err());
    }

    #[test]
    fn non_empty_string_deserializes_through_validation() {
        let parsed = serde_json::from_str::<NonEmptyString>("\"sales\"");
        assert!(parsed.is_ok());

        let rejected = serde_json::from_str::<NonEmptyString>("\"  \"");
        assert!(rejected.is_err());
    }

    #[test]
    fn lock_timeout_is_the_only_transient_kind() {
        assert!(AppError::LockTimeout("partition busy".to_owned()).is_transient());
        assert!(!AppError::Internal("boom".to_owned()).is_transient());
        assert_eq!(
            AppError::LockTimeout("partition busy".to_owned()).kind(),
            "lock_timeout"
        );
    }
}
