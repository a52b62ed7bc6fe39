use thiserror::Error;

use crate::types::ListingId;

/// Failure taxonomy shared by every marketplace component.
///
/// Callers translate these into user-facing messages; components never
/// return partial results in place of an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or out-of-range input, scoped to one field.
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// A referenced entity does not exist (or is hidden from the caller).
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Authenticated but not authorized.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// State transition from an incompatible state, or a duplicate key.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The listing is waiting for moderation and cannot be edited or deleted.
    #[error("Listing {0} is under review and cannot be changed until moderation completes")]
    ListingUnderReview(ListingId),

    /// An external dependency (storage) is unreachable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl DomainError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::NotFound { .. } => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::Conflict(_) => "conflict",
            Self::ListingUnderReview(_) => "listing_under_review",
            Self::Unavailable(_) => "unavailable",
        }
    }

    /// The offending field for validation errors.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Convenience alias used by the domain helpers.
pub type DomainResult<T> = std::result::Result<T, DomainError>;
