//! Service-layer error types.

use store::StoreError;
use thiserror::Error;

/// Errors that can occur during service operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the store.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The request failed input validation before reaching the store.
    #[error("validation error: {0}")]
    Validation(String),

    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
}

impl DomainError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation(message.into())
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, DomainError>;

/// Rejects blank or whitespace-only required fields.
pub(crate) fn require_filled(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!(
            "{field} must not be empty"
        )));
    }
    Ok(())
}
