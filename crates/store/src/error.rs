use common::ProductId;
use thiserror::Error;

/// Errors that can occur when interacting with the shop store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The entity is absent, or not visible to the caller.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A storage uniqueness constraint was violated (duplicate SKU, slug,
    /// or order number).
    #[error("duplicate {field}: {value}")]
    Duplicate { field: &'static str, value: String },

    /// Checkout was attempted on a cart with no line items.
    #[error("cart is empty")]
    EmptyCart,

    /// A cart line references a product that is missing or deactivated.
    #[error("product {0} is unavailable")]
    ProductUnavailable(ProductId),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn duplicate(field: &'static str, value: impl ToString) -> Self {
        StoreError::Duplicate {
            field,
            value: value.to_string(),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
