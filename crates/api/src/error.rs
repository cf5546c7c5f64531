//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or malformed principal headers.
    #[error("{0}")]
    Unauthorized(String),
    /// The principal is known but not allowed to do this.
    #[error("{0}")]
    Forbidden(String),
    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),
    /// Service logic error.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match &err {
        DomainError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        DomainError::Store(store_err) => match store_err {
            StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
            StoreError::EmptyCart | StoreError::ProductUnavailable(_) => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            StoreError::Duplicate { .. } => (StatusCode::CONFLICT, err.to_string()),
            StoreError::Database(_) | StoreError::Migration(_) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn database_errors_hide_details() {
        let err = ApiError::Domain(DomainError::Store(StoreError::Database(
            sqlx::Error::PoolClosed,
        )));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn messages_pass_through_display() {
        let err = ApiError::Forbidden("operator access required".to_string());
        assert_eq!(err.to_string(), "operator access required");

        let err = ApiError::Domain(DomainError::Validation("quantity must be positive".into()));
        assert_eq!(
            err.to_string(),
            "validation error: quantity must be positive"
        );
    }

    #[test]
    fn validation_maps_to_bad_request() {
        let err = ApiError::Domain(DomainError::Validation("bad".to_string()));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
