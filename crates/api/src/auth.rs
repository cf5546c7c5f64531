//! Principal extraction from trusted gateway headers.
//!
//! Credential verification happens upstream; the gateway forwards the
//! authenticated principal as headers, and these extractors only read them.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use common::UserId;
use uuid::Uuid;

use crate::error::ApiError;

/// Header carrying the authenticated user's id (UUID).
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the user's active flag; absent means active.
pub const USER_ACTIVE_HEADER: &str = "x-user-active";
/// Header carrying the user's operator flag; absent means not an operator.
pub const USER_ADMIN_HEADER: &str = "x-user-admin";

/// The authenticated principal of a request.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: UserId,
    pub is_admin: bool,
}

/// An [`AuthUser`] that has been verified to be an operator.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub AuthUser);

fn header_flag(headers: &HeaderMap, name: &str) -> Option<bool> {
    let value = headers.get(name)?.to_str().ok()?;
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn extract_user(headers: &HeaderMap) -> Result<AuthUser, ApiError> {
    let raw = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing user header".to_string()))?;
    let id = Uuid::parse_str(raw)
        .map_err(|_| ApiError::Unauthorized("malformed user header".to_string()))?;

    // Absent flag means active; a present-but-false flag blocks the request.
    if !header_flag(headers, USER_ACTIVE_HEADER).unwrap_or(true) {
        return Err(ApiError::Forbidden("user is inactive".to_string()));
    }

    Ok(AuthUser {
        id: UserId::from_uuid(id),
        is_admin: header_flag(headers, USER_ADMIN_HEADER).unwrap_or(false),
    })
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        extract_user(&parts.headers)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(ApiError::Forbidden("operator access required".to_string()));
        }
        Ok(AdminUser(user))
    }
}
