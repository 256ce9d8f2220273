//! Custom error types for the RBAC service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use std::fmt;
use thiserror::Error;

use crate::permissions::Permission;

/// The permission requirement a rejected request failed to meet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RequiredPermissions {
    /// A single permission, reported as a plain string
    One(Permission),
    /// Any one of several, reported as an array
    AnyOf(Vec<Permission>),
}

impl fmt::Display for RequiredPermissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequiredPermissions::One(permission) => write!(f, "{}", permission),
            RequiredPermissions::AnyOf(permissions) => {
                let names: Vec<&str> = permissions.iter().map(|p| p.as_str()).collect();
                write!(f, "any of [{}]", names.join(", "))
            }
        }
    }
}

/// Custom error type for the RBAC service
#[derive(Error, Debug)]
pub enum ApiError {
    /// No identity was supplied with the request
    #[error("Authentication required")]
    AuthenticationRequired,

    /// The identity does not resolve to an active user
    #[error("User not found or inactive")]
    UserUnresolvable,

    /// The user lacks the required permission(s)
    #[error("Insufficient permissions: {required}")]
    PermissionDenied { required: RequiredPermissions },

    /// Bad request with message
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Missing resource
    #[error("Not found: {0}")]
    NotFound(String),

    /// Uniqueness conflict
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] common::error::DatabaseError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::AuthenticationRequired => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "Authentication required" }),
            ),
            ApiError::UserUnresolvable => (
                StatusCode::FORBIDDEN,
                json!({ "error": "User not found or inactive" }),
            ),
            ApiError::PermissionDenied { required } => (
                StatusCode::FORBIDDEN,
                json!({
                    "error": "Insufficient permissions",
                    "required": required,
                }),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            ApiError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Database error" }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn render(error: ApiError) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_authentication_required_is_401() {
        let (status, body) = render(ApiError::AuthenticationRequired).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Authentication required");
    }

    #[tokio::test]
    async fn test_permission_denied_names_single_permission() {
        let (status, body) = render(ApiError::PermissionDenied {
            required: RequiredPermissions::One(Permission::ManageUsers),
        })
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Insufficient permissions");
        assert_eq!(body["required"], "manage_users");
    }

    #[tokio::test]
    async fn test_permission_denied_names_every_alternative() {
        let (status, body) = render(ApiError::PermissionDenied {
            required: RequiredPermissions::AnyOf(vec![
                Permission::ManageRoles,
                Permission::ManageUsers,
            ]),
        })
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["required"], serde_json::json!(["manage_roles", "manage_users"]));
    }

    #[tokio::test]
    async fn test_storage_details_are_not_leaked() {
        let error = ApiError::Database(common::error::DatabaseError::Configuration(
            "postgres://admin:secret@db".to_string(),
        ));
        let (status, body) = render(error).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Database error");
        assert!(!body.to_string().contains("secret"));
    }
}
