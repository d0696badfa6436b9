use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::{models::TeamDocumentEntity, storage::StorageError},
    dto::envelope::{CODE_AUTH_REQUIRED, CODE_STALE_DATA},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// PIN token missing, invalid, or expired.
    #[error("invalid or expired access token")]
    AuthRequired,
    /// The caller's snapshot is older than the stored one; the write was
    /// rejected and the current server state is attached.
    #[error("server has newer data (lastModified {server_last_modified})")]
    Stale {
        server_last_modified: u64,
        snapshot: TeamDocumentEntity,
    },
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// An external upstream call (fixture API, insights model) failed.
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::InvalidInput(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses carrying the
/// `{success: false, error, ...}` envelope every action returns on failure.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// PIN token missing, invalid, or expired.
    #[error("unauthorized")]
    AuthRequired,
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Write rejected because the caller's snapshot is stale.
    #[error("stale data")]
    Stale {
        server_last_modified: u64,
        snapshot: TeamDocumentEntity,
    },
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::AuthRequired => AppError::AuthRequired,
            ServiceError::Stale {
                server_last_modified,
                snapshot,
            } => AppError::Stale {
                server_last_modified,
                snapshot,
            },
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Upstream(message) => AppError::ServiceUnavailable(message),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, payload) = match &self {
            AppError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "error": message }),
            ),
            AppError::AuthRequired => (
                StatusCode::UNAUTHORIZED,
                json!({
                    "success": false,
                    "error": CODE_AUTH_REQUIRED,
                    "message": "Invalid or expired access token",
                }),
            ),
            AppError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                json!({ "success": false, "error": message }),
            ),
            AppError::Stale {
                server_last_modified,
                snapshot,
            } => (
                StatusCode::CONFLICT,
                json!({
                    "success": false,
                    "error": CODE_STALE_DATA,
                    "message": "Server has newer data. Please refresh before saving.",
                    "lastModified": server_last_modified,
                    "teamData": snapshot,
                }),
            ),
            AppError::ServiceUnavailable(message) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "success": false, "error": message }),
            ),
            AppError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "success": false, "error": message }),
            ),
        };

        (status, Json(payload)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_service_error_keeps_snapshot_through_conversion() {
        let err = ServiceError::Stale {
            server_last_modified: 150,
            snapshot: TeamDocumentEntity::default(),
        };
        match AppError::from(err) {
            AppError::Stale {
                server_last_modified,
                ..
            } => assert_eq!(server_last_modified, 150),
            other => panic!("unexpected conversion: {other:?}"),
        }
    }

    #[test]
    fn storage_error_maps_to_unavailable() {
        let storage = StorageError::unavailable("boom".into(), std::io::Error::other("down"));
        let err = ServiceError::from(storage);
        assert!(matches!(err, ServiceError::Unavailable(_)));
    }
}
