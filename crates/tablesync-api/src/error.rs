//! tablesync — API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tablesync_core::error::DomainError;
use thiserror::Error;

/// Startup and runtime errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer rejection.
#[derive(Debug)]
pub enum ApiError {
    /// The request carried no usable identity.
    Unauthenticated(String),
    /// A domain rule rejected the request.
    Domain(DomainError),
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Unauthenticated(message) => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    error: "UNAUTHENTICATED",
                    message,
                },
            ),
            ApiError::Domain(err) => (
                status_for(&err),
                ErrorBody {
                    error: err.code(),
                    message: err.client_message(),
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

fn status_for(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Validation(_) | DomainError::ConflictingModifier => StatusCode::BAD_REQUEST,
        DomainError::NotAMember(_) => StatusCode::FORBIDDEN,
        DomainError::AlreadyInSession(_) | DomainError::InvalidTransition(_) => {
            StatusCode::CONFLICT
        }
        DomainError::SessionNotFound(_) | DomainError::ConnectionNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        DomainError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        DomainError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablesync_core::id::SessionId;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_unauthenticated_maps_to_401() {
        assert_eq!(
            status_of(ApiError::Unauthenticated("missing x-user-id".into())),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_validation_maps_to_400() {
        assert_eq!(
            status_of(DomainError::Validation("bad input".into()).into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_session_not_found_maps_to_404() {
        assert_eq!(
            status_of(DomainError::SessionNotFound(SessionId::new()).into()),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_rate_limited_maps_to_429() {
        assert_eq!(
            status_of(DomainError::RateLimited.into()),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_infrastructure_maps_to_500() {
        assert_eq!(
            status_of(DomainError::Infrastructure("store down".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
