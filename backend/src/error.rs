//! HTTP-facing error type.
//!
//! Module errors convert into [`ApiError`], which renders as
//! `{ "message": ... }` with the matching status code.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use carpool_common::MessageResponse;

use crate::accounts::AccountError;
use crate::auth::AuthError;
use crate::lifecycle::LifecycleError;
use crate::queries::InvalidDate;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Request conflicts with current state (duplicate email, trip full).
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    /// Detail is logged, never sent to the client.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            ApiError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(MessageResponse::new(message))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::InvalidArgument(_) => ApiError::Validation("Invalid status".to_string()),
            LifecycleError::NotFound(_) => ApiError::NotFound("Request not found".to_string()),
            LifecycleError::NoCapacity(_) => {
                ApiError::Conflict("No spots available for this ride".to_string())
            }
            LifecycleError::Store(e) => e.into(),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::MissingField(_)
            | AccountError::InvalidInstitutionId
            | AccountError::InvalidStatus(_) => ApiError::Validation(err.to_string()),
            AccountError::EmailTaken => ApiError::Conflict(err.to_string()),
            // Same message for unknown email and wrong password.
            AccountError::InvalidCredentials => {
                ApiError::Validation("Invalid email or password".to_string())
            }
            AccountError::NotApproved => ApiError::Forbidden(err.to_string()),
            AccountError::UserNotFound(_) => ApiError::NotFound("User not found".to_string()),
            AccountError::Password(_) => ApiError::Internal(err.to_string()),
            AccountError::Auth(e) => e.into(),
            AccountError::Store(e) => e.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingHeader | AuthError::InvalidFormat => {
                ApiError::Unauthorized("Access Denied".to_string())
            }
            AuthError::InvalidToken(_) => ApiError::Forbidden("Invalid Token".to_string()),
            AuthError::AdminRequired => ApiError::Forbidden(err.to_string()),
            AuthError::TokenCreation(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<InvalidDate> for ApiError {
    fn from(err: InvalidDate) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
