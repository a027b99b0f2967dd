//! Authentication and authorization.
//!
//! Handlers take an [`AuthUser`] argument to require a valid token. Admin
//! routes are additionally wrapped in [`require_admin`].

pub mod password;
pub mod token;

use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use carpool_common::Role;

use crate::error::ApiError;
use crate::AppState;

pub use password::{hash_password, verify_password, PasswordError};
pub use token::{Claims, TokenService};

/// Authenticated caller, decoded from the access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingHeader,
    #[error("Invalid Authorization header format")]
    InvalidFormat,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Access denied: admin role required")]
    AdminRequired,
    #[error("Token creation failed: {0}")]
    TokenCreation(String),
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Already verified by require_admin.
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let state = Arc::<AppState>::from_ref(state);
        Ok(state.tokens.authenticate(&parts.headers)?)
    }
}

/// Middleware that requires an authenticated admin user.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = state.tokens.authenticate(request.headers())?;

    if !user.is_admin() {
        tracing::warn!(user_id = user.id, "Non-admin user denied access to admin route");
        return Err(AuthError::AdminRequired.into());
    }

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_user_is_admin() {
        let admin = AuthUser {
            id: 1,
            email: "admin@sp.senac.br".to_string(),
            role: Role::Admin,
        };
        let user = AuthUser {
            role: Role::User,
            ..admin.clone()
        };
        assert!(admin.is_admin());
        assert!(!user.is_admin());
    }

    #[test]
    fn test_auth_error_messages() {
        assert_eq!(AuthError::MissingHeader.to_string(), "Missing Authorization header");
        assert!(AuthError::InvalidToken("expired".to_string())
            .to_string()
            .contains("expired"));
    }
}
