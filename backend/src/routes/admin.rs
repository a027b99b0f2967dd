//! Admin API routes.
//!
//! Provides:
//! - Account verification (`PATCH /admin/users/:user_id/status`)
//! - Account listing, optionally by status (`GET /admin/users?status=`)
//!
//! Every route sits behind [`require_admin`].

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    middleware,
    routing::{get, patch},
    Json, Router,
};
use carpool_common::UpdateUserStatusRequest;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::accounts::Accounts;
use crate::auth::{require_admin, AuthUser};
use crate::error::Result;
use crate::models::User;
use crate::AppState;

fn accounts(state: &AppState) -> Accounts<'_> {
    Accounts::new(&state.store, &state.config.registration, &state.tokens)
}

/// PATCH /admin/users/:user_id/status - Approve or reject an account
async fn update_user_status(
    State(state): State<Arc<AppState>>,
    admin: AuthUser,
    user_id: std::result::Result<Path<i64>, PathRejection>,
    payload: std::result::Result<Json<UpdateUserStatusRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Path(user_id) = user_id?;
    let Json(body) = payload?;

    let user = accounts(&state).set_verification_status(user_id, &body.status)?;
    tracing::info!(
        admin_id = admin.id,
        user_id,
        status = %user.verification_status,
        "User verification status changed"
    );

    Ok(Json(json!({
        "message": "User status updated successfully",
        "user": user,
    })))
}

#[derive(Debug, Default, Deserialize)]
struct UsersQuery {
    status: Option<String>,
}

/// GET /admin/users - List accounts in registration order
async fn list_users(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<UsersQuery>, QueryRejection>,
) -> Result<Json<Vec<User>>> {
    let Query(query) = query?;
    let status = query.status.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let users = accounts(&state).list_users(status)?;
    Ok(Json(users))
}

/// Build the admin router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:user_id/status", patch(update_user_status))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .with_state(state)
}
