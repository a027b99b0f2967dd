//! Registration and login.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use carpool_common::{LoginRequest, LoginResponse, RegisterRequest};
use serde_json::{json, Value};

use crate::accounts::{AccountError, Accounts};
use crate::error::{ApiError, Result};
use crate::AppState;

/// Run account work off the async runtime; argon2 is deliberately slow.
async fn blocking<T, F>(state: Arc<AppState>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Accounts<'_>) -> std::result::Result<T, AccountError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let accounts = Accounts::new(&state.store, &state.config.registration, &state.tokens);
        f(&accounts)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Account task failed: {}", e)))?
    .map_err(ApiError::from)
}

/// POST /register - Create a PENDING account
async fn register(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>)> {
    let Json(body) = payload?;
    let user = blocking(state, move |accounts| accounts.register(body)).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User registered successfully", "user": user })),
    ))
}

/// POST /login - Exchange credentials for an access token
async fn login(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>> {
    let Json(body) = payload?;
    let response = blocking(state, move |accounts| accounts.login(&body)).await?;
    Ok(Json(response))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .with_state(state)
}
