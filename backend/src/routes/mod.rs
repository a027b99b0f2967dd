//! HTTP routes.

pub mod accounts;
pub mod admin;
pub mod health;
pub mod requests;
pub mod trips;

use std::sync::Arc;

use axum::Router;

use crate::AppState;

/// Build the API router (without the outer middleware layers).
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::router())
        .merge(accounts::router(state.clone()))
        .merge(trips::router(state.clone()))
        .merge(requests::router(state.clone()))
        .nest("/admin", admin::router(state))
}
