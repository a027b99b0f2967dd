//! Ride requests: creation and status transitions.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{patch, post};
use axum::{Json, Router};
use carpool_common::{RequestRideRequest, RequestStatus, UpdateRequestStatusRequest};
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::{ApiError, Result};
use crate::lifecycle::{parse_target, LifecycleError, RequestLifecycle};
use crate::models::{RideRequest, Share};
use crate::AppState;

fn no_spots() -> ApiError {
    ApiError::Conflict("No spots available for this ride".to_string())
}

/// POST /request-ride - Ask for a seat on a trip
async fn request_ride(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    payload: std::result::Result<Json<RequestRideRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>)> {
    let Json(body) = payload?;

    // Advisory only; approval re-checks the seat inside its transaction.
    let share = state.store.find_share(body.share_id)?;
    if !share.is_some_and(|s| s.has_capacity()) {
        return Err(no_spots());
    }

    let message = body.message.as_deref().map(str::trim).filter(|m| !m.is_empty());
    let request = state.store.insert_request(body.share_id, user.id, message)?;

    tracing::info!(
        request_id = request.id,
        share_id = request.share_id,
        user_id = user.id,
        "Ride requested"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Request raised successfully", "request": request })),
    ))
}

/// Only the trip's driver and the request's rider may move a request.
/// Riders can withdraw or re-open their own request but never approve it.
fn authorize_transition(
    caller: &AuthUser,
    request: &RideRequest,
    share: &Share,
    target: RequestStatus,
) -> Result<()> {
    if caller.id == share.driver_id {
        return Ok(());
    }
    if caller.id == request.user_id && target != RequestStatus::Approved {
        return Ok(());
    }
    Err(ApiError::Forbidden(
        "You are not allowed to change this request".to_string(),
    ))
}

/// PATCH /requests/:id/status - Approve, decline or reset a request
///
/// Answers 403 unless the caller drives the trip or, for any status other
/// than APPROVED, made the request.
async fn update_request_status(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    request_id: std::result::Result<Path<i64>, PathRejection>,
    payload: std::result::Result<Json<UpdateRequestStatusRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Path(request_id) = request_id?;
    let Json(body) = payload?;
    let target = parse_target(&body.status)?;

    let request = state
        .store
        .find_request(request_id)?
        .ok_or(LifecycleError::NotFound(request_id))?;
    let share = state
        .store
        .find_share(request.share_id)?
        .ok_or(LifecycleError::NotFound(request_id))?;
    authorize_transition(&user, &request, &share, target)?;

    let request = RequestLifecycle::new(&state.store).transition(request_id, target)?;

    Ok(Json(json!({
        "message": "Request status updated successfully",
        "request": request,
    })))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/request-ride", post(request_ride))
        .route("/requests/:id/status", patch(update_request_status))
        .with_state(state)
}
