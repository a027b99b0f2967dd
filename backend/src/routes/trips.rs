//! Trip creation, search and the caller's trip listings.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use carpool_common::{CreateTripRequest, MessageResponse, SearchRidesQuery};
use chrono::{NaiveDate, NaiveTime};
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::{ApiError, Result};
use crate::models::NewShare;
use crate::queries::{DrivingTrip, IncomingRequest, RidingRequest, SearchCriteria, SearchResult, TripQueries};
use crate::store::is_storable;
use crate::AppState;

/// Validate a create-trip body into a share owned by `driver_id`.
fn new_share(driver_id: i64, body: CreateTripRequest) -> Result<NewShare> {
    let origin = body.from.trim();
    let destination = body.to.trim();
    if origin.is_empty() || destination.is_empty() {
        return Err(ApiError::Validation(
            "Origin and destination are required".to_string(),
        ));
    }

    let date = NaiveDate::parse_from_str(body.departure_date.trim(), "%Y-%m-%d").map_err(|_| {
        ApiError::Validation(format!("Invalid departure date: {}", body.departure_date))
    })?;
    let raw_time = body.departure_time.trim();
    let time = NaiveTime::parse_from_str(raw_time, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw_time, "%H:%M:%S"))
        .map_err(|_| {
            ApiError::Validation(format!("Invalid departure time: {}", body.departure_time))
        })?;

    let departure_time = date.and_time(time).and_utc();
    if !is_storable(&departure_time) {
        return Err(ApiError::Validation(format!(
            "Invalid departure date: {}",
            body.departure_date
        )));
    }

    let spots = match body.spots.value() {
        Some(n) if n > 0 => n,
        _ => {
            return Err(ApiError::Validation(
                "Spots must be a positive integer".to_string(),
            ))
        }
    };

    let message = body
        .message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());

    Ok(NewShare {
        driver_id,
        origin: origin.to_string(),
        destination: destination.to_string(),
        departure_time,
        spots,
        message,
    })
}

/// POST /create-trip - Offer a trip driven by the caller
async fn create_trip(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    payload: std::result::Result<Json<CreateTripRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>)> {
    let Json(body) = payload?;
    let share = state.store.insert_share(&new_share(user.id, body)?)?;

    tracing::info!(
        share_id = share.id,
        driver_id = user.id,
        spots = share.spots,
        "Trip created"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Trip created successfully", "trip": share })),
    ))
}

/// GET /search-rides - Trips with free seats matching origin, destination and day
async fn search_rides(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    query: std::result::Result<Query<SearchRidesQuery>, QueryRejection>,
) -> Result<Json<Vec<SearchResult>>> {
    let Query(query) = query?;
    let criteria = SearchCriteria::from_query(&query)?;
    Ok(Json(TripQueries::new(&state.store).search(&criteria)?))
}

/// GET /trips/driving
async fn driving(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<DrivingTrip>>> {
    Ok(Json(TripQueries::new(&state.store).driving(user.id)?))
}

/// GET /trips/ride-requests
async fn ride_requests(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<IncomingRequest>>> {
    Ok(Json(TripQueries::new(&state.store).ride_requests(user.id)?))
}

/// GET /trips/riding
async fn riding(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<RidingRequest>>> {
    Ok(Json(TripQueries::new(&state.store).riding(user.id)?))
}

/// GET /protected/share - Token probe used by the web client
async fn protected_share(_user: AuthUser) -> Json<MessageResponse> {
    Json(MessageResponse::new("You can access this route!"))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/create-trip", post(create_trip))
        .route("/search-rides", get(search_rides))
        .route("/trips/driving", get(driving))
        .route("/trips/ride-requests", get(ride_requests))
        .route("/trips/riding", get(riding))
        .route("/protected/share", get(protected_share))
        .with_state(state)
}
