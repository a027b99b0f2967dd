//! HTTP request and response payloads.
//!
//! Field names follow the camelCase convention of the web client.

use serde::{Deserialize, Serialize};

use crate::status::Role;

/// POST /register body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub driver_license_id: Option<String>,
    /// Free-form; normalised with `Gender::from_input`.
    #[serde(default)]
    pub gender: String,
    pub senac_id: String,
}

/// POST /login body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub role: Role,
}

/// PATCH /admin/users/:userId/status body.
///
/// The status stays a raw string so that unknown values can be reported
/// with a readable message instead of a deserialization rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUserStatusRequest {
    pub status: String,
}

/// Seat count as sent by clients: either a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeatCount {
    Number(i64),
    Text(String),
}

impl SeatCount {
    pub fn value(&self) -> Option<i64> {
        match self {
            SeatCount::Number(n) => Some(*n),
            SeatCount::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// POST /create-trip body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTripRequest {
    pub from: String,
    pub to: String,
    /// `YYYY-MM-DD`
    pub departure_date: String,
    /// `HH:MM` or `HH:MM:SS`
    pub departure_time: String,
    pub spots: SeatCount,
    #[serde(default)]
    pub message: Option<String>,
}

/// GET /search-rides query string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRidesQuery {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    /// `YYYY-MM-DD`; the search window is the 24 hours from midnight UTC.
    #[serde(default)]
    pub date: Option<String>,
}

/// POST /request-ride body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRideRequest {
    pub share_id: i64,
    #[serde(default)]
    pub message: Option<String>,
}

/// PATCH /requests/:id/status body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequestStatusRequest {
    pub status: String,
}

/// Body of every error response, and of plain acknowledgements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
