use chrono::{DateTime, Utc};
use serde::Serialize;

/// A trip offered by a driver.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Share {
    pub id: i64,
    pub driver_id: i64,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    /// Seats still free. Never negative.
    pub spots: i64,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Share {
    pub fn has_capacity(&self) -> bool {
        self.spots > 0
    }
}

/// Fields needed to insert a trip.
#[derive(Debug, Clone)]
pub struct NewShare {
    pub driver_id: i64,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub spots: i64,
    pub message: Option<String>,
}
