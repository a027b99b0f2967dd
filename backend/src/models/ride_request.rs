use carpool_common::RequestStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A rider's request to join a trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RideRequest {
    pub id: i64,
    pub share_id: i64,
    pub user_id: i64,
    pub status: RequestStatus,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ride_request_serialize() {
        let req = RideRequest {
            id: 4,
            share_id: 2,
            user_id: 3,
            status: RequestStatus::Pending,
            message: Some("Posso ir com vocês?".to_string()),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["shareId"], 2);
        assert_eq!(json["userId"], 3);
        assert_eq!(json["status"], "PENDING");
    }
}
