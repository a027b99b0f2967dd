use carpool_common::{Gender, Role, VerificationStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A registered account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Argon2 PHC string; never leaves the server.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub driver_license: Option<String>,
    pub gender: Gender,
    /// Institutional identifier, checked against the allowed domains.
    pub senac_id: String,
    pub verification_status: VerificationStatus,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Fields needed to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub driver_license: Option<String>,
    pub gender: Gender,
    pub senac_id: String,
    pub verification_status: VerificationStatus,
    pub role: Role,
}
