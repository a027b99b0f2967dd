use std::sync::Arc;

use carpool_common::{Gender, RegisterRequest, Role, VerificationStatus};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

use crate::auth::Claims;
use crate::config::{
    AuthConfig, Config, CorsConfig, DatabaseConfig, LoggingConfig, RegistrationConfig,
    ServerConfig,
};
use crate::models::{NewShare, NewUser, User};
use crate::AppState;

pub const TEST_JWT_SECRET: &str = "test-secret-do-not-use-in-production";

pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
        },
        database: DatabaseConfig {
            url: ":memory:".to_string(),
        },
        auth: AuthConfig {
            jwt_secret: TEST_JWT_SECRET.to_string(),
            token_ttl_secs: 3600,
        },
        registration: RegistrationConfig {
            admin_emails: vec![],
            ..RegistrationConfig::default()
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
        cors: CorsConfig {
            origins: "*".to_string(),
        },
    }
}

pub fn create_test_state() -> Arc<AppState> {
    Arc::new(AppState::new(test_config()).expect("Failed to open test database"))
}

/// A PENDING user whose password hash is not a real hash.
pub fn new_user(email: &str) -> NewUser {
    NewUser {
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        email: email.to_string(),
        password_hash: "not-a-real-hash".to_string(),
        driver_license: None,
        gender: Gender::Other,
        senac_id: email.to_string(),
        verification_status: VerificationStatus::Pending,
        role: Role::User,
    }
}

/// A trip from "Centro" to "Universidade" leaving tomorrow.
pub fn new_share(driver_id: i64, spots: i64) -> NewShare {
    NewShare {
        driver_id,
        origin: "Centro".to_string(),
        destination: "Universidade".to_string(),
        departure_time: Utc::now() + Duration::days(1),
        spots,
        message: None,
    }
}

pub fn sample_user(id: i64, role: Role) -> User {
    User {
        id,
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        email: format!("user{}@sp.senac.br", id),
        password_hash: "not-a-real-hash".to_string(),
        driver_license: None,
        gender: Gender::Other,
        senac_id: format!("user{}@sp.senac.br", id),
        verification_status: VerificationStatus::Approved,
        role,
        created_at: Utc::now(),
    }
}

pub fn register_request(email: &str, senac_id: &str) -> RegisterRequest {
    RegisterRequest {
        first_name: "Ana".to_string(),
        last_name: "Lima".to_string(),
        email: email.to_string(),
        password: "password123".to_string(),
        driver_license_id: None,
        gender: "feminino".to_string(),
        senac_id: senac_id.to_string(),
    }
}

pub fn generate_test_jwt(id: i64, email: &str, role: Role, secret: &str) -> String {
    let now = Utc::now();
    let claims = Claims {
        id,
        email: email.to_string(),
        role,
        iat: now.timestamp() as u64,
        exp: (now + Duration::hours(1)).timestamp() as u64,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("Failed to encode JWT")
}

pub fn generate_expired_jwt(id: i64, secret: &str) -> String {
    let now = Utc::now();
    let claims = Claims {
        id,
        email: format!("user{}@sp.senac.br", id),
        role: Role::User,
        iat: (now - Duration::hours(2)).timestamp() as u64,
        exp: (now - Duration::hours(1)).timestamp() as u64,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("Failed to encode JWT")
}

/// Insert an APPROVED user with the given role and return it with a valid token.
pub fn seed_user(state: &AppState, email: &str, role: Role) -> (User, String) {
    let user = state
        .store
        .insert_user(&NewUser {
            verification_status: VerificationStatus::Approved,
            role,
            ..new_user(email)
        })
        .expect("Failed to insert test user");
    let token = state.tokens.issue(&user).expect("Failed to issue test token");
    (user, token)
}
