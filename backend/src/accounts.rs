//! Registration, login and admin verification of user accounts.

use carpool_common::{
    Gender, LoginRequest, LoginResponse, ParseStatusError, RegisterRequest, Role,
    VerificationStatus,
};

use crate::auth::{hash_password, verify_password, AuthError, PasswordError, TokenService};
use crate::config::RegistrationConfig;
use crate::models::{NewUser, User};
use crate::store::{Store, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid institutional ID: it must end with an allowed institutional domain")]
    InvalidInstitutionId,

    #[error("User already exists")]
    EmailTaken,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("User not approved. Contact an administrator.")]
    NotApproved,

    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("{0}")]
    InvalidStatus(#[from] ParseStatusError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AccountError::EmailTaken,
            other => AccountError::Store(other),
        }
    }
}

pub struct Accounts<'a> {
    store: &'a Store,
    registration: &'a RegistrationConfig,
    tokens: &'a TokenService,
}

impl<'a> Accounts<'a> {
    pub fn new(
        store: &'a Store,
        registration: &'a RegistrationConfig,
        tokens: &'a TokenService,
    ) -> Self {
        Self {
            store,
            registration,
            tokens,
        }
    }

    /// Create a PENDING account. Configured admin emails start APPROVED with the ADMIN role.
    pub fn register(&self, request: RegisterRequest) -> Result<User, AccountError> {
        let first_name = required(&request.first_name, "firstName")?;
        let last_name = required(&request.last_name, "lastName")?;
        let email = required(&request.email, "email")?.to_lowercase();
        let senac_id = required(&request.senac_id, "senacId")?;
        if request.password.is_empty() {
            return Err(AccountError::MissingField("password"));
        }

        if !self.registration.is_allowed_institution_id(&senac_id) {
            return Err(AccountError::InvalidInstitutionId);
        }

        if self.store.find_user_by_email(&email)?.is_some() {
            return Err(AccountError::EmailTaken);
        }

        let (role, verification_status) = if self.registration.is_admin_email(&email) {
            (Role::Admin, VerificationStatus::Approved)
        } else {
            (Role::User, VerificationStatus::Pending)
        };

        let user = self.store.insert_user(&NewUser {
            first_name,
            last_name,
            email,
            password_hash: hash_password(&request.password)?,
            driver_license: request
                .driver_license_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty()),
            gender: Gender::from_input(&request.gender),
            senac_id,
            verification_status,
            role,
        })?;

        tracing::info!(user_id = user.id, role = %user.role, "Registered new user");
        Ok(user)
    }

    /// Check credentials and issue an access token for an approved account.
    pub fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AccountError> {
        let email = request.email.trim().to_lowercase();
        let user = self
            .store
            .find_user_by_email(&email)?
            .ok_or(AccountError::InvalidCredentials)?;

        if !verify_password(&request.password, &user.password_hash) {
            return Err(AccountError::InvalidCredentials);
        }

        if !user.verification_status.can_login() {
            tracing::debug!(user_id = user.id, status = %user.verification_status, "Login refused");
            return Err(AccountError::NotApproved);
        }

        let token = self.tokens.issue(&user)?;
        Ok(LoginResponse {
            message: "Login successful".to_string(),
            token,
            role: user.role,
        })
    }

    pub fn set_verification_status(&self, user_id: i64, status: &str) -> Result<User, AccountError> {
        let status: VerificationStatus = status.parse()?;
        let user = self
            .store
            .update_user_status(user_id, status)?
            .ok_or(AccountError::UserNotFound(user_id))?;

        tracing::info!(user_id, status = %status, "Updated verification status");
        Ok(user)
    }

    pub fn list_users(&self, status: Option<&str>) -> Result<Vec<User>, AccountError> {
        let status = status
            .map(str::parse::<VerificationStatus>)
            .transpose()?;
        Ok(self.store.list_users(status)?)
    }
}

fn required(value: &str, field: &'static str) -> Result<String, AccountError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AccountError::MissingField(field));
    }
    Ok(value.to_string())
}
