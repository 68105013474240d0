use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{auth::repo_types::UserRecord, error::AuthError};

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref PASSWORD_CHARSET_RE: Regex = Regex::new(r"^[A-Za-z0-9@#$%^&+!=]{8,}$").unwrap();
    static ref LOWER_RE: Regex = Regex::new(r"[a-z]").unwrap();
    static ref UPPER_RE: Regex = Regex::new(r"[A-Z]").unwrap();
    static ref DIGIT_RE: Regex = Regex::new(r"[0-9]").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// At least 8 characters from `[A-Za-z0-9@#$%^&+!=]`, with a lowercase letter, an uppercase letter and a digit.
pub(crate) fn is_strong_password(password: &str) -> bool {
    PASSWORD_CHARSET_RE.is_match(password)
        && LOWER_RE.is_match(password)
        && UPPER_RE.is_match(password)
        && DIGIT_RE.is_match(password)
}

/// Shape rules every stored record must satisfy. Expects a trimmed name and a normalized email.
pub(crate) fn check_account_fields(display_name: &str, email: &str) -> Result<(), AuthError> {
    if display_name.is_empty() {
        return Err(AuthError::InvalidInput("display name is required".into()));
    }
    if !is_valid_email(email) {
        return Err(AuthError::InvalidInput("invalid email".into()));
    }
    Ok(())
}

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub display_name: String,
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl RegisterRequest {
    /// Password policy for new accounts. An empty password is left to the service,
    /// which reports it as `MissingPassword` after the duplicate check.
    pub fn validate(&self) -> Result<(), AuthError> {
        if !self.password.is_empty() && !is_strong_password(&self.password) {
            return Err(AuthError::InvalidInput(
                "password needs 8+ characters with upper and lower case letters and a digit".into(),
            ));
        }
        Ok(())
    }
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Generic envelope for successful responses.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Created,
    Success,
}

#[derive(Debug)]
pub struct Registered {
    pub status: Status,
    pub id: Uuid,
}

/// Response data returned after login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub status: Status,
    pub user: PublicUser,
    pub token: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub display_name: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<UserRecord> for PublicUser {
    fn from(u: UserRecord) -> Self {
        Self {
            id: u.id,
            display_name: u.display_name,
            email: u.email,
            created_at: u.created_at,
        }
    }
}

/// What a signed-in user sees about themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub email: String,
    pub display_name: String,
}
