use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::repo::StoreError;

/// Every way an account operation can fail.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("please enter email and password")]
    MissingCredentials,

    #[error("password is required")]
    MissingPassword,

    #[error("this email already has an account")]
    DuplicateEmail,

    #[error("email not found")]
    EmailNotFound,

    #[error("invalid password")]
    InvalidPassword,

    #[error("user not found")]
    UserNotFound,

    #[error("token expired")]
    TokenExpired,

    #[error("invalid token")]
    TokenInvalid,

    #[error("store unavailable")]
    StoreUnavailable,

    #[error("{0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingCredentials
            | Self::MissingPassword
            | Self::DuplicateEmail
            | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::EmailNotFound | Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::InvalidPassword => StatusCode::FORBIDDEN,
            Self::TokenExpired | Self::TokenInvalid => StatusCode::UNAUTHORIZED,
            Self::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "MISSING_CREDENTIALS",
            Self::MissingPassword => "MISSING_PASSWORD",
            Self::DuplicateEmail => "DUPLICATE_EMAIL",
            Self::EmailNotFound => "EMAIL_NOT_FOUND",
            Self::InvalidPassword => "INVALID_PASSWORD",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::TokenInvalid => "TOKEN_INVALID",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => Self::DuplicateEmail,
            StoreError::Rejected(reason) => {
                tracing::warn!(reason = %reason, "user store rejected record");
                Self::InvalidInput(reason)
            }
            other => {
                tracing::error!(error = %other, "user store failure");
                Self::StoreUnavailable
            }
        }
    }
}

impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: u16,
    code: &'static str,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // internal details stay in the logs
        let message = match &self {
            Self::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        };
        let body = ErrorBody {
            status: status.as_u16(),
            code: self.error_code(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_account_api() {
        assert_eq!(AuthError::MissingCredentials.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::DuplicateEmail.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::EmailNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AuthError::InvalidPassword.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::TokenExpired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::StoreUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn store_errors_collapse_to_unavailable_except_duplicates() {
        assert!(matches!(
            AuthError::from(StoreError::DuplicateEmail),
            AuthError::DuplicateEmail
        ));
        assert!(matches!(
            AuthError::from(StoreError::Timeout),
            AuthError::StoreUnavailable
        ));
        assert!(matches!(
            AuthError::from(StoreError::Unavailable("connection reset".into())),
            AuthError::StoreUnavailable
        ));
    }

    #[test]
    fn constraint_rejections_are_client_errors() {
        let err = AuthError::from(StoreError::Rejected("check constraint".into()));
        assert!(matches!(err, AuthError::InvalidInput(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn internal_errors_do_not_leak_details() {
        let res = AuthError::Internal("argon2 blew up".into()).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("INTERNAL_ERROR"));
        assert!(!text.contains("argon2"));
    }
}
