//! Shared error handling and response envelopes for API endpoints.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::media::MediaError;
use crate::session::SessionError;

/// Extension trait for concise error mapping on Results.
pub trait ResultExt<T> {
    fn db_err(self, msg: &str) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn db_err(self, msg: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::db_error(msg, e))
    }
}

/// API error type with automatic response conversion.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Forbidden(String),
    NotFound(String),
    Unauthorized(String),
    Conflict(String),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn db_error(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::Internal("Database error".into())
    }

    pub fn media_error(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::Internal(context.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Conflict(msg)
            | ApiError::Internal(msg) => msg,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct ErrorBody<'a> {
    pub success: bool,
    pub message: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            message: self.message(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound => ApiError::not_found(e.to_string()),
            SessionError::InvalidCredentials
            | SessionError::InvalidOldPassword
            | SessionError::MissingToken
            | SessionError::InvalidToken
            | SessionError::TokenReused => ApiError::unauthorized(e.to_string()),
            SessionError::Database(e) => ApiError::db_error("Session store failure", e),
            SessionError::Token(e) => {
                error!("Failed to issue tokens: {}", e);
                ApiError::internal("Something went wrong while generating tokens")
            }
            SessionError::Password(e) => {
                error!("Password hashing failed: {}", e);
                ApiError::internal("Password hashing failed")
            }
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(e: MediaError) -> Self {
        ApiError::media_error("Failed to upload file", e)
    }
}

/// Uniform success envelope.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub status_code: u16,
    pub data: T,
    pub message: String,
    pub success: bool,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            data,
            message: message.into(),
            success: status.is_success(),
        }
    }

    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, data, message)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

/// Validate a UUID path parameter. `what` names the resource in the error
/// message, e.g. "video".
pub fn validate_uuid(uuid: &str, what: &str) -> Result<(), ApiError> {
    if uuid.is_empty() || uuid.len() > 36 || uuid::Uuid::parse_str(uuid).is_err() {
        return Err(ApiError::bad_request(format!("Invalid {} id", what)));
    }
    Ok(())
}

/// Trim a required text field, rejecting missing or blank values.
pub fn require_field<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, ApiError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::bad_request(format!("{} is required", name))),
    }
}

/// Like `require_field` but returns the value untouched. Used for passwords,
/// where surrounding whitespace is significant.
pub fn require_secret<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::bad_request(format!("{} is required", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000", "video").is_ok());

        let err = validate_uuid("not-a-uuid", "video").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "Invalid video id");

        assert!(validate_uuid("", "video").is_err());
    }

    #[test]
    fn test_require_field() {
        assert_eq!(require_field(Some("  alice "), "username").unwrap(), "alice");
        assert!(require_field(Some("   "), "username").is_err());
        assert_eq!(
            require_field(None, "username").unwrap_err().message(),
            "username is required"
        );
    }

    #[test]
    fn test_require_secret_keeps_whitespace() {
        assert_eq!(require_secret(Some(" pw "), "password").unwrap(), " pw ");
        assert!(require_secret(Some("  "), "password").is_err());
        assert!(require_secret(None, "password").is_err());
    }

    #[test]
    fn test_session_error_statuses() {
        assert_eq!(
            ApiError::from(SessionError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
        let reused = ApiError::from(SessionError::TokenReused);
        assert_eq!(reused.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(reused.message(), "Refresh token is expired or used");
    }
}
