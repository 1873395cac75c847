//! Authentication error types.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use super::cookie::{ACCESS_COOKIE_NAME, clear_cookie};
use crate::api::ErrorBody;

/// Why a request failed authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    NotAuthenticated,
    InvalidToken,
    /// Token carries an outdated `token_version`
    TokenRevoked,
    UserNotFound,
    DatabaseError,
}

/// API authentication error. Renders the error envelope and clears a rejected
/// access cookie. The refresh cookie is kept so the client can still refresh.
#[derive(Debug)]
pub struct ApiAuthError {
    pub(super) kind: AuthErrorKind,
    pub(super) secure_cookies: bool,
}

impl ApiAuthError {
    pub(super) fn new(kind: AuthErrorKind, secure_cookies: bool) -> Self {
        Self {
            kind,
            secure_cookies,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self.kind {
            AuthErrorKind::NotAuthenticated
            | AuthErrorKind::InvalidToken
            | AuthErrorKind::TokenRevoked
            | AuthErrorKind::UserNotFound => StatusCode::UNAUTHORIZED,
            AuthErrorKind::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::NotAuthenticated => "Unauthorized request",
            AuthErrorKind::InvalidToken => "Invalid access token",
            AuthErrorKind::TokenRevoked => "Access token has been revoked",
            AuthErrorKind::UserNotFound => "Invalid access token",
            AuthErrorKind::DatabaseError => "Database error",
        }
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        let mut response = (
            self.status_code(),
            Json(ErrorBody {
                success: false,
                message: self.message(),
            }),
        )
            .into_response();

        if matches!(
            self.kind,
            AuthErrorKind::NotAuthenticated | AuthErrorKind::DatabaseError
        ) {
            return response;
        }

        if let Ok(value) =
            HeaderValue::from_str(&clear_cookie(ACCESS_COOKIE_NAME, self.secure_cookies))
        {
            response.headers_mut().append(header::SET_COOKIE, value);
        }

        response
    }
}
