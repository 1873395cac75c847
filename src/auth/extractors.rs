//! Axum extractors for authentication.

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::error;

use super::cookie::{ACCESS_COOKIE_NAME, get_bearer_token, get_cookie};
use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasAuthBackend;
use super::types::AuthenticatedUser;

/// Access token from the cookie, falling back to the Authorization header.
fn access_token(parts: &Parts) -> Option<&str> {
    get_cookie(&parts.headers, ACCESS_COOKIE_NAME)
        .filter(|t| !t.is_empty())
        .or_else(|| get_bearer_token(&parts.headers))
}

/// Verify the access token and load its user. Stateless apart from the
/// user lookup; no session table is consulted.
async fn authenticate_request<S>(
    parts: &Parts,
    state: &S,
) -> Result<AuthenticatedUser, AuthErrorKind>
where
    S: HasAuthBackend + Send + Sync,
{
    let token = access_token(parts).ok_or(AuthErrorKind::NotAuthenticated)?;

    let claims = state
        .jwt()
        .validate_access_token(token)
        .map_err(|_| AuthErrorKind::InvalidToken)?;

    let user = state
        .db()
        .users()
        .get_by_id(&claims.sub)
        .await
        .map_err(|e| {
            error!("Failed to get user: {}", e);
            AuthErrorKind::DatabaseError
        })?
        .ok_or(AuthErrorKind::UserNotFound)?;

    if claims.ver != user.token_version {
        return Err(AuthErrorKind::TokenRevoked);
    }

    Ok(AuthenticatedUser { claims, user })
}

/// Extractor for endpoints that require authentication.
pub struct Auth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate_request(parts, state)
            .await
            .map(Auth)
            .map_err(|kind| ApiAuthError::new(kind, state.secure_cookies()))
    }
}
