//! Cookie helpers for the session tokens.

use axum::http::{HeaderMap, header};

/// Cookie carrying the access token.
pub const ACCESS_COOKIE_NAME: &str = "accessToken";

/// Cookie carrying the refresh token.
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Extract a bearer token from the Authorization header.
pub fn get_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Build a Set-Cookie value for a token cookie.
pub fn token_cookie(name: &str, value: &str, max_age: u64, secure: bool) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}{}",
        name,
        value,
        max_age,
        if secure { "; Secure" } else { "" }
    )
}

/// Build a Set-Cookie value that removes a token cookie.
pub fn clear_cookie(name: &str, secure: bool) -> String {
    token_cookie(name, "", 0, secure)
}
