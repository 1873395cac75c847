//! JWT token generation and validation.
//!
//! Access and refresh tokens are signed with distinct secrets so a leaked
//! access secret cannot be used to mint refresh tokens (and vice versa).

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived access token, never persisted
    Access,
    /// Long-lived refresh token, fingerprint persisted in the session slot
    Refresh,
}

/// JWT claims for access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user id)
    pub sub: String,
    pub username: String,
    pub email: String,
    /// The user's token version at issue time; a mismatch means revoked
    pub ver: i64,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// JWT claims for refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// JWT ID, makes two refresh tokens issued in the same second distinct
    pub jti: String,
    /// Subject (user id)
    pub sub: String,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Default access token duration: 15 minutes
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 15 * 60;

/// Default refresh token duration: 10 days
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 10 * 24 * 60 * 60;

/// Configuration for JWT operations.
#[derive(Clone)]
pub struct JwtConfig {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_duration: u64,
    refresh_duration: u64,
}

/// Result of generating an access token.
#[derive(Debug, Clone)]
pub struct AccessTokenResult {
    /// The JWT token string
    pub token: String,
    /// Token duration in seconds
    pub duration: u64,
}

/// Result of generating a refresh token.
#[derive(Debug, Clone)]
pub struct RefreshTokenResult {
    /// The JWT token string
    pub token: String,
    pub jti: String,
    /// Issued at timestamp (Unix seconds)
    pub issued_at: u64,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Token duration in seconds
    pub duration: u64,
}

pub(crate) fn unix_now() -> Result<u64, JwtError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| JwtError::TimeError)
}

impl JwtConfig {
    /// Create a new JWT configuration with default token lifetimes.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            access_duration: ACCESS_TOKEN_DURATION_SECS,
            refresh_duration: REFRESH_TOKEN_DURATION_SECS,
        }
    }

    /// Override the token lifetimes (in seconds).
    pub fn with_durations(mut self, access_secs: u64, refresh_secs: u64) -> Self {
        self.access_duration = access_secs;
        self.refresh_duration = refresh_secs;
        self
    }

    pub fn access_duration(&self) -> u64 {
        self.access_duration
    }

    pub fn refresh_duration(&self) -> u64 {
        self.refresh_duration
    }

    /// Generate an access token for a user.
    pub fn generate_access_token(
        &self,
        user_id: &str,
        username: &str,
        email: &str,
        version: i64,
    ) -> Result<AccessTokenResult, JwtError> {
        let now = unix_now()?;

        let claims = AccessClaims {
            sub: user_id.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            ver: version,
            token_type: TokenType::Access,
            iat: now,
            exp: now + self.access_duration,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.access_encoding)
            .map_err(JwtError::Encoding)?;

        Ok(AccessTokenResult {
            token,
            duration: self.access_duration,
        })
    }

    /// Generate a refresh token for a user.
    pub fn generate_refresh_token(&self, user_id: &str) -> Result<RefreshTokenResult, JwtError> {
        let now = unix_now()?;

        let jti = uuid::Uuid::new_v4().to_string();
        let exp = now + self.refresh_duration;

        let claims = RefreshClaims {
            jti: jti.clone(),
            sub: user_id.to_string(),
            token_type: TokenType::Refresh,
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.refresh_encoding)
            .map_err(JwtError::Encoding)?;

        Ok(RefreshTokenResult {
            token,
            jti,
            issued_at: now,
            expires_at: exp,
            duration: self.refresh_duration,
        })
    }

    /// Validate and decode an access token. Signature and expiry only.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims, JwtError> {
        let claims: AccessClaims = decode(token, &self.access_decoding)?;

        if claims.token_type != TokenType::Access {
            return Err(JwtError::WrongTokenType);
        }

        Ok(claims)
    }

    /// Validate and decode a refresh token. Signature and expiry only; the
    /// session slot is checked by the caller.
    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshClaims, JwtError> {
        let claims: RefreshClaims = decode(token, &self.refresh_decoding)?;

        if claims.token_type != TokenType::Refresh {
            return Err(JwtError::WrongTokenType);
        }

        Ok(claims)
    }
}

fn decode<T: serde::de::DeserializeOwned>(token: &str, key: &DecodingKey) -> Result<T, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    jsonwebtoken::decode::<T>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(JwtError::Decoding)
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Error decoding the token (bad signature, malformed, expired)
    Decoding(jsonwebtoken::errors::Error),
    /// System time error
    TimeError,
    /// Wrong token type
    WrongTokenType,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Decoding(e) => write!(f, "Failed to decode token: {}", e),
            JwtError::TimeError => write!(f, "System time error"),
            JwtError::WrongTokenType => write!(f, "Wrong token type"),
        }
    }
}

impl std::error::Error for JwtError {}
