//! Login, refresh-token rotation, logout and password changes.
//!
//! A user has one session slot holding the sha256 fingerprint of the live
//! refresh token. Login overwrites the slot, refresh swaps it with a
//! compare-and-swap, logout clears it. A refresh token whose fingerprint is
//! no longer in the slot is rejected even when its signature is valid.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::db::{Database, User};
use crate::jwt::{AccessTokenResult, JwtConfig, JwtError, RefreshTokenResult};
use crate::password::{PasswordError, PasswordHasher};

/// Hex-encoded sha256 of a refresh token, as stored in the session slot.
pub fn fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access: AccessTokenResult,
    pub refresh: RefreshTokenResult,
}

/// How a user identifies themselves at login. At least one field is set.
#[derive(Debug, Clone, Copy)]
pub struct LoginIdentifier<'a> {
    pub username: Option<&'a str>,
    pub email: Option<&'a str>,
}

#[derive(Clone)]
pub struct SessionManager {
    db: Database,
    jwt: Arc<JwtConfig>,
    hasher: PasswordHasher,
    revoke_on_password_change: bool,
}

impl SessionManager {
    pub fn new(db: Database, jwt: Arc<JwtConfig>, hasher: PasswordHasher) -> Self {
        Self {
            db,
            jwt,
            hasher,
            revoke_on_password_change: false,
        }
    }

    /// Also revoke existing sessions and access tokens when a password changes.
    pub fn revoke_on_password_change(mut self, enabled: bool) -> Self {
        self.revoke_on_password_change = enabled;
        self
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    /// Verify credentials and start a new session, replacing any previous one.
    pub async fn login(
        &self,
        identifier: LoginIdentifier<'_>,
        password: &str,
    ) -> Result<(User, IssuedTokens), SessionError> {
        let user = self
            .db
            .users()
            .find_by_username_or_email(identifier.username, identifier.email)
            .await?
            .ok_or(SessionError::NotFound)?;

        if !self.hasher.verify(password, &user.password_hash).await? {
            info!(user_id = %user.id, "Login rejected: wrong password");
            return Err(SessionError::InvalidCredentials);
        }

        let tokens = self.issue(&user)?;
        self.db
            .sessions()
            .replace(
                &user.id,
                &fingerprint(&tokens.refresh.token),
                tokens.refresh.expires_at,
            )
            .await?;

        info!(user_id = %user.id, username = %user.username, "User logged in");
        Ok((user, tokens))
    }

    /// Exchange a live refresh token for a new pair. The presented token
    /// becomes unusable.
    pub async fn refresh(&self, token: Option<&str>) -> Result<(User, IssuedTokens), SessionError> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(SessionError::MissingToken)?;

        let claims = self
            .jwt
            .validate_refresh_token(token)
            .map_err(|_| SessionError::InvalidToken)?;

        let user = self
            .db
            .users()
            .get_by_id(&claims.sub)
            .await?
            .ok_or(SessionError::NotFound)?;

        let tokens = self.issue(&user)?;
        let rotated = self
            .db
            .sessions()
            .rotate(
                &user.id,
                &fingerprint(token),
                &fingerprint(&tokens.refresh.token),
                tokens.refresh.expires_at,
            )
            .await?;

        if !rotated {
            warn!(user_id = %user.id, jti = %claims.jti, "Refresh token reuse rejected");
            return Err(SessionError::TokenReused);
        }

        debug!(user_id = %user.id, "Refresh token rotated");
        Ok((user, tokens))
    }

    /// End the user's session. Outstanding access tokens expire naturally.
    pub async fn logout(&self, user_id: &str) -> Result<(), SessionError> {
        let cleared = self.db.sessions().clear(user_id).await?;
        info!(user_id = %user_id, had_session = cleared, "User logged out");
        Ok(())
    }

    pub async fn change_password(
        &self,
        user: &User,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), SessionError> {
        if !self.hasher.verify(old_password, &user.password_hash).await? {
            return Err(SessionError::InvalidOldPassword);
        }

        let hash = self.hasher.hash(new_password).await?;
        self.db.users().update_password(&user.id, &hash).await?;

        if self.revoke_on_password_change {
            self.db.users().bump_token_version(&user.id).await?;
            self.db.sessions().clear(&user.id).await?;
        }

        info!(
            user_id = %user.id,
            revoked = self.revoke_on_password_change,
            "Password changed"
        );
        Ok(())
    }

    fn issue(&self, user: &User) -> Result<IssuedTokens, SessionError> {
        let access = self.jwt.generate_access_token(
            &user.id,
            &user.username,
            &user.email,
            user.token_version,
        )?;
        let refresh = self.jwt.generate_refresh_token(&user.id)?;
        Ok(IssuedTokens { access, refresh })
    }
}

#[derive(Debug)]
pub enum SessionError {
    /// No user matches the identifier or token subject
    NotFound,
    InvalidCredentials,
    InvalidOldPassword,
    MissingToken,
    /// Refresh token failed signature, expiry or type checks
    InvalidToken,
    /// Refresh token is valid but no longer in the session slot
    TokenReused,
    Database(sqlx::Error),
    Token(JwtError),
    Password(PasswordError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::NotFound => write!(f, "User does not exist"),
            SessionError::InvalidCredentials => write!(f, "Invalid user credentials"),
            SessionError::InvalidOldPassword => write!(f, "Invalid old password"),
            SessionError::MissingToken => write!(f, "Unauthorized request"),
            SessionError::InvalidToken => write!(f, "Invalid refresh token"),
            SessionError::TokenReused => write!(f, "Refresh token is expired or used"),
            SessionError::Database(e) => write!(f, "Database error: {}", e),
            SessionError::Token(e) => write!(f, "{}", e),
            SessionError::Password(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<sqlx::Error> for SessionError {
    fn from(e: sqlx::Error) -> Self {
        SessionError::Database(e)
    }
}

impl From<JwtError> for SessionError {
    fn from(e: JwtError) -> Self {
        SessionError::Token(e)
    }
}

impl From<PasswordError> for SessionError {
    fn from(e: PasswordError) -> Self {
        SessionError::Password(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewUser;

    async fn setup() -> (SessionManager, Database, String) {
        let db = Database::open(":memory:").await.unwrap();
        let jwt = Arc::new(JwtConfig::new(
            b"access-secret-for-testing",
            b"refresh-secret-for-testing",
        ));
        let hasher = PasswordHasher::new(4);
        let hash = hasher.hash("pw1").await.unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        db.users()
            .create(&NewUser {
                id: &id,
                username: "alice",
                email: "alice@x.com",
                fullname: "Alice",
                password_hash: &hash,
                avatar_url: "https://media/avatar.png",
                avatar_public_id: "avatar",
                cover_image_url: None,
                cover_image_public_id: None,
            })
            .await
            .unwrap();

        (SessionManager::new(db.clone(), jwt, hasher), db, id)
    }

    fn by_username(username: &str) -> LoginIdentifier<'_> {
        LoginIdentifier {
            username: Some(username),
            email: None,
        }
    }

    #[test]
    fn test_fingerprint_is_stable_hex() {
        let a = fingerprint("token");
        assert_eq!(a.len(), 64);
        assert_eq!(a, fingerprint("token"));
        assert_ne!(a, fingerprint("other"));
    }

    #[tokio::test]
    async fn test_login_stores_fingerprint_only() {
        let (sessions, db, id) = setup().await;

        let (user, tokens) = sessions.login(by_username("alice"), "pw1").await.unwrap();
        assert_eq!(user.id, id);

        let slot = db.sessions().get(&id).await.unwrap().unwrap();
        assert_eq!(slot.token_hash, fingerprint(&tokens.refresh.token));
        assert_ne!(slot.token_hash, tokens.refresh.token);
    }

    #[tokio::test]
    async fn test_login_by_email() {
        let (sessions, _db, id) = setup().await;
        let identifier = LoginIdentifier {
            username: None,
            email: Some("alice@x.com"),
        };
        let (user, _) = sessions.login(identifier, "pw1").await.unwrap();
        assert_eq!(user.id, id);
    }

    #[tokio::test]
    async fn test_login_failures() {
        let (sessions, _db, _id) = setup().await;

        assert!(matches!(
            sessions.login(by_username("bob"), "pw1").await,
            Err(SessionError::NotFound)
        ));
        assert!(matches!(
            sessions.login(by_username("alice"), "wrong").await,
            Err(SessionError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_refresh_succeeds_exactly_once() {
        let (sessions, _db, _id) = setup().await;
        let (_, tokens) = sessions.login(by_username("alice"), "pw1").await.unwrap();

        let (_, rotated) = sessions
            .refresh(Some(&tokens.refresh.token))
            .await
            .unwrap();
        assert_ne!(rotated.refresh.token, tokens.refresh.token);

        assert!(matches!(
            sessions.refresh(Some(&tokens.refresh.token)).await,
            Err(SessionError::TokenReused)
        ));

        // The rotated token is still live
        sessions.refresh(Some(&rotated.refresh.token)).await.unwrap();
    }

    #[tokio::test]
    async fn test_second_login_invalidates_first_session() {
        let (sessions, _db, _id) = setup().await;
        let (_, first) = sessions.login(by_username("alice"), "pw1").await.unwrap();
        let (_, second) = sessions.login(by_username("alice"), "pw1").await.unwrap();

        assert!(matches!(
            sessions.refresh(Some(&first.refresh.token)).await,
            Err(SessionError::TokenReused)
        ));
        sessions.refresh(Some(&second.refresh.token)).await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_refresh_has_one_winner() {
        let (sessions, _db, _id) = setup().await;
        let (_, tokens) = sessions.login(by_username("alice"), "pw1").await.unwrap();

        let token = tokens.refresh.token.clone();
        let (a, b) = tokio::join!(
            sessions.refresh(Some(&token)),
            sessions.refresh(Some(&token))
        );

        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    }

    #[tokio::test]
    async fn test_logout_blocks_refresh() {
        let (sessions, _db, id) = setup().await;
        let (_, tokens) = sessions.login(by_username("alice"), "pw1").await.unwrap();

        sessions.logout(&id).await.unwrap();

        assert!(matches!(
            sessions.refresh(Some(&tokens.refresh.token)).await,
            Err(SessionError::TokenReused)
        ));
    }

    #[tokio::test]
    async fn test_refresh_rejects_missing_and_invalid_tokens() {
        let (sessions, _db, _id) = setup().await;

        assert!(matches!(
            sessions.refresh(None).await,
            Err(SessionError::MissingToken)
        ));
        assert!(matches!(
            sessions.refresh(Some("")).await,
            Err(SessionError::MissingToken)
        ));
        assert!(matches!(
            sessions.refresh(Some("garbage")).await,
            Err(SessionError::InvalidToken)
        ));

        // An access token is not a refresh token
        let (_, tokens) = sessions.login(by_username("alice"), "pw1").await.unwrap();
        assert!(matches!(
            sessions.refresh(Some(&tokens.access.token)).await,
            Err(SessionError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_change_password_wrong_old_password_keeps_hash() {
        let (sessions, db, id) = setup().await;
        let user = db.users().get_by_id(&id).await.unwrap().unwrap();

        assert!(matches!(
            sessions.change_password(&user, "wrong", "pw2").await,
            Err(SessionError::InvalidOldPassword)
        ));

        let after = db.users().get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(after.password_hash, user.password_hash);
    }

    #[tokio::test]
    async fn test_change_password_keeps_session_by_default() {
        let (sessions, db, id) = setup().await;
        let (_, tokens) = sessions.login(by_username("alice"), "pw1").await.unwrap();
        let user = db.users().get_by_id(&id).await.unwrap().unwrap();

        sessions.change_password(&user, "pw1", "pw2").await.unwrap();

        let user = db.users().get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(user.token_version, 0);
        assert!(sessions.hasher().verify("pw2", &user.password_hash).await.unwrap());
        sessions.refresh(Some(&tokens.refresh.token)).await.unwrap();
    }

    #[tokio::test]
    async fn test_change_password_with_revocation() {
        let (sessions, db, id) = setup().await;
        let sessions = sessions.revoke_on_password_change(true);
        let (_, tokens) = sessions.login(by_username("alice"), "pw1").await.unwrap();
        let user = db.users().get_by_id(&id).await.unwrap().unwrap();

        sessions.change_password(&user, "pw1", "pw2").await.unwrap();

        let user = db.users().get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(user.token_version, 1);
        assert!(db.sessions().get(&id).await.unwrap().is_none());
        assert!(matches!(
            sessions.refresh(Some(&tokens.refresh.token)).await,
            Err(SessionError::TokenReused)
        ));
    }
}
