//! Authentication user types.

use serde::Serialize;

use crate::db::User;
use crate::jwt::AccessClaims;

/// The principal behind an authenticated request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Claims from the presented access token
    pub claims: AccessClaims,
    /// The user, freshly loaded for this request
    pub user: User,
}

impl AuthenticatedUser {
    pub fn id(&self) -> &str {
        &self.user.id
    }
}

/// A user without credential fields, safe to return to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            fullname: user.fullname.clone(),
            avatar: user.avatar_url.clone(),
            cover_image: user.cover_image_url.clone(),
            created_at: user.created_at.clone(),
            updated_at: user.updated_at.clone(),
        }
    }
}
