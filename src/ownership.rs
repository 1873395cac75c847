//! Ownership checks for mutating user-created resources.

use crate::api::ApiError;
use crate::db::{Comment, Playlist, Tweet, Video};

/// A resource with an immutable creator.
pub trait Owned {
    /// Lowercase resource name used in error messages.
    const KIND: &'static str;

    fn owner_id(&self) -> &str;
}

impl Owned for Comment {
    const KIND: &'static str = "comment";
    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

impl Owned for Tweet {
    const KIND: &'static str = "tweet";
    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

impl Owned for Playlist {
    const KIND: &'static str = "playlist";
    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

impl Owned for Video {
    const KIND: &'static str = "video";
    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

/// Allow the operation only if `user_id` created `resource`.
pub fn authorize<R: Owned>(user_id: &str, resource: &R) -> Result<(), ApiError> {
    if resource.owner_id() == user_id {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!(
            "You do not have permission to modify this {}",
            R::KIND
        )))
    }
}
