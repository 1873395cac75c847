//! Like toggles for videos, comments and tweets.

use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use std::sync::Arc;

use super::error::{ApiError, ApiResponse, ResultExt, validate_uuid};
use crate::auth::Auth;
use crate::db::{Database, LikeTarget};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct LikesState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
}

impl_has_auth_backend!(LikesState);

pub fn router(state: LikesState) -> Router {
    Router::new()
        .route("/toggle/v/{video_id}", post(toggle_video_like))
        .route("/toggle/c/{comment_id}", post(toggle_comment_like))
        .route("/toggle/t/{tweet_id}", post(toggle_tweet_like))
        .route("/videos", get(liked_videos))
        .with_state(state)
}

/// Like or unlike `target` after checking it exists.
async fn toggle(db: &Database, user_id: &str, target: LikeTarget<'_>) -> Result<bool, ApiError> {
    let (what, exists) = match target {
        LikeTarget::Video(id) => {
            validate_uuid(id, "video")?;
            ("Video", db.videos().visible_to(id, user_id).await)
        }
        LikeTarget::Comment(id) => {
            validate_uuid(id, "comment")?;
            ("Comment", db.comments().get(id).await.map(|c| c.is_some()))
        }
        LikeTarget::Tweet(id) => {
            validate_uuid(id, "tweet")?;
            ("Tweet", db.tweets().get(id).await.map(|t| t.is_some()))
        }
    };
    if !exists.db_err("Failed to load like target")? {
        return Err(ApiError::not_found(format!("{} not found", what)));
    }

    db.likes()
        .toggle(user_id, target)
        .await
        .db_err("Failed to toggle like")
}

fn toggled(is_liked: bool) -> impl IntoResponse {
    let message = if is_liked { "Liked" } else { "Like removed" };
    ApiResponse::ok(serde_json::json!({ "isLiked": is_liked }), message)
}

async fn toggle_video_like(
    State(state): State<LikesState>,
    Auth(auth): Auth,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let liked = toggle(&state.db, auth.id(), LikeTarget::Video(&video_id)).await?;
    Ok(toggled(liked))
}

async fn toggle_comment_like(
    State(state): State<LikesState>,
    Auth(auth): Auth,
    Path(comment_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let liked = toggle(&state.db, auth.id(), LikeTarget::Comment(&comment_id)).await?;
    Ok(toggled(liked))
}

async fn toggle_tweet_like(
    State(state): State<LikesState>,
    Auth(auth): Auth,
    Path(tweet_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let liked = toggle(&state.db, auth.id(), LikeTarget::Tweet(&tweet_id)).await?;
    Ok(toggled(liked))
}

async fn liked_videos(
    State(state): State<LikesState>,
    Auth(auth): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let videos = state
        .db
        .likes()
        .liked_videos(auth.id())
        .await
        .db_err("Failed to list liked videos")?;

    Ok(ApiResponse::ok(videos, "Liked videos fetched successfully"))
}
