//! Comments on videos.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, patch},
};
use serde::Deserialize;
use std::sync::Arc;

use super::error::{ApiError, ApiResponse, ResultExt, require_field, validate_uuid};
use crate::auth::Auth;
use crate::db::{Comment, Database};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::ownership::authorize;

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone)]
pub struct CommentsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
}

impl_has_auth_backend!(CommentsState);

pub fn router(state: CommentsState) -> Router {
    Router::new()
        .route("/{video_id}", get(list_comments).post(add_comment))
        .route("/c/{comment_id}", patch(update_comment).delete(delete_comment))
        .with_state(state)
}

#[derive(Deserialize)]
struct PageParams {
    page: Option<String>,
    limit: Option<String>,
}

#[derive(Deserialize)]
struct CommentRequest {
    content: Option<String>,
}

/// Unpublished videos are NotFound to everyone but their owner.
async fn ensure_video_visible(
    db: &Database,
    video_id: &str,
    viewer_id: &str,
) -> Result<(), ApiError> {
    validate_uuid(video_id, "video")?;
    let visible = db
        .videos()
        .visible_to(video_id, viewer_id)
        .await
        .db_err("Failed to load video")?;
    if !visible {
        return Err(ApiError::not_found("Video not found"));
    }
    Ok(())
}

async fn load_owned_comment(
    db: &Database,
    comment_id: &str,
    user_id: &str,
) -> Result<Comment, ApiError> {
    validate_uuid(comment_id, "comment")?;
    let comment = db
        .comments()
        .get(comment_id)
        .await
        .db_err("Failed to load comment")?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;
    authorize(user_id, &comment)?;
    Ok(comment)
}

async fn list_comments(
    State(state): State<CommentsState>,
    Auth(auth): Auth,
    Path(video_id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_video_visible(&state.db, &video_id, auth.id()).await?;

    let page = params
        .page
        .and_then(|p| p.parse::<u32>().ok())
        .filter(|p| *p > 0)
        .unwrap_or(1);
    let limit = params
        .limit
        .and_then(|l| l.parse::<u32>().ok())
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .min(MAX_PAGE_SIZE);

    let comments = state
        .db
        .comments()
        .list_for_video(&video_id, auth.id(), page, limit)
        .await
        .db_err("Failed to list comments")?;

    Ok(ApiResponse::ok(comments, "Comments fetched successfully"))
}

async fn add_comment(
    State(state): State<CommentsState>,
    Auth(auth): Auth,
    Path(video_id): Path<String>,
    Json(payload): Json<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = require_field(payload.content.as_deref(), "content")?;
    ensure_video_visible(&state.db, &video_id, auth.id()).await?;

    let id = uuid::Uuid::new_v4().to_string();
    let comment = state
        .db
        .comments()
        .create(&id, &video_id, auth.id(), content)
        .await
        .db_err("Failed to add comment")?;

    Ok(ApiResponse::ok(comment, "Comment added successfully"))
}

async fn update_comment(
    State(state): State<CommentsState>,
    Auth(auth): Auth,
    Path(comment_id): Path<String>,
    Json(payload): Json<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = require_field(payload.content.as_deref(), "content")?;
    load_owned_comment(&state.db, &comment_id, auth.id()).await?;

    let comment = state
        .db
        .comments()
        .update(&comment_id, content)
        .await
        .db_err("Failed to update comment")?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;

    Ok(ApiResponse::ok(comment, "Comment updated successfully"))
}

async fn delete_comment(
    State(state): State<CommentsState>,
    Auth(auth): Auth,
    Path(comment_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    load_owned_comment(&state.db, &comment_id, auth.id()).await?;

    let deleted = state
        .db
        .comments()
        .delete(&comment_id)
        .await
        .db_err("Failed to delete comment")?;
    if !deleted {
        return Err(ApiError::not_found("Comment not found"));
    }

    Ok(ApiResponse::ok(
        serde_json::json!({ "commentId": comment_id }),
        "Comment deleted successfully",
    ))
}
