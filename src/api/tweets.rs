//! Short text posts.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, patch, post},
};
use serde::Deserialize;
use std::sync::Arc;

use super::error::{ApiError, ApiResponse, ResultExt, require_field, validate_uuid};
use crate::auth::Auth;
use crate::db::{Database, Tweet};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::ownership::authorize;

#[derive(Clone)]
pub struct TweetsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
}

impl_has_auth_backend!(TweetsState);

pub fn router(state: TweetsState) -> Router {
    Router::new()
        .route("/", post(create_tweet))
        .route("/user/{user_id}", get(user_tweets))
        .route("/{tweet_id}", patch(update_tweet).delete(delete_tweet))
        .with_state(state)
}

#[derive(Deserialize)]
struct TweetRequest {
    content: Option<String>,
}

async fn load_owned_tweet(db: &Database, tweet_id: &str, user_id: &str) -> Result<Tweet, ApiError> {
    validate_uuid(tweet_id, "tweet")?;
    let tweet = db
        .tweets()
        .get(tweet_id)
        .await
        .db_err("Failed to load tweet")?
        .ok_or_else(|| ApiError::not_found("Tweet not found"))?;
    authorize(user_id, &tweet)?;
    Ok(tweet)
}

async fn create_tweet(
    State(state): State<TweetsState>,
    Auth(auth): Auth,
    Json(payload): Json<TweetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = require_field(payload.content.as_deref(), "content")?;

    let id = uuid::Uuid::new_v4().to_string();
    let tweet = state
        .db
        .tweets()
        .create(&id, auth.id(), content)
        .await
        .db_err("Failed to create tweet")?;

    Ok(ApiResponse::ok(tweet, "Tweet created successfully"))
}

async fn user_tweets(
    State(state): State<TweetsState>,
    _auth: Auth,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&user_id, "user")?;

    let tweets = state
        .db
        .tweets()
        .list_by_owner(&user_id)
        .await
        .db_err("Failed to list tweets")?;

    Ok(ApiResponse::ok(tweets, "Tweets fetched successfully"))
}

async fn update_tweet(
    State(state): State<TweetsState>,
    Auth(auth): Auth,
    Path(tweet_id): Path<String>,
    Json(payload): Json<TweetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = require_field(payload.content.as_deref(), "content")?;
    load_owned_tweet(&state.db, &tweet_id, auth.id()).await?;

    let tweet = state
        .db
        .tweets()
        .update(&tweet_id, content)
        .await
        .db_err("Failed to update tweet")?
        .ok_or_else(|| ApiError::not_found("Tweet not found"))?;

    Ok(ApiResponse::ok(tweet, "Tweet updated successfully"))
}

async fn delete_tweet(
    State(state): State<TweetsState>,
    Auth(auth): Auth,
    Path(tweet_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    load_owned_tweet(&state.db, &tweet_id, auth.id()).await?;

    let deleted = state
        .db
        .tweets()
        .delete(&tweet_id)
        .await
        .db_err("Failed to delete tweet")?;
    if !deleted {
        return Err(ApiError::not_found("Tweet not found"));
    }

    Ok(ApiResponse::ok(
        serde_json::json!({ "tweetId": tweet_id }),
        "Tweet deleted successfully",
    ))
}
