mod comments;
mod dashboard;
mod error;
mod likes;
mod playlists;
mod subscriptions;
mod tweets;
mod upload;
mod users;
mod videos;

use axum::{Router, response::IntoResponse, routing::get};
use std::sync::Arc;

use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::media::MediaStore;
use crate::rate_limit::RateLimitConfig;
use crate::session::SessionManager;

pub(crate) use error::ErrorBody;
pub use error::{ApiError, ApiResponse, ResultExt, require_field, require_secret, validate_uuid};
pub use users::UsersState;

/// Body limit for image uploads.
pub const IMAGE_BODY_LIMIT: usize = 10 * 1024 * 1024;
/// Body limit for publishing a video.
pub const VIDEO_BODY_LIMIT: usize = 200 * 1024 * 1024;

async fn healthcheck() -> impl IntoResponse {
    ApiResponse::ok(serde_json::json!({ "status": "OK" }), "Health check passed")
}

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    secure_cookies: bool,
    sessions: SessionManager,
    media: Arc<dyn MediaStore>,
    rate_limit: Option<Arc<RateLimitConfig>>,
) -> Router {
    let users_state = users::UsersState {
        db: db.clone(),
        jwt: jwt.clone(),
        secure_cookies,
        sessions,
        media: media.clone(),
        rate_limit,
    };

    let videos_state = videos::VideosState {
        db: db.clone(),
        jwt: jwt.clone(),
        secure_cookies,
        media,
    };

    let comments_state = comments::CommentsState {
        db: db.clone(),
        jwt: jwt.clone(),
        secure_cookies,
    };

    let tweets_state = tweets::TweetsState {
        db: db.clone(),
        jwt: jwt.clone(),
        secure_cookies,
    };

    let likes_state = likes::LikesState {
        db: db.clone(),
        jwt: jwt.clone(),
        secure_cookies,
    };

    let playlists_state = playlists::PlaylistsState {
        db: db.clone(),
        jwt: jwt.clone(),
        secure_cookies,
    };

    let subscriptions_state = subscriptions::SubscriptionsState {
        db: db.clone(),
        jwt: jwt.clone(),
        secure_cookies,
    };

    let dashboard_state = dashboard::DashboardState {
        db,
        jwt,
        secure_cookies,
    };

    Router::new()
        .route("/healthcheck", get(healthcheck))
        .nest("/users", users::router(users_state))
        .nest("/videos", videos::router(videos_state))
        .nest("/comments", comments::router(comments_state))
        .nest("/tweets", tweets::router(tweets_state))
        .nest("/likes", likes::router(likes_state))
        .nest("/playlist", playlists::router(playlists_state))
        .nest("/subscriptions", subscriptions::router(subscriptions_state))
        .nest("/dashboard", dashboard::router(dashboard_state))
}
