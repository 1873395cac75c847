//! Channel dashboard for the signed-in user.

use axum::{Router, extract::State, response::IntoResponse, routing::get};
use std::sync::Arc;

use super::error::{ApiError, ApiResponse, ResultExt};
use crate::auth::Auth;
use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct DashboardState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
}

impl_has_auth_backend!(DashboardState);

pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/stats", get(channel_stats))
        .route("/videos", get(channel_videos))
        .with_state(state)
}

async fn channel_stats(
    State(state): State<DashboardState>,
    Auth(auth): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let stats = state
        .db
        .dashboard()
        .stats(auth.id())
        .await
        .db_err("Failed to load channel stats")?
        .ok_or_else(|| ApiError::not_found("Channel not found"))?;

    Ok(ApiResponse::ok(stats, "Channel stats fetched successfully"))
}

async fn channel_videos(
    State(state): State<DashboardState>,
    Auth(auth): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let channel = state
        .db
        .dashboard()
        .channel_videos(auth.id())
        .await
        .db_err("Failed to load channel videos")?
        .ok_or_else(|| ApiError::not_found("Channel not found"))?;

    Ok(ApiResponse::ok(channel, "Channel videos fetched successfully"))
}
