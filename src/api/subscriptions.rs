//! Channel subscriptions.

use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
};
use std::sync::Arc;

use super::error::{ApiError, ApiResponse, ResultExt, validate_uuid};
use crate::auth::Auth;
use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct SubscriptionsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
}

impl_has_auth_backend!(SubscriptionsState);

pub fn router(state: SubscriptionsState) -> Router {
    Router::new()
        .route(
            "/c/{channel_id}",
            get(channel_subscribers).post(toggle_subscription),
        )
        .route("/u/{subscriber_id}", get(subscribed_channels))
        .with_state(state)
}

async fn toggle_subscription(
    State(state): State<SubscriptionsState>,
    Auth(auth): Auth,
    Path(channel_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&channel_id, "channel")?;

    let channel = state
        .db
        .users()
        .get_by_id(&channel_id)
        .await
        .db_err("Failed to load channel")?;
    if channel.is_none() {
        return Err(ApiError::not_found("Channel not found"));
    }

    let subscribed = state
        .db
        .subscriptions()
        .toggle(auth.id(), &channel_id)
        .await
        .db_err("Failed to toggle subscription")?;

    let message = if subscribed {
        "Channel subscribed successfully"
    } else {
        "Channel unsubscribed successfully"
    };
    Ok(ApiResponse::ok(
        serde_json::json!({ "subscribed": subscribed }),
        message,
    ))
}

async fn channel_subscribers(
    State(state): State<SubscriptionsState>,
    _auth: Auth,
    Path(channel_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&channel_id, "channel")?;

    let subscribers = state
        .db
        .subscriptions()
        .subscribers(&channel_id)
        .await
        .db_err("Failed to list subscribers")?;

    Ok(ApiResponse::ok(subscribers, "Subscribers fetched successfully"))
}

async fn subscribed_channels(
    State(state): State<SubscriptionsState>,
    _auth: Auth,
    Path(subscriber_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&subscriber_id, "subscriber")?;

    let channels = state
        .db
        .subscriptions()
        .subscribed_channels(&subscriber_id)
        .await
        .db_err("Failed to list subscribed channels")?;

    Ok(ApiResponse::ok(
        channels,
        "Subscribed channels fetched successfully",
    ))
}
