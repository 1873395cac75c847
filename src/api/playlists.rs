//! Playlists. Every mutation is limited to the playlist's owner.

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
use crate::db::{Database, Playlist, PlaylistDetail};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::ownership::authorize;

#[derive(Clone)]
pub struct PlaylistsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
}

impl_has_auth_backend!(PlaylistsState);

pub fn router(state: PlaylistsState) -> Router {
    Router::new()
        .route("/", post(create_playlist))
        .route("/user/{user_id}", get(user_playlists))
        .route(
            "/{playlist_id}",
            get(get_playlist)
                .patch(update_playlist)
                .delete(delete_playlist),
        )
        .route("/add/{video_id}/{playlist_id}", patch(add_video))
        .route("/remove/{video_id}/{playlist_id}", patch(remove_video))
        .with_state(state)
}

#[derive(Deserialize)]
struct PlaylistRequest {
    name: Option<String>,
    description: Option<String>,
}

impl PlaylistRequest {
    fn fields(&self) -> Result<(&str, &str), ApiError> {
        Ok((
            require_field(self.name.as_deref(), "name")?,
            require_field(self.description.as_deref(), "description")?,
        ))
    }
}

async fn load_owned_playlist(
    db: &Database,
    playlist_id: &str,
    user_id: &str,
) -> Result<Playlist, ApiError> {
    validate_uuid(playlist_id, "playlist")?;
    let playlist = db
        .playlists()
        .get(playlist_id)
        .await
        .db_err("Failed to load playlist")?
        .ok_or_else(|| ApiError::not_found("Playlist not found"))?;
    authorize(user_id, &playlist)?;
    Ok(playlist)
}

async fn create_playlist(
    State(state): State<PlaylistsState>,
    Auth(auth): Auth,
    Json(payload): Json<PlaylistRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (name, description) = payload.fields()?;

    let id = uuid::Uuid::new_v4().to_string();
    let playlist = state
        .db
        .playlists()
        .create(&id, auth.id(), name, description)
        .await
        .db_err("Failed to create playlist")?;

    Ok(ApiResponse::ok(playlist, "Playlist created successfully"))
}

async fn user_playlists(
    State(state): State<PlaylistsState>,
    _auth: Auth,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&user_id, "user")?;

    let playlists = state
        .db
        .playlists()
        .list_by_owner(&user_id)
        .await
        .db_err("Failed to list playlists")?;

    Ok(ApiResponse::ok(playlists, "User playlists fetched successfully"))
}

async fn get_playlist(
    State(state): State<PlaylistsState>,
    Auth(auth): Auth,
    Path(playlist_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&playlist_id, "playlist")?;

    let playlist = state
        .db
        .playlists()
        .detail(&playlist_id, auth.id())
        .await
        .db_err("Failed to load playlist")?
        .ok_or_else(|| ApiError::not_found("Playlist not found"))?;

    Ok(ApiResponse::ok(playlist, "Playlist fetched successfully"))
}

async fn update_playlist(
    State(state): State<PlaylistsState>,
    Auth(auth): Auth,
    Path(playlist_id): Path<String>,
    Json(payload): Json<PlaylistRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (name, description) = payload.fields()?;
    load_owned_playlist(&state.db, &playlist_id, auth.id()).await?;

    let playlist = state
        .db
        .playlists()
        .update(&playlist_id, name, description)
        .await
        .db_err("Failed to update playlist")?
        .ok_or_else(|| ApiError::not_found("Playlist not found"))?;

    Ok(ApiResponse::ok(playlist, "Playlist updated successfully"))
}

async fn delete_playlist(
    State(state): State<PlaylistsState>,
    Auth(auth): Auth,
    Path(playlist_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    load_owned_playlist(&state.db, &playlist_id, auth.id()).await?;

    state
        .db
        .playlists()
        .delete(&playlist_id)
        .await
        .db_err("Failed to delete playlist")?;

    Ok(ApiResponse::ok(
        serde_json::json!({}),
        "Playlist deleted successfully",
    ))
}

/// Check the caller owns the playlist. Adding also requires a video the
/// caller can see; removal works on anything already in the playlist.
async fn membership_targets(
    db: &Database,
    video_id: &str,
    playlist_id: &str,
    user_id: &str,
    adding: bool,
) -> Result<(), ApiError> {
    validate_uuid(video_id, "video")?;
    load_owned_playlist(db, playlist_id, user_id).await?;
    if !adding {
        return Ok(());
    }
    let visible = db
        .videos()
        .visible_to(video_id, user_id)
        .await
        .db_err("Failed to load video")?;
    if !visible {
        return Err(ApiError::not_found("Video not found"));
    }
    Ok(())
}

async fn add_video(
    State(state): State<PlaylistsState>,
    Auth(auth): Auth,
    Path((video_id, playlist_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    membership_targets(&state.db, &video_id, &playlist_id, auth.id(), true).await?;

    state
        .db
        .playlists()
        .add_video(&playlist_id, &video_id)
        .await
        .db_err("Failed to add video to playlist")?;
    let playlist = load_playlist(&state.db, &playlist_id, auth.id()).await?;

    Ok(ApiResponse::ok(playlist, "Video added to playlist"))
}

async fn remove_video(
    State(state): State<PlaylistsState>,
    Auth(auth): Auth,
    Path((video_id, playlist_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    membership_targets(&state.db, &video_id, &playlist_id, auth.id(), false).await?;

    state
        .db
        .playlists()
        .remove_video(&playlist_id, &video_id)
        .await
        .db_err("Failed to remove video from playlist")?;
    let playlist = load_playlist(&state.db, &playlist_id, auth.id()).await?;

    Ok(ApiResponse::ok(playlist, "Video removed from playlist"))
}

async fn load_playlist(
    db: &Database,
    playlist_id: &str,
    viewer_id: &str,
) -> Result<PlaylistDetail, ApiError> {
    db.playlists()
        .detail(playlist_id, viewer_id)
        .await
        .db_err("Failed to load playlist")?
        .ok_or_else(|| ApiError::not_found("Playlist not found"))
}
