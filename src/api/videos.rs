//! Video endpoints.
//!
//! All endpoints require authentication. Mutations are limited to the
//! video's owner.

use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    response::IntoResponse,
    routing::{get, patch},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ApiResponse, ResultExt, validate_uuid};
use super::upload::UploadForm;
use super::users::discard_asset;
use super::{IMAGE_BODY_LIMIT, VIDEO_BODY_LIMIT};
use crate::auth::Auth;
use crate::db::{Database, NewVideo, Video, VideoQuery, VideoSort, VideoSortField};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::media::{MediaStore, ResourceKind};
use crate::ownership::authorize;

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone)]
pub struct VideosState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
    pub media: Arc<dyn MediaStore>,
}

impl_has_auth_backend!(VideosState);

pub fn router(state: VideosState) -> Router {
    Router::new()
        .route(
            "/",
            get(list_videos)
                .post(publish_video)
                .layer(DefaultBodyLimit::max(VIDEO_BODY_LIMIT)),
        )
        .route(
            "/{video_id}",
            get(get_video)
                .patch(update_video)
                .delete(delete_video)
                .layer(DefaultBodyLimit::max(IMAGE_BODY_LIMIT)),
        )
        .route("/toggle/publish/{video_id}", patch(toggle_publish))
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    page: Option<String>,
    limit: Option<String>,
    query: Option<String>,
    sort_by: Option<String>,
    sort_type: Option<String>,
    user_id: Option<String>,
}

impl ListParams {
    fn into_query(self) -> Result<VideoQuery, ApiError> {
        let page = self
            .page
            .and_then(|p| p.trim().parse::<u32>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(1);
        let limit = self
            .limit
            .and_then(|l| l.trim().parse::<u32>().ok())
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);

        let field = match self.sort_by.as_deref().map(str::trim) {
            None | Some("") => VideoSortField::default(),
            Some(s) => VideoSortField::parse(s)
                .ok_or_else(|| ApiError::bad_request(format!("Cannot sort by {}", s)))?,
        };
        let ascending = self
            .sort_type
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("asc"));

        let owner_id = match self.user_id.map(|u| u.trim().to_string()) {
            Some(u) if !u.is_empty() => {
                validate_uuid(&u, "user")?;
                Some(u)
            }
            _ => None,
        };

        Ok(VideoQuery {
            page,
            limit,
            search: self
                .query
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty()),
            owner_id,
            sort: VideoSort { field, ascending },
        })
    }
}

async fn list_videos(
    State(state): State<VideosState>,
    _auth: Auth,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let query = params.into_query()?;
    let page = state
        .db
        .videos()
        .list(&query)
        .await
        .db_err("Failed to list videos")?;

    Ok(ApiResponse::ok(page, "Videos fetched successfully"))
}

async fn publish_video(
    State(state): State<VideosState>,
    Auth(auth): Auth,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = UploadForm::read(
        &mut multipart,
        &[
            ("videoFile", ResourceKind::Video),
            ("thumbnail", ResourceKind::Image),
        ],
    )
    .await?;

    let title = form
        .text("title")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    let description = form
        .text("description")
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string);
    let (Some(title), Some(description)) = (title, description) else {
        return Err(ApiError::bad_request("Title and description are required"));
    };

    let video_file = form
        .take_file("videoFile")
        .ok_or_else(|| ApiError::bad_request("Video file is required"))?;
    let thumbnail_file = form
        .take_file("thumbnail")
        .ok_or_else(|| ApiError::bad_request("Thumbnail is required"))?;

    let video_asset = state.media.upload(video_file).await?;
    let thumbnail = match state.media.upload(thumbnail_file).await {
        Ok(asset) => asset,
        Err(e) => {
            discard_asset(state.media.as_ref(), &video_asset.public_id, ResourceKind::Video).await;
            return Err(e.into());
        }
    };

    let id = uuid::Uuid::new_v4().to_string();
    let created = state
        .db
        .videos()
        .create(&NewVideo {
            id: &id,
            owner_id: auth.id(),
            title: &title,
            description: &description,
            video_url: &video_asset.url,
            video_public_id: &video_asset.public_id,
            thumbnail_url: &thumbnail.url,
            thumbnail_public_id: &thumbnail.public_id,
            duration: video_asset.duration.unwrap_or(0.0),
        })
        .await;
    if let Err(e) = created {
        discard_asset(state.media.as_ref(), &video_asset.public_id, ResourceKind::Video).await;
        discard_asset(state.media.as_ref(), &thumbnail.public_id, ResourceKind::Image).await;
        return Err(ApiError::db_error("Failed to save video", e));
    }

    let video = load_video(&state.db, &id).await?;
    info!(video_id = %id, owner = %auth.id(), "Video published");
    Ok(ApiResponse::ok(video, "Video uploaded successfully"))
}

async fn load_video(db: &Database, video_id: &str) -> Result<Video, ApiError> {
    db.videos()
        .get(video_id)
        .await
        .db_err("Failed to load video")?
        .ok_or_else(|| ApiError::not_found("Video not found"))
}

/// Load a video the caller owns.
async fn load_owned_video(db: &Database, video_id: &str, user_id: &str) -> Result<Video, ApiError> {
    validate_uuid(video_id, "video")?;
    let video = load_video(db, video_id).await?;
    authorize(user_id, &video)?;
    Ok(video)
}

async fn get_video(
    State(state): State<VideosState>,
    Auth(auth): Auth,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&video_id, "video")?;

    let video = load_video(&state.db, &video_id).await?;
    if !video.is_published && video.owner_id != auth.id() {
        return Err(ApiError::not_found("Video not found"));
    }

    state
        .db
        .videos()
        .increment_views(&video_id)
        .await
        .db_err("Failed to count view")?;
    state
        .db
        .users()
        .push_watch_history(auth.id(), &video_id)
        .await
        .db_err("Failed to update watch history")?;

    let detail = state
        .db
        .videos()
        .detail(&video_id, auth.id())
        .await
        .db_err("Failed to load video")?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;
    let watch_history = state
        .db
        .users()
        .watch_history_ids(auth.id())
        .await
        .db_err("Failed to load watch history")?;

    Ok(ApiResponse::ok(
        serde_json::json!({
            "video": detail,
            "watchHistory": watch_history,
        }),
        "Video fetched successfully",
    ))
}

async fn update_video(
    State(state): State<VideosState>,
    Auth(auth): Auth,
    Path(video_id): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let video = load_owned_video(&state.db, &video_id, auth.id()).await?;

    let mut form =
        UploadForm::read(&mut multipart, &[("thumbnail", ResourceKind::Image)]).await?;
    let title = form
        .text("title")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    let description = form
        .text("description")
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string);
    let thumbnail_file = form.take_file("thumbnail");

    if title.is_none() && description.is_none() && thumbnail_file.is_none() {
        return Err(ApiError::bad_request(
            "Provide a title, description or thumbnail to update",
        ));
    }

    let thumbnail = match thumbnail_file {
        Some(file) => Some(state.media.upload(file).await?),
        None => None,
    };

    let updated = state
        .db
        .videos()
        .update(
            &video_id,
            title.as_deref(),
            description.as_deref(),
            thumbnail
                .as_ref()
                .map(|t| (t.url.as_str(), t.public_id.as_str())),
        )
        .await;
    if let Err(e) = updated {
        if let Some(t) = &thumbnail {
            discard_asset(state.media.as_ref(), &t.public_id, ResourceKind::Image).await;
        }
        return Err(ApiError::db_error("Failed to update video", e));
    }

    if thumbnail.is_some() {
        discard_asset(
            state.media.as_ref(),
            &video.thumbnail_public_id,
            ResourceKind::Image,
        )
        .await;
    }

    let video = load_video(&state.db, &video_id).await?;
    Ok(ApiResponse::ok(video, "Video updated successfully"))
}

async fn delete_video(
    State(state): State<VideosState>,
    Auth(auth): Auth,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let video = load_owned_video(&state.db, &video_id, auth.id()).await?;

    let deleted = state
        .db
        .videos()
        .delete(&video_id)
        .await
        .db_err("Failed to delete video")?;
    if !deleted {
        return Err(ApiError::not_found("Video not found"));
    }

    discard_asset(state.media.as_ref(), &video.video_public_id, ResourceKind::Video).await;
    discard_asset(
        state.media.as_ref(),
        &video.thumbnail_public_id,
        ResourceKind::Image,
    )
    .await;

    info!(video_id = %video_id, "Video deleted");
    Ok(ApiResponse::ok(
        serde_json::json!({}),
        "Video deleted successfully",
    ))
}

async fn toggle_publish(
    State(state): State<VideosState>,
    Auth(auth): Auth,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let video = load_owned_video(&state.db, &video_id, auth.id()).await?;
    let published = !video.is_published;

    state
        .db
        .videos()
        .set_published(&video_id, published)
        .await
        .db_err("Failed to update video")?;

    Ok(ApiResponse::ok(
        serde_json::json!({ "isPublished": published }),
        "Video publish status toggled",
    ))
}
