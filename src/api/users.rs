//! User and session endpoints.
//!
//! - POST `/register` - Create an account (multipart, avatar required)
//! - POST `/login` - Start a session, sets both token cookies
//! - POST `/logout` - End the session, clears both token cookies
//! - POST `/refreshToken` - Rotate the refresh token
//! - POST `/change-password`
//! - GET `/current-user`
//! - PATCH `/update-user`, `/update-avatar`, `/update-cover-image`
//! - GET `/channel/{username}` - Public channel profile
//! - GET `/history` - Watch history

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{HeaderName, header::SET_COOKIE, request::Parts},
    middleware,
    response::{AppendHeaders, IntoResponse},
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::IMAGE_BODY_LIMIT;
use super::error::{ApiError, ApiResponse, ResultExt, require_field, require_secret};
use super::upload::UploadForm;
use crate::auth::{
    ACCESS_COOKIE_NAME, Auth, PublicUser, REFRESH_COOKIE_NAME, clear_cookie, get_cookie,
    token_cookie,
};
use crate::db::{Database, NewUser, is_unique_violation};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::media::{MediaStore, ResourceKind, UploadedAsset};
use crate::rate_limit::{RateLimitConfig, rate_limit_login, rate_limit_register};
use crate::session::{IssuedTokens, LoginIdentifier, SessionManager};

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
    pub sessions: SessionManager,
    pub media: Arc<dyn MediaStore>,
    pub rate_limit: Option<Arc<RateLimitConfig>>,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    let mut register_routes = Router::new()
        .route(
            "/register",
            post(register).layer(DefaultBodyLimit::max(IMAGE_BODY_LIMIT * 2)),
        )
        .with_state(state.clone());
    let mut login_routes = Router::new()
        .route("/login", post(login))
        .with_state(state.clone());

    if let Some(config) = &state.rate_limit {
        register_routes = register_routes.layer(middleware::from_fn_with_state(
            config.clone(),
            rate_limit_register,
        ));
        login_routes = login_routes.layer(middleware::from_fn_with_state(
            config.clone(),
            rate_limit_login,
        ));
    }

    let rest = Router::new()
        .route("/logout", post(logout))
        .route("/refreshToken", post(refresh_token))
        .route("/change-password", post(change_password))
        .route("/current-user", get(current_user))
        .route("/update-user", patch(update_user))
        .route(
            "/update-avatar",
            patch(update_avatar).layer(DefaultBodyLimit::max(IMAGE_BODY_LIMIT)),
        )
        .route(
            "/update-cover-image",
            patch(update_cover_image).layer(DefaultBodyLimit::max(IMAGE_BODY_LIMIT)),
        )
        .route("/channel/{username}", get(channel_profile))
        .route("/history", get(watch_history))
        .with_state(state);

    Router::new()
        .merge(register_routes)
        .merge(login_routes)
        .merge(rest)
}

/// Set-Cookie headers for a new token pair.
fn session_cookies(tokens: &IssuedTokens, secure: bool) -> AppendHeaders<[(HeaderName, String); 2]> {
    AppendHeaders([
        (
            SET_COOKIE,
            token_cookie(
                ACCESS_COOKIE_NAME,
                &tokens.access.token,
                tokens.access.duration,
                secure,
            ),
        ),
        (
            SET_COOKIE,
            token_cookie(
                REFRESH_COOKIE_NAME,
                &tokens.refresh.token,
                tokens.refresh.duration,
                secure,
            ),
        ),
    ])
}

/// Best-effort removal of an asset that is no longer referenced.
pub(super) async fn discard_asset(media: &dyn MediaStore, public_id: &str, kind: ResourceKind) {
    if let Err(e) = media.delete(public_id, kind).await {
        warn!(public_id = %public_id, error = %e, "Failed to delete old media asset");
    }
}

async fn register(
    State(state): State<UsersState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = UploadForm::read(
        &mut multipart,
        &[
            ("avatar", ResourceKind::Image),
            ("coverImage", ResourceKind::Image),
        ],
    )
    .await?;

    let fields = ["fullname", "email", "username"].map(|name| {
        form.text(name)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    });
    // Stored as typed; only a blank password is rejected
    let password = form
        .text("password")
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string);
    let ([Some(fullname), Some(email), Some(username)], Some(password)) = (fields, password) else {
        return Err(ApiError::bad_request("All fields are required"));
    };
    let email = email.to_lowercase();
    let username = username.to_lowercase();

    if state
        .db
        .users()
        .exists_with_username_or_email(&username, &email)
        .await
        .db_err("Failed to check existing user")?
    {
        return Err(ApiError::conflict(
            "User with email or username already exists",
        ));
    }

    let avatar_file = form
        .take_file("avatar")
        .ok_or_else(|| ApiError::bad_request("Avatar file is required"))?;
    let cover_file = form.take_file("coverImage");

    let password_hash = state
        .sessions
        .hasher()
        .hash(&password)
        .await
        .map_err(|e| ApiError::internal(format!("Password hashing failed: {}", e)))?;

    let avatar = state.media.upload(avatar_file).await?;
    let cover: Option<UploadedAsset> = match cover_file {
        Some(file) => Some(state.media.upload(file).await?),
        None => None,
    };

    let id = uuid::Uuid::new_v4().to_string();
    let created = state
        .db
        .users()
        .create(&NewUser {
            id: &id,
            username: &username,
            email: &email,
            fullname: &fullname,
            password_hash: &password_hash,
            avatar_url: &avatar.url,
            avatar_public_id: &avatar.public_id,
            cover_image_url: cover.as_ref().map(|c| c.url.as_str()),
            cover_image_public_id: cover.as_ref().map(|c| c.public_id.as_str()),
        })
        .await;

    if let Err(e) = created {
        discard_asset(state.media.as_ref(), &avatar.public_id, ResourceKind::Image).await;
        if let Some(cover) = &cover {
            discard_asset(state.media.as_ref(), &cover.public_id, ResourceKind::Image).await;
        }
        if is_unique_violation(&e) {
            return Err(ApiError::conflict(
                "User with email or username already exists",
            ));
        }
        return Err(ApiError::db_error("Failed to create user", e));
    }

    let user = state
        .db
        .users()
        .get_by_id(&id)
        .await
        .db_err("Failed to load user")?
        .ok_or_else(|| ApiError::internal("Something went wrong while registering the user"))?;

    info!(user_id = %id, username = %username, "User registered");
    Ok(ApiResponse::ok(
        PublicUser::from(&user),
        "User registered successfully",
    ))
}

#[derive(Deserialize)]
struct LoginRequest {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionPayload {
    user: PublicUser,
    access_token: String,
    refresh_token: String,
}

async fn login(
    State(state): State<UsersState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = payload
        .username
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);
    let email = payload
        .email
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    if username.is_none() && email.is_none() {
        return Err(ApiError::bad_request("Username or email is required"));
    }
    let password = require_secret(payload.password.as_deref(), "password")?;

    let identifier = LoginIdentifier {
        username: username.as_deref(),
        email: email.as_deref(),
    };
    let (user, tokens) = state.sessions.login(identifier, password).await?;

    let cookies = session_cookies(&tokens, state.secure_cookies);
    Ok((
        cookies,
        ApiResponse::ok(
            SessionPayload {
                user: PublicUser::from(&user),
                access_token: tokens.access.token,
                refresh_token: tokens.refresh.token,
            },
            "User logged in successfully",
        ),
    ))
}

async fn logout(
    State(state): State<UsersState>,
    Auth(auth): Auth,
) -> Result<impl IntoResponse, ApiError> {
    state.sessions.logout(auth.id()).await?;

    Ok((
        AppendHeaders([
            (SET_COOKIE, clear_cookie(ACCESS_COOKIE_NAME, state.secure_cookies)),
            (SET_COOKIE, clear_cookie(REFRESH_COOKIE_NAME, state.secure_cookies)),
        ]),
        ApiResponse::ok(serde_json::json!({}), "User logged out"),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: Option<String>,
}

/// Accepts the refresh token from the cookie or a JSON body.
async fn refresh_token(
    State(state): State<UsersState>,
    parts: Parts,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let from_body = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<RefreshRequest>(&body)
            .ok()
            .and_then(|r| r.refresh_token)
    };
    let token = get_cookie(&parts.headers, REFRESH_COOKIE_NAME)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or(from_body);

    let (_user, tokens) = state.sessions.refresh(token.as_deref()).await?;

    let cookies = session_cookies(&tokens, state.secure_cookies);
    Ok((
        cookies,
        ApiResponse::ok(
            serde_json::json!({
                "accessToken": tokens.access.token,
                "refreshToken": tokens.refresh.token,
            }),
            "Access token refreshed",
        ),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest {
    old_password: Option<String>,
    new_password: Option<String>,
}

async fn change_password(
    State(state): State<UsersState>,
    Auth(auth): Auth,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let old_password = require_secret(payload.old_password.as_deref(), "oldPassword")?;
    let new_password = require_secret(payload.new_password.as_deref(), "newPassword")?;

    state
        .sessions
        .change_password(&auth.user, old_password, new_password)
        .await?;

    Ok(ApiResponse::ok(
        serde_json::json!({}),
        "Password changed successfully",
    ))
}

async fn current_user(Auth(auth): Auth) -> impl IntoResponse {
    ApiResponse::ok(PublicUser::from(&auth.user), "Current user fetched")
}

#[derive(Deserialize)]
struct UpdateUserRequest {
    fullname: Option<String>,
    email: Option<String>,
}

async fn update_user(
    State(state): State<UsersState>,
    Auth(auth): Auth,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let fullname = require_field(payload.fullname.as_deref(), "fullname")?;
    let email = require_field(payload.email.as_deref(), "email")?.to_lowercase();

    match state
        .db
        .users()
        .update_details(auth.id(), fullname, &email)
        .await
    {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::conflict("Email is already in use"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to update user", e)),
    }

    let user = state
        .db
        .users()
        .get_by_id(auth.id())
        .await
        .db_err("Failed to load user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(ApiResponse::ok(
        PublicUser::from(&user),
        "Account details updated",
    ))
}

/// Which profile image an upload replaces.
#[derive(Clone, Copy)]
enum ProfileImage {
    Avatar,
    Cover,
}

async fn replace_profile_image(
    state: UsersState,
    user_id: &str,
    old_public_id: Option<&str>,
    mut multipart: Multipart,
    which: ProfileImage,
) -> Result<ApiResponse<PublicUser>, ApiError> {
    let field = match which {
        ProfileImage::Avatar => "avatar",
        ProfileImage::Cover => "coverImage",
    };
    let mut form = UploadForm::read(&mut multipart, &[(field, ResourceKind::Image)]).await?;
    let file = form
        .take_file(field)
        .ok_or_else(|| ApiError::bad_request(format!("{} file is missing", field)))?;

    let asset = state.media.upload(file).await?;

    let users = state.db.users();
    let updated = match which {
        ProfileImage::Avatar => {
            users
                .update_avatar(user_id, &asset.url, &asset.public_id)
                .await
        }
        ProfileImage::Cover => {
            users
                .update_cover_image(user_id, &asset.url, &asset.public_id)
                .await
        }
    };
    if let Err(e) = updated {
        discard_asset(state.media.as_ref(), &asset.public_id, ResourceKind::Image).await;
        return Err(ApiError::db_error("Failed to update profile image", e));
    }

    if let Some(old) = old_public_id {
        discard_asset(state.media.as_ref(), old, ResourceKind::Image).await;
    }

    let user = users
        .get_by_id(user_id)
        .await
        .db_err("Failed to load user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let message = match which {
        ProfileImage::Avatar => "Avatar updated successfully",
        ProfileImage::Cover => "Cover image updated successfully",
    };
    Ok(ApiResponse::ok(PublicUser::from(&user), message))
}

async fn update_avatar(
    State(state): State<UsersState>,
    Auth(auth): Auth,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let old = auth.user.avatar_public_id.clone();
    replace_profile_image(state, auth.id(), Some(&old), multipart, ProfileImage::Avatar).await
}

async fn update_cover_image(
    State(state): State<UsersState>,
    Auth(auth): Auth,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let old = auth.user.cover_image_public_id.clone();
    replace_profile_image(
        state,
        auth.id(),
        old.as_deref(),
        multipart,
        ProfileImage::Cover,
    )
    .await
}

async fn channel_profile(
    State(state): State<UsersState>,
    Auth(auth): Auth,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let username = username.trim().to_lowercase();
    if username.is_empty() {
        return Err(ApiError::bad_request("Username is missing"));
    }

    let profile = state
        .db
        .users()
        .channel_profile(&username, auth.id())
        .await
        .db_err("Failed to load channel")?
        .ok_or_else(|| ApiError::not_found("Channel does not exist"))?;

    Ok(ApiResponse::ok(profile, "User channel fetched successfully"))
}

async fn watch_history(
    State(state): State<UsersState>,
    Auth(auth): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let history = state
        .db
        .users()
        .watch_history(auth.id())
        .await
        .db_err("Failed to load watch history")?;

    Ok(ApiResponse::ok(history, "Watch history fetched successfully"))
}
