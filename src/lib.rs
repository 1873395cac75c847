pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod media;
pub mod ownership;
pub mod password;
pub mod rate_limit;
pub mod session;

use api::create_api_router;
use axum::{Json, Router, http::StatusCode, response::IntoResponse};
use db::Database;
use jwt::JwtConfig;
use media::MediaStore;
use password::PasswordHasher;
use rate_limit::RateLimitConfig;
use session::SessionManager;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Prefix every API route is mounted under.
pub const API_PREFIX: &str = "/api/v1";

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Secret for signing access tokens
    pub access_secret: Vec<u8>,
    /// Secret for signing refresh tokens, distinct from the access secret
    pub refresh_secret: Vec<u8>,
    /// Access token lifetime in seconds
    pub access_ttl: u64,
    /// Refresh token lifetime in seconds
    pub refresh_ttl: u64,
    /// Where uploaded avatars, thumbnails and videos go
    pub media: Arc<dyn MediaStore>,
    pub bcrypt_cost: u32,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Whether to rate limit login and registration per client IP
    pub rate_limit: bool,
    /// Whether a password change revokes existing sessions and access tokens
    pub revoke_sessions_on_password_change: bool,
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "success": false, "message": "Route not found" })),
    )
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(
        JwtConfig::new(&config.access_secret, &config.refresh_secret)
            .with_durations(config.access_ttl, config.refresh_ttl),
    );

    let sessions = SessionManager::new(
        config.db.clone(),
        jwt.clone(),
        PasswordHasher::new(config.bcrypt_cost),
    )
    .revoke_on_password_change(config.revoke_sessions_on_password_change);

    let rate_limit = config
        .rate_limit
        .then(|| Arc::new(RateLimitConfig::new()));

    let api_router = create_api_router(
        config.db.clone(),
        jwt,
        config.secure_cookies,
        sessions,
        config.media.clone(),
        rate_limit,
    );

    Router::new()
        .nest(API_PREFIX, api_router)
        .fallback(not_found)
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
