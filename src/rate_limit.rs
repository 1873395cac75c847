//! Rate limiting for the credential endpoints.
//!
//! Per-IP token buckets in front of `/login` and `/register` slow down
//! password guessing and signup spam.

use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc};
use tracing::warn;

use crate::api::ErrorBody;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

const LOGIN_PER_SEC: NonZeroU32 = NonZeroU32::new(1).unwrap();
const LOGIN_BURST: NonZeroU32 = NonZeroU32::new(5).unwrap();
const REGISTER_PER_MIN: NonZeroU32 = NonZeroU32::new(3).unwrap();

#[derive(Clone)]
pub struct RateLimitConfig {
    /// 5 attempts, then one per second
    pub login: Arc<IpLimiter>,
    /// 3 signups per minute
    pub register: Arc<IpLimiter>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitConfig {
    pub fn new() -> Self {
        Self {
            login: Arc::new(RateLimiter::keyed(
                Quota::per_second(LOGIN_PER_SEC).allow_burst(LOGIN_BURST),
            )),
            register: Arc::new(RateLimiter::keyed(Quota::per_minute(REGISTER_PER_MIN))),
        }
    }
}

/// Client IP from the connection info.
pub fn client_ip(parts: &Parts) -> Option<String> {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
}

fn too_many(message: &'static str) -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(ErrorBody {
            success: false,
            message,
        }),
    )
        .into_response()
}

async fn check(limiter: &IpLimiter, request: Request, next: Next, message: &'static str) -> Response {
    let (parts, body) = request.into_parts();
    let Some(ip) = client_ip(&parts) else {
        return (
            StatusCode::FORBIDDEN,
            Json(ErrorBody {
                success: false,
                message: "Unable to determine client IP",
            }),
        )
            .into_response();
    };

    match limiter.check_key(&ip) {
        Ok(_) => next.run(Request::from_parts(parts, body)).await,
        Err(_) => {
            warn!(ip = %ip, "Rate limit exceeded");
            too_many(message)
        }
    }
}

/// Middleware for rate limiting login attempts.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    check(
        &config.login,
        request,
        next,
        "Too many login attempts. Please wait before trying again.",
    )
    .await
}

/// Middleware for rate limiting registration.
pub async fn rate_limit_register(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    check(
        &config.register,
        request,
        next,
        "Too many signup attempts. Please wait before trying again.",
    )
    .await
}
