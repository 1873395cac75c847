#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::Value;
use tower::ServiceExt;
use vidtube::{ServerConfig, create_app, db::Database, media::MemoryMediaStore};

pub const BOUNDARY: &str = "vidtube-test-boundary";
pub const PASSWORD: &str = "correct horse battery";

pub struct TestApp {
    pub router: Router,
    pub db: Database,
    pub media: Arc<MemoryMediaStore>,
}

/// Tokens and identity of a logged-in test user.
pub struct Session {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// A response with its cookies and parsed JSON body.
pub struct TestResponse {
    pub status: StatusCode,
    pub cookies: Vec<String>,
    pub body: Value,
}

impl TestResponse {
    pub fn cookie(&self, name: &str) -> Option<String> {
        let prefix = format!("{}=", name);
        self.cookies.iter().find_map(|c| {
            let rest = c.strip_prefix(&prefix)?;
            Some(rest.split(';').next().unwrap_or("").to_string())
        })
    }
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with(false).await
}

pub async fn create_test_app_with(revoke_sessions_on_password_change: bool) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let media = Arc::new(MemoryMediaStore::new());
    let config = ServerConfig {
        db: db.clone(),
        access_secret: b"test-access-secret-that-is-long-enough".to_vec(),
        refresh_secret: b"test-refresh-secret-that-is-long-enough".to_vec(),
        access_ttl: 900,
        refresh_ttl: 3600,
        media: media.clone(),
        bcrypt_cost: 4,
        secure_cookies: false,
        rate_limit: false,
        revoke_sessions_on_password_change,
    };
    TestApp {
        router: create_app(&config),
        db,
        media,
    }
}

fn extract_set_cookies(response: &axum::http::Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let cookies = extract_set_cookies(&response);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse {
            status,
            cookies,
            body,
        }
    }

    /// Send a JSON request, authenticated with a bearer token if given.
    pub async fn json(
        &self,
        method: &str,
        uri: &str,
        access_token: Option<&str>,
        body: Value,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = access_token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn get(&self, uri: &str, access_token: &str) -> TestResponse {
        self.send(
            Request::builder()
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", access_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn multipart(
        &self,
        method: &str,
        uri: &str,
        access_token: Option<&str>,
        fields: &[(&str, &str)],
        files: &[(&str, &str, &[u8])],
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        if let Some(token) = access_token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(
            builder
                .body(Body::from(multipart_body(fields, files)))
                .unwrap(),
        )
        .await
    }

    pub async fn register(&self, username: &str, email: &str) -> TestResponse {
        self.multipart(
            "POST",
            "/api/v1/users/register",
            None,
            &[
                ("fullname", "Test User"),
                ("email", email),
                ("username", username),
                ("password", PASSWORD),
            ],
            &[("avatar", "avatar.png", b"png-bytes")],
        )
        .await
    }

    pub async fn login(&self, username: &str) -> Session {
        let response = self
            .json(
                "POST",
                "/api/v1/users/login",
                None,
                serde_json::json!({ "username": username, "password": PASSWORD }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {}", response.body);
        let data = &response.body["data"];
        Session {
            user_id: data["user"]["id"].as_str().unwrap().to_string(),
            access_token: data["accessToken"].as_str().unwrap().to_string(),
            refresh_token: data["refreshToken"].as_str().unwrap().to_string(),
        }
    }

    /// Register and log in a user named `username`.
    pub async fn signup(&self, username: &str) -> Session {
        let response = self
            .register(username, &format!("{}@example.com", username))
            .await;
        assert_eq!(
            response.status,
            StatusCode::OK,
            "register failed: {}",
            response.body
        );
        self.login(username).await
    }

    /// Publish a video as `session`, returning its id.
    pub async fn publish_video(&self, session: &Session, title: &str) -> String {
        let response = self
            .multipart(
                "POST",
                "/api/v1/videos",
                Some(&session.access_token),
                &[("title", title), ("description", "a test video")],
                &[
                    ("videoFile", "clip.mp4", b"mp4-bytes"),
                    ("thumbnail", "thumb.png", b"png-bytes"),
                ],
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "publish failed: {}", response.body);
        response.body["data"]["id"].as_str().unwrap().to_string()
    }
}

pub fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    for (name, file_name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}
