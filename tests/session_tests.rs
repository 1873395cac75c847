mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{PASSWORD, create_test_app, create_test_app_with};
use serde_json::json;

#[tokio::test]
async fn test_login_refresh_then_replay_is_rejected() {
    let app = create_test_app().await;
    let response = app.register("alice", "alice@x.com").await;
    assert_eq!(response.status, StatusCode::OK);

    let login = app
        .json(
            "POST",
            "/api/v1/users/login",
            None,
            json!({ "username": "alice", "password": PASSWORD }),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
    assert!(login.cookie("accessToken").is_some());
    let original = login.cookie("refreshToken").unwrap();
    assert_eq!(login.body["data"]["refreshToken"], original.as_str());
    assert!(login.body["data"]["user"].get("passwordHash").is_none());
    assert!(login.body["data"]["user"].get("refreshToken").is_none());

    let refreshed = app
        .json(
            "POST",
            "/api/v1/users/refreshToken",
            None,
            json!({ "refreshToken": original }),
        )
        .await;
    assert_eq!(refreshed.status, StatusCode::OK);
    let rotated = refreshed.body["data"]["refreshToken"].as_str().unwrap();
    assert_ne!(rotated, original);
    assert_eq!(refreshed.cookie("refreshToken").as_deref(), Some(rotated));

    let replay = app
        .json(
            "POST",
            "/api/v1/users/refreshToken",
            None,
            json!({ "refreshToken": original }),
        )
        .await;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);
    assert_eq!(replay.body["success"], false);
    assert_eq!(replay.body["message"], "Refresh token is expired or used");
}

#[tokio::test]
async fn test_refresh_reads_cookie() {
    let app = create_test_app().await;
    let session = app.signup("bob").await;

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/v1/users/refreshToken")
                .header(
                    header::COOKIE,
                    format!("refreshToken={}", session.refresh_token),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.cookie("accessToken").is_some());
}

#[tokio::test]
async fn test_refresh_without_token_is_unauthorized() {
    let app = create_test_app().await;

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/v1/users/refreshToken")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["message"], "Unauthorized request");
}

#[tokio::test]
async fn test_logout_then_refresh_fails() {
    let app = create_test_app().await;
    let session = app.signup("carol").await;

    let logout = app
        .json(
            "POST",
            "/api/v1/users/logout",
            Some(&session.access_token),
            json!({}),
        )
        .await;
    assert_eq!(logout.status, StatusCode::OK);
    assert!(
        logout
            .cookies
            .iter()
            .any(|c| c.starts_with("accessToken=;") && c.contains("Max-Age=0"))
    );
    assert!(
        logout
            .cookies
            .iter()
            .any(|c| c.starts_with("refreshToken=;") && c.contains("Max-Age=0"))
    );

    let refresh = app
        .json(
            "POST",
            "/api/v1/users/refreshToken",
            None,
            json!({ "refreshToken": session.refresh_token }),
        )
        .await;
    assert_eq!(refresh.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_second_login_invalidates_first_refresh_token() {
    let app = create_test_app().await;
    let first = app.signup("dave").await;
    let _second = app.login("dave").await;

    let refresh = app
        .json(
            "POST",
            "/api/v1/users/refreshToken",
            None,
            json!({ "refreshToken": first.refresh_token }),
        )
        .await;
    assert_eq!(refresh.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_by_email_and_bad_password() {
    let app = create_test_app().await;
    app.register("erin", "Erin@Example.com").await;

    let by_email = app
        .json(
            "POST",
            "/api/v1/users/login",
            None,
            json!({ "email": "erin@example.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(by_email.status, StatusCode::OK);

    let wrong = app
        .json(
            "POST",
            "/api/v1/users/login",
            None,
            json!({ "username": "erin", "password": "nope" }),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.body["message"], "Invalid user credentials");

    let unknown = app
        .json(
            "POST",
            "/api/v1/users/login",
            None,
            json!({ "username": "nobody", "password": PASSWORD }),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let missing = app
        .json(
            "POST",
            "/api/v1/users/login",
            None,
            json!({ "password": PASSWORD }),
        )
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_change_password_with_wrong_old_password() {
    let app = create_test_app().await;
    let session = app.signup("frank").await;

    let response = app
        .json(
            "POST",
            "/api/v1/users/change-password",
            Some(&session.access_token),
            json!({ "oldPassword": "wrong", "newPassword": "new-password" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["message"], "Invalid old password");

    // Old password still works
    app.login("frank").await;
}

#[tokio::test]
async fn test_change_password_keeps_access_token_by_default() {
    let app = create_test_app().await;
    let session = app.signup("gina").await;

    let response = app
        .json(
            "POST",
            "/api/v1/users/change-password",
            Some(&session.access_token),
            json!({ "oldPassword": PASSWORD, "newPassword": "another password" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let me = app
        .get("/api/v1/users/current-user", &session.access_token)
        .await;
    assert_eq!(me.status, StatusCode::OK);

    let old = app
        .json(
            "POST",
            "/api/v1/users/login",
            None,
            json!({ "username": "gina", "password": PASSWORD }),
        )
        .await;
    assert_eq!(old.status, StatusCode::UNAUTHORIZED);

    let new = app
        .json(
            "POST",
            "/api/v1/users/login",
            None,
            json!({ "username": "gina", "password": "another password" }),
        )
        .await;
    assert_eq!(new.status, StatusCode::OK);
}

#[tokio::test]
async fn test_change_password_can_revoke_sessions() {
    let app = create_test_app_with(true).await;
    let session = app.signup("hank").await;

    let response = app
        .json(
            "POST",
            "/api/v1/users/change-password",
            Some(&session.access_token),
            json!({ "oldPassword": PASSWORD, "newPassword": "another password" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let refresh = app
        .json(
            "POST",
            "/api/v1/users/refreshToken",
            None,
            json!({ "refreshToken": session.refresh_token }),
        )
        .await;
    assert_eq!(refresh.status, StatusCode::UNAUTHORIZED);

    // Issued moments before the change, usually within the same second
    let stale = app
        .get("/api/v1/users/current-user", &session.access_token)
        .await;
    assert_eq!(stale.status, StatusCode::UNAUTHORIZED);
    assert_eq!(stale.body["message"], "Access token has been revoked");
    assert!(
        stale
            .cookies
            .iter()
            .any(|c| c.starts_with("accessToken=;") && c.contains("Max-Age=0"))
    );

    let fresh = app
        .json(
            "POST",
            "/api/v1/users/login",
            None,
            json!({ "username": "hank", "password": "another password" }),
        )
        .await;
    assert_eq!(fresh.status, StatusCode::OK);
    let token = fresh.body["data"]["accessToken"].as_str().unwrap();
    let me = app.get("/api/v1/users/current-user", token).await;
    assert_eq!(me.status, StatusCode::OK);
}

#[tokio::test]
async fn test_access_token_from_cookie_or_header() {
    let app = create_test_app().await;
    let session = app.signup("ivy").await;

    let via_cookie = app
        .send(
            Request::builder()
                .uri("/api/v1/users/current-user")
                .header(
                    header::COOKIE,
                    format!("accessToken={}", session.access_token),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(via_cookie.status, StatusCode::OK);
    assert_eq!(via_cookie.body["data"]["username"], "ivy");

    let via_header = app
        .get("/api/v1/users/current-user", &session.access_token)
        .await;
    assert_eq!(via_header.status, StatusCode::OK);
    assert_eq!(via_header.body["data"]["id"], session.user_id.as_str());

    let anonymous = app
        .send(
            Request::builder()
                .uri("/api/v1/users/current-user")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert_eq!(anonymous.body["success"], false);

    // A refresh token is not an access token
    let wrong_kind = app
        .get("/api/v1/users/current-user", &session.refresh_token)
        .await;
    assert_eq!(wrong_kind.status, StatusCode::UNAUTHORIZED);
}
