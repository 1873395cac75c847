mod common;

use axum::http::StatusCode;
use common::{TestApp, create_test_app};
use serde_json::json;

fn assert_forbidden(response: &common::TestResponse, kind: &str) {
    assert_eq!(response.status, StatusCode::FORBIDDEN, "{}", response.body);
    assert_eq!(response.body["success"], false);
    assert_eq!(
        response.body["message"],
        format!("You do not have permission to modify this {}", kind)
    );
}

async fn setup() -> (TestApp, common::Session, common::Session) {
    let app = create_test_app().await;
    let owner = app.signup("owner").await;
    let intruder = app.signup("intruder").await;
    (app, owner, intruder)
}

#[tokio::test]
async fn test_comment_mutations_are_owner_only() {
    let (app, owner, intruder) = setup().await;
    let video_id = app.publish_video(&owner, "clip").await;

    let created = app
        .json(
            "POST",
            &format!("/api/v1/comments/{}", video_id),
            Some(&owner.access_token),
            json!({ "content": "first" }),
        )
        .await;
    assert_eq!(created.status, StatusCode::OK);
    let comment_id = created.body["data"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/comments/c/{}", comment_id);

    let edit = app
        .json("PATCH", &uri, Some(&intruder.access_token), json!({ "content": "mine now" }))
        .await;
    assert_forbidden(&edit, "comment");
    let delete = app
        .json("DELETE", &uri, Some(&intruder.access_token), json!({}))
        .await;
    assert_forbidden(&delete, "comment");

    let own_edit = app
        .json("PATCH", &uri, Some(&owner.access_token), json!({ "content": "edited" }))
        .await;
    assert_eq!(own_edit.status, StatusCode::OK);
    assert_eq!(own_edit.body["data"]["content"], "edited");

    let own_delete = app
        .json("DELETE", &uri, Some(&owner.access_token), json!({}))
        .await;
    assert_eq!(own_delete.status, StatusCode::OK);

    let gone = app
        .json("PATCH", &uri, Some(&owner.access_token), json!({ "content": "x" }))
        .await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tweet_mutations_are_owner_only() {
    let (app, owner, intruder) = setup().await;

    let created = app
        .json(
            "POST",
            "/api/v1/tweets",
            Some(&owner.access_token),
            json!({ "content": "hello world" }),
        )
        .await;
    assert_eq!(created.status, StatusCode::OK);
    let uri = format!(
        "/api/v1/tweets/{}",
        created.body["data"]["id"].as_str().unwrap()
    );

    let edit = app
        .json("PATCH", &uri, Some(&intruder.access_token), json!({ "content": "hijacked" }))
        .await;
    assert_forbidden(&edit, "tweet");
    let delete = app
        .json("DELETE", &uri, Some(&intruder.access_token), json!({}))
        .await;
    assert_forbidden(&delete, "tweet");

    let own = app
        .json("DELETE", &uri, Some(&owner.access_token), json!({}))
        .await;
    assert_eq!(own.status, StatusCode::OK);
}

#[tokio::test]
async fn test_playlist_mutations_are_owner_only() {
    let (app, owner, intruder) = setup().await;
    let video_id = app.publish_video(&owner, "clip").await;

    let created = app
        .json(
            "POST",
            "/api/v1/playlist",
            Some(&owner.access_token),
            json!({ "name": "mix", "description": "favourites" }),
        )
        .await;
    assert_eq!(created.status, StatusCode::OK);
    let playlist_id = created.body["data"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/playlist/{}", playlist_id);

    let edit = app
        .json(
            "PATCH",
            &uri,
            Some(&intruder.access_token),
            json!({ "name": "stolen", "description": "x" }),
        )
        .await;
    assert_forbidden(&edit, "playlist");

    let add = app
        .json(
            "PATCH",
            &format!("/api/v1/playlist/add/{}/{}", video_id, playlist_id),
            Some(&intruder.access_token),
            json!({}),
        )
        .await;
    assert_forbidden(&add, "playlist");

    let remove = app
        .json(
            "PATCH",
            &format!("/api/v1/playlist/remove/{}/{}", video_id, playlist_id),
            Some(&intruder.access_token),
            json!({}),
        )
        .await;
    assert_forbidden(&remove, "playlist");

    let delete = app
        .json("DELETE", &uri, Some(&intruder.access_token), json!({}))
        .await;
    assert_forbidden(&delete, "playlist");

    let own = app
        .json("DELETE", &uri, Some(&owner.access_token), json!({}))
        .await;
    assert_eq!(own.status, StatusCode::OK);
}

#[tokio::test]
async fn test_video_mutations_are_owner_only() {
    let (app, owner, intruder) = setup().await;
    let video_id = app.publish_video(&owner, "clip").await;
    let uri = format!("/api/v1/videos/{}", video_id);

    let edit = app
        .multipart(
            "PATCH",
            &uri,
            Some(&intruder.access_token),
            &[("title", "hijacked")],
            &[],
        )
        .await;
    assert_forbidden(&edit, "video");

    let toggle = app
        .json(
            "PATCH",
            &format!("/api/v1/videos/toggle/publish/{}", video_id),
            Some(&intruder.access_token),
            json!({}),
        )
        .await;
    assert_forbidden(&toggle, "video");

    let delete = app
        .json("DELETE", &uri, Some(&intruder.access_token), json!({}))
        .await;
    assert_forbidden(&delete, "video");

    // Media untouched by the rejected attempts
    assert_eq!(app.media.len().await, 4);

    let own = app
        .json("DELETE", &uri, Some(&owner.access_token), json!({}))
        .await;
    assert_eq!(own.status, StatusCode::OK);
    // Two avatars remain
    assert_eq!(app.media.len().await, 2);
}

#[tokio::test]
async fn test_missing_resource_is_not_found_and_bad_id_is_rejected() {
    let (app, owner, _) = setup().await;
    let missing = uuid::Uuid::new_v4();

    let tweet = app
        .json(
            "DELETE",
            &format!("/api/v1/tweets/{}", missing),
            Some(&owner.access_token),
            json!({}),
        )
        .await;
    assert_eq!(tweet.status, StatusCode::NOT_FOUND);

    let bad = app
        .json(
            "DELETE",
            "/api/v1/tweets/not-an-id",
            Some(&owner.access_token),
            json!({}),
        )
        .await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad.body["message"], "Invalid tweet id");
}
