// Integration tests for accounts, tokens and profiles

mod common;

use std::time::Instant;

use common::{TestApp, PASSWORD};
use recipe_api::{queue::jobs::JobKind, store::StoreTx};
use serde_json::json;
use warp::http::StatusCode;

#[tokio::test]
async fn test_signup_creates_user_and_queues_welcome_mail() {
    let app = TestApp::new();

    let (status, body) = app
        .call(
            "POST",
            "/users/",
            None,
            Some(json!({ "email": "Test2@Example.com", "password": PASSWORD, "name": "Cook" })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({ "email": "Test2@example.com", "name": "Cook" }));
    assert!(body.get("password").is_none());

    let pending = app.queue.pending().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(
        pending[0].kind,
        JobKind::SendRegisteredEmails {
            emails: vec![String::from("Test2@example.com")],
            info: None,
        }
    );
}

#[tokio::test]
async fn test_signup_with_empty_email_fails() {
    let app = TestApp::new();

    let (status, body) = app
        .call(
            "POST",
            "/users/",
            None,
            Some(json!({ "email": "", "password": PASSWORD })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("email").is_some());
    assert!(app.queue.pending().await.is_empty());
}

#[tokio::test]
async fn test_signup_duplicate_email_and_short_password() {
    let app = TestApp::new();
    app.user("taken@example.com").await;

    let (status, body) = app
        .call(
            "POST",
            "/users/",
            None,
            Some(json!({ "email": "taken@EXAMPLE.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("email").is_some());

    let (status, body) = app
        .call(
            "POST",
            "/users/",
            None,
            Some(json!({ "email": "new@example.com", "password": "pw" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("password").is_some());
}

#[tokio::test]
async fn test_token_flow() {
    let app = TestApp::new();
    let (user, _) = app.user("cook@example.com").await;

    let (status, body) = app
        .call(
            "POST",
            "/users/token/",
            None,
            Some(json!({ "email": "cook@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let access = body["access"].as_str().unwrap().to_owned();
    let refresh = body["refresh"].as_str().unwrap().to_owned();

    {
        let mut tx = app.tx().await;
        let stored = tx.get_user(user.id).await.unwrap().unwrap();
        assert!(stored.last_login.is_some());
    }

    let (status, body) = app.get("/users/me/", &access).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "email": "cook@example.com", "name": "Test Name" }));

    let (status, body) = app
        .call(
            "POST",
            "/users/token/refresh/",
            None,
            Some(json!({ "refresh": refresh })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["access"].is_string());

    // a refresh token is not accepted as an access token
    let (status, _) = app.get("/users/me/", &refresh).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_rejects_bad_credentials() {
    let app = TestApp::new();
    app.user("cook@example.com").await;

    let (status, body) = app
        .call(
            "POST",
            "/users/token/",
            None,
            Some(json!({ "email": "cook@example.com", "password": "wrongpass" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body["detail"],
        "No active account found with the given credentials"
    );

    let (status, _) = app
        .call(
            "POST",
            "/users/token/",
            None,
            Some(json!({ "email": "nobody@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .call(
            "POST",
            "/users/token/",
            None,
            Some(json!({ "email": "cook@example.com", "password": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("password").is_some());
}

#[tokio::test]
async fn test_login_does_not_block_other_requests_while_hashing() {
    let app = TestApp::new();
    let (_, token) = app.user("cook@example.com").await;

    let login = async {
        let (status, _) = app
            .call(
                "POST",
                "/users/token/",
                None,
                Some(json!({ "email": "cook@example.com", "password": PASSWORD })),
            )
            .await;
        (status, Instant::now())
    };
    let me = async {
        let (status, _) = app.get("/users/me/", &token).await;
        (status, Instant::now())
    };

    let ((login_status, login_done), (me_status, me_done)) = tokio::join!(login, me);
    assert_eq!(login_status, StatusCode::OK);
    assert_eq!(me_status, StatusCode::OK);
    assert!(me_done < login_done);
}

#[tokio::test]
async fn test_inactive_user_cannot_log_in_or_use_token() {
    let app = TestApp::new();
    let (mut user, token) = app.user("cook@example.com").await;

    {
        let mut tx = app.tx().await;
        user.is_active = false;
        tx.update_user(&user).await.unwrap();
        tx.commit().await.unwrap();
    }

    let (status, _) = app
        .call(
            "POST",
            "/users/token/",
            None,
            Some(json!({ "email": "cook@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/users/me/", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_requires_authentication() {
    let app = TestApp::new();

    let (status, body) = app.call("GET", "/users/me/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["detail"].is_string());

    let (status, _) = app.get("/users/me/", "not-a-token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_post_me_not_allowed() {
    let app = TestApp::new();
    let (_, token) = app.user("cook@example.com").await;

    let (status, _) = app.post("/users/me/", &token, json!({})).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_update_me() {
    let app = TestApp::new();
    let (_, token) = app.user("cook@example.com").await;

    let (status, body) = app
        .patch(
            "/users/me/",
            &token,
            json!({ "name": "New Name", "password": "newpassword" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "New Name");

    let (status, _) = app
        .call(
            "POST",
            "/users/token/",
            None,
            Some(json!({ "email": "cook@example.com", "password": "newpassword" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_update_me_to_taken_email_fails() {
    let app = TestApp::new();
    app.user("other@example.com").await;
    let (_, token) = app.user("cook@example.com").await;

    let (status, body) = app
        .patch("/users/me/", &token, json!({ "email": "other@example.com" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("email").is_some());
}

#[tokio::test]
async fn test_profile_read_and_owner_update() {
    let app = TestApp::new();
    let (_, token) = app.user("cook@example.com").await;

    let (status, body) = app.get("/users/profile/1/", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "bio": "", "image": null, "short_desc": "" }));

    let (status, body) = app
        .patch(
            "/users/profile/1/",
            &token,
            json!({ "bio": "I cook.", "image": "me.png" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bio"], "I cook.");
    let image = body["image"].as_str().unwrap();
    assert!(image.starts_with("uploads/profile/"));
    assert!(image.ends_with(".png"));
}

#[tokio::test]
async fn test_profile_update_by_other_user_is_forbidden() {
    let app = TestApp::new();
    app.user("owner@example.com").await;
    let (_, intruder) = app.user("intruder@example.com").await;

    let (status, _) = app.get("/users/profile/1/", &intruder).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .patch("/users/profile/1/", &intruder, json!({ "bio": "hacked" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let mut tx = app.tx().await;
    assert_eq!(tx.get_profile(1).await.unwrap().unwrap().bio, "");
}

#[tokio::test]
async fn test_profile_bio_length_limit() {
    let app = TestApp::new();
    let (_, token) = app.user("cook@example.com").await;

    let (status, body) = app
        .patch("/users/profile/1/", &token, json!({ "bio": "x".repeat(601) }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("bio").is_some());
}

#[tokio::test]
async fn test_profile_post_not_allowed_and_missing_is_404() {
    let app = TestApp::new();
    let (_, token) = app.user("cook@example.com").await;

    let (status, _) = app.post("/users/profile/1/", &token, json!({})).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, _) = app.get("/users/profile/99/", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_path_and_malformed_body() {
    let app = TestApp::new();

    let (status, _) = app.call("GET", "/nowhere/", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let response = warp::test::request()
        .method("POST")
        .path("/users/")
        .header("content-type", "application/json")
        .body("{not json")
        .reply(&recipe_api::api::routes(app.ctx.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (status, body) = app.call("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
