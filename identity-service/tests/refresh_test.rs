mod common;

use axum::http::StatusCode;
use common::{authed_get, authed_post_json, body_json, error_field, post_json, spawn_app};
use serde_json::json;

const IP: &str = "203.0.113.2";

#[tokio::test]
async fn refresh_returns_a_working_access_token() {
    let app = spawn_app().await;
    app.register_code("code-1", "ext-1");

    let body = app.login("code-1", IP).await;
    let refresh = body["refresh_token"].as_str().unwrap().to_string();

    let response = app
        .request(post_json(
            "/auth/refresh",
            IP,
            json!({ "refresh_token": refresh }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let refreshed = body_json(response).await;
    assert_eq!(refreshed["token_type"], "Bearer");
    assert_eq!(refreshed["expires_in"], 900);

    let access = refreshed["access_token"].as_str().unwrap();
    let response = app.request(authed_get("/accounts/me", IP, access)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn access_token_is_not_accepted_as_refresh_token() {
    let app = spawn_app().await;
    app.register_code("code-1", "ext-1");

    let body = app.login("code-1", IP).await;
    let access = body["access_token"].as_str().unwrap().to_string();

    let response = app
        .request(post_json(
            "/auth/refresh",
            IP,
            json!({ "refresh_token": access }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_field(response).await, "Malformed credential");
}

#[tokio::test]
async fn refresh_after_logout_is_revoked() {
    let app = spawn_app().await;
    app.register_code("code-1", "ext-1");

    let body = app.login("code-1", IP).await;
    let access = body["access_token"].as_str().unwrap().to_string();
    let refresh = body["refresh_token"].as_str().unwrap().to_string();

    let response = app
        .request(authed_post_json("/auth/logout", IP, &access, json!({})))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // The refresh token was issued at or before the logout mark, so the
    // tie goes to revocation.
    let response = app
        .request(post_json(
            "/auth/refresh",
            IP,
            json!({ "refresh_token": refresh }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_field(response).await, "Revoked credential");
}

#[tokio::test]
async fn garbage_refresh_token_is_malformed() {
    let app = spawn_app().await;

    let response = app
        .request(post_json(
            "/auth/refresh",
            IP,
            json!({ "refresh_token": "not.a.token" }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_field(response).await, "Malformed credential");
}

#[tokio::test]
async fn empty_refresh_token_fails_validation() {
    let app = spawn_app().await;

    let response = app
        .request(post_json(
            "/auth/refresh",
            IP,
            json!({ "refresh_token": "" }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn disabled_account_cannot_refresh() {
    let app = spawn_app().await;
    app.register_code("code-1", "ext-1");

    let body = app.login("code-1", IP).await;
    let refresh = body["refresh_token"].as_str().unwrap().to_string();
    let account_id = body["account_id"].as_i64().unwrap();

    app.state
        .accounts
        .set_status(account_id, identity_service::models::AccountStatus::Disabled)
        .await
        .unwrap();

    let response = app
        .request(post_json(
            "/auth/refresh",
            IP,
            json!({ "refresh_token": refresh }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
