mod common;

use axum::http::StatusCode;
use common::{authed_get, body_json, delete, get, post_json, spawn_app_with, TestApp};
use serde_json::json;

const ADMIN_IP: &str = "203.0.113.9";

async fn spawn_with_admin() -> (TestApp, String) {
    let app = spawn_app_with(|config| {
        config.edge.max_requests = 5;
        config.edge.window_seconds = 60;
    })
    .await;
    app.register_code("admin-code", "ext-admin");

    let response = app
        .request(post_json(
            "/auth/login",
            ADMIN_IP,
            json!({ "code": "admin-code", "account_type": "admin" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let token = body["access_token"].as_str().unwrap().to_string();

    (app, token)
}

#[tokio::test]
async fn config_endpoint_echoes_the_edge_policy() {
    let (app, token) = spawn_with_admin().await;

    let response = app
        .request(authed_get("/admin/ratelimit/config", ADMIN_IP, &token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["enabled"], true);
    assert_eq!(body["window_seconds"], 60);
    assert_eq!(body["max_requests"], 5);
    assert_eq!(body["whitelist"][0], common::WHITELISTED_IP);
}

#[tokio::test]
async fn quota_endpoint_reports_consumption_without_consuming() {
    let (app, token) = spawn_with_admin().await;

    // Burn two requests from the inspected address.
    for _ in 0..2 {
        app.request(get("/does-not-exist", "203.0.113.60")).await;
    }

    let quota_path = "/admin/ratelimit/quota/203.0.113.60";
    for _ in 0..2 {
        let response = app.request(authed_get(quota_path, ADMIN_IP, &token)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["key"], "ip:203.0.113.60");
        assert_eq!(body["limit"], 5);
        assert_eq!(body["used"], 2);
        assert_eq!(body["remaining"], 3);
        assert!(body["resets_in_seconds"].as_u64().unwrap() <= 60);
    }
}

#[tokio::test]
async fn quota_for_unseen_address_is_the_full_budget() {
    let (app, token) = spawn_with_admin().await;

    let response = app
        .request(authed_get(
            "/admin/ratelimit/quota/203.0.113.61",
            ADMIN_IP,
            &token,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["used"], 0);
    assert_eq!(body["remaining"], 5);
    assert_eq!(body["resets_in_seconds"], serde_json::Value::Null);
}

#[tokio::test]
async fn quota_rejects_non_ip_input() {
    let (app, token) = spawn_with_admin().await;

    let response = app
        .request(authed_get(
            "/admin/ratelimit/quota/not-an-ip",
            ADMIN_IP,
            &token,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reset_unblocks_an_exhausted_address() {
    let (app, token) = spawn_with_admin().await;

    let blocked_ip = "203.0.113.62";
    for _ in 0..5 {
        app.request(get("/does-not-exist", blocked_ip)).await;
    }
    let response = app.request(get("/does-not-exist", blocked_ip)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let response = app
        .request(delete(
            &format!("/admin/ratelimit/reset/{}", blocked_ip),
            ADMIN_IP,
            &token,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["cleared"], true);

    let response = app.request(get("/does-not-exist", blocked_ip)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reset_of_untracked_address_reports_nothing_cleared() {
    let (app, token) = spawn_with_admin().await;

    let response = app
        .request(delete(
            "/admin/ratelimit/reset/203.0.113.63",
            ADMIN_IP,
            &token,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["cleared"], false);
}

#[tokio::test]
async fn admin_routes_refuse_anonymous_and_non_admin_callers() {
    let (app, _) = spawn_with_admin().await;
    app.register_code("farmer-code", "ext-farmer");

    let response = app
        .request(get("/admin/ratelimit/config", "203.0.113.64"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = app.login("farmer-code", "203.0.113.64").await;
    let farmer_token = body["access_token"].as_str().unwrap().to_string();

    let response = app
        .request(authed_get(
            "/admin/ratelimit/config",
            "203.0.113.64",
            &farmer_token,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
