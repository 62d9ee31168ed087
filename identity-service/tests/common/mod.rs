//! Test helpers for identity-service integration tests.
//!
//! Everything runs against the real router built by `build_router`, with
//! in-memory stores and a static identity provider, so no external services
//! are needed.

#![allow(dead_code)]

use std::net::IpAddr;
use std::sync::Arc;

use admission_core::config::Environment;
use admission_core::revoke::InMemoryRevocationStore;
use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use identity_service::{
    build_router,
    config::{
        EdgeConfig, IdentityConfig, ProviderConfig, ProviderMode, RouteLimitConfig,
        SecurityConfig, StoreConfig, TokenConfig,
    },
    provider::{ExternalIdentity, StaticProvider},
    store::InMemoryAccountStore,
    AppState,
};
use secrecy::Secret;
use tower::util::ServiceExt;

pub const TEST_SIGNING_SECRET: &str = "test-signing-secret-0123456789abcdef";

/// An address on the edge whitelist in the test configuration.
pub const WHITELISTED_IP: &str = "192.0.2.250";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub provider: Arc<StaticProvider>,
}

pub fn test_config() -> IdentityConfig {
    IdentityConfig {
        environment: Environment::Dev,
        service_name: "identity-service-test".to_string(),
        service_version: "0.0.0".to_string(),
        log_level: "error".to_string(),
        port: 0,
        tokens: TokenConfig {
            signing_secret: Secret::new(TEST_SIGNING_SECRET.to_string()),
            access_ttl_seconds: 900,
            refresh_ttl_seconds: 86400,
        },
        provider: ProviderConfig {
            mode: ProviderMode::Static,
            base_url: "http://localhost:9009/session".to_string(),
            app_id: "test-app".to_string(),
            app_secret: Secret::new("test-app-secret".to_string()),
            timeout_seconds: 5,
        },
        store: StoreConfig {
            database_url: None,
            max_connections: 5,
            min_connections: 1,
            redis_url: None,
        },
        edge: EdgeConfig {
            enabled: true,
            window_seconds: 60,
            max_requests: 100,
            whitelist: vec![WHITELISTED_IP.parse::<IpAddr>().unwrap()],
            sweep_interval_seconds: 60,
        },
        route_limits: RouteLimitConfig {
            login_max: 10,
            login_window_seconds: 60,
            refresh_max: 30,
            refresh_window_seconds: 60,
            profile_max: 20,
            profile_window_seconds: 60,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

/// Spawn the app with a tweaked configuration, e.g. tighter rate limits.
pub async fn spawn_app_with(mutate: impl FnOnce(&mut IdentityConfig)) -> TestApp {
    let mut config = test_config();
    mutate(&mut config);

    let provider = Arc::new(StaticProvider::new());
    let accounts = Arc::new(InMemoryAccountStore::new());
    let revocations = Arc::new(InMemoryRevocationStore::new());

    let state = AppState::new(
        config,
        provider.clone(),
        accounts,
        revocations,
    )
    .expect("Failed to build test state");

    let router = build_router(state.clone())
        .await
        .expect("Failed to build test router");

    TestApp {
        router,
        state,
        provider,
    }
}

impl TestApp {
    /// Register a login code that resolves to the given external id.
    pub fn register_code(&self, code: &str, external_id: &str) {
        self.provider.register(
            code,
            ExternalIdentity {
                external_id: external_id.to_string(),
                link_id: None,
            },
        );
    }

    pub async fn request(&self, req: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(req)
            .await
            .expect("Request failed")
    }

    /// POST /auth/login with a registered code and return the parsed body.
    /// Panics unless the login succeeds.
    pub async fn login(&self, code: &str, ip: &str) -> serde_json::Value {
        let response = self
            .request(post_json(
                "/auth/login",
                ip,
                serde_json::json!({ "code": code }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK, "login did not succeed");
        body_json(response).await
    }
}

pub fn post_json(path: &str, ip: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("x-forwarded-for", ip)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(path: &str, ip: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(path)
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .unwrap()
}

/// Attach a bearer credential to any request builder output.
pub fn with_bearer(mut req: Request<Body>, token: &str) -> Request<Body> {
    let value = format!("Bearer {}", token)
        .parse()
        .expect("invalid header value");
    req.headers_mut().insert(header::AUTHORIZATION, value);
    req
}

pub fn authed_get(path: &str, ip: &str, token: &str) -> Request<Body> {
    with_bearer(get(path, ip), token)
}

pub fn authed_post_json(
    path: &str,
    ip: &str,
    token: &str,
    body: serde_json::Value,
) -> Request<Body> {
    with_bearer(post_json(path, ip, body), token)
}

pub fn authed_put_json(
    path: &str,
    ip: &str,
    token: &str,
    body: serde_json::Value,
) -> Request<Body> {
    let mut req = Request::builder()
        .method("PUT")
        .uri(path)
        .header("x-forwarded-for", ip)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let value = format!("Bearer {}", token)
        .parse()
        .expect("invalid header value");
    req.headers_mut().insert(header::AUTHORIZATION, value);
    req
}

pub fn delete(path: &str, ip: &str, token: &str) -> Request<Body> {
    let req = Request::builder()
        .method("DELETE")
        .uri(path)
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .unwrap();
    with_bearer(req, token)
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("Body was not valid JSON")
}

/// The `error` field of a standard error body.
pub async fn error_field(response: Response<Body>) -> String {
    body_json(response).await["error"]
        .as_str()
        .expect("error body missing `error` field")
        .to_string()
}
