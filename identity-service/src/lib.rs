pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod provider;
pub mod services;
pub mod store;
pub mod utils;

use std::sync::Arc;

use admission_core::error::AppError;
use admission_core::gate::{gatekeeper_middleware, Gatekeeper, RoutePolicy, RouteTable};
use admission_core::identity::AccountType;
use admission_core::limit::{RateLimitPolicy, SlidingWindowLimiter};
use admission_core::middleware::{metrics_middleware, request_id_middleware};
use admission_core::revoke::RevocationStore;
use admission_core::token::TokenService;
use axum::{
    http::Method,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{Modify, OpenApi};

use crate::config::IdentityConfig;
use crate::provider::IdentityProvider;
use crate::services::IdentityService;
use crate::store::AccountStore;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::auth::logout,
        handlers::accounts::get_me,
        handlers::accounts::update_me,
        handlers::admin::ratelimit_config,
        handlers::admin::ratelimit_quota,
        handlers::admin::ratelimit_reset,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::auth::LoginRequest,
            dtos::auth::LoginResponse,
            dtos::auth::RefreshRequest,
            dtos::auth::RefreshResponse,
            dtos::accounts::AccountResponse,
            dtos::accounts::UpdateProfileRequest,
            dtos::admin::RateLimitConfigResponse,
            dtos::admin::QuotaResponse,
            dtos::admin::ResetResponse,
            admission_core::identity::AccountType,
            models::AccountStatus,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Login code exchange and token lifecycle"),
        (name = "Accounts", description = "Account profile management"),
        (name = "Admin", description = "Rate limit administration"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: IdentityConfig,
    pub identity: IdentityService,
    pub accounts: Arc<dyn AccountStore>,
    pub revocations: Arc<dyn RevocationStore>,
    pub tokens: Arc<TokenService>,
    pub limiter: Arc<SlidingWindowLimiter>,
    pub gate: Gatekeeper,
}

impl AppState {
    pub fn new(
        config: IdentityConfig,
        provider: Arc<dyn IdentityProvider>,
        accounts: Arc<dyn AccountStore>,
        revocations: Arc<dyn RevocationStore>,
    ) -> Result<Self, AppError> {
        let tokens = Arc::new(TokenService::new(
            &config.tokens.signing_secret,
            config.tokens.access_ttl_seconds,
            config.tokens.refresh_ttl_seconds,
        )?);

        let limiter = Arc::new(SlidingWindowLimiter::with_whitelist(
            config.edge.whitelist.iter().copied(),
        ));

        let identity = IdentityService::new(
            provider,
            accounts.clone(),
            tokens.clone(),
            revocations.clone(),
        );

        let mut gate = Gatekeeper::new(
            tokens.clone(),
            revocations.clone(),
            limiter.clone(),
            route_table(&config),
        )
        .with_skip_paths(
            ["/health", "/metrics", "/favicon.ico"]
                .into_iter()
                .map(String::from),
        );

        if config.edge.enabled {
            gate = gate.with_edge_policy(RateLimitPolicy::per_window_seconds(
                config.edge.max_requests,
                config.edge.window_seconds,
            ));
        }

        Ok(Self {
            config,
            identity,
            accounts,
            revocations,
            tokens,
            limiter,
            gate,
        })
    }
}

/// Admission policy per route. Anything not registered here is public and
/// unmetered apart from the edge cap.
fn route_table(config: &IdentityConfig) -> RouteTable {
    let limits = &config.route_limits;

    RouteTable::new()
        .register(
            Method::POST,
            "/auth/login",
            RoutePolicy::public().with_limit(RateLimitPolicy::per_window_seconds(
                limits.login_max,
                limits.login_window_seconds,
            )),
        )
        .register(
            Method::POST,
            "/auth/refresh",
            RoutePolicy::public().with_limit(RateLimitPolicy::per_window_seconds(
                limits.refresh_max,
                limits.refresh_window_seconds,
            )),
        )
        .register(Method::POST, "/auth/logout", RoutePolicy::authenticated())
        .register(Method::GET, "/accounts/me", RoutePolicy::authenticated())
        .register(
            Method::PUT,
            "/accounts/me",
            RoutePolicy::authenticated().with_limit(RateLimitPolicy::per_window_seconds(
                limits.profile_max,
                limits.profile_window_seconds,
            )),
        )
        .register(
            Method::GET,
            "/admin/ratelimit/config",
            RoutePolicy::restricted([AccountType::Admin]),
        )
        .register(
            Method::GET,
            "/admin/ratelimit/quota/:ip",
            RoutePolicy::restricted([AccountType::Admin]),
        )
        .register(
            Method::DELETE,
            "/admin/ratelimit/reset/:ip",
            RoutePolicy::restricted([AccountType::Admin]),
        )
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/logout", post(handlers::auth::logout))
        .route(
            "/accounts/me",
            get(handlers::accounts::get_me).put(handlers::accounts::update_me),
        )
        .route(
            "/admin/ratelimit/config",
            get(handlers::admin::ratelimit_config),
        )
        .route(
            "/admin/ratelimit/quota/:ip",
            get(handlers::admin::ratelimit_quota),
        )
        .route(
            "/admin/ratelimit/reset/:ip",
            delete(handlers::admin::ratelimit_reset),
        )
        .with_state(state.clone())
        // Admission gate: edge cap, credential parse, login and role
        // enforcement, per-route quotas
        .layer(from_fn_with_state(state.gate.clone(), gatekeeper_middleware))
        // Add metrics middleware
        .layer(from_fn(metrics_middleware))
        // Add tracing layer
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        // Add tracing middleware for request_id
        .layer(from_fn(request_id_middleware))
        // Add CORS layer
        .layer(
            CorsLayer::new()
                .allow_origin(
                    state
                        .config
                        .security
                        .allowed_origins
                        .iter()
                        .map(|o| {
                            o.parse::<axum::http::HeaderValue>().unwrap_or_else(|e| {
                                tracing::error!(
                                    "Invalid CORS origin '{}': {}. Using fallback.",
                                    o,
                                    e
                                );
                                axum::http::HeaderValue::from_static("*")
                            })
                        })
                        .collect::<Vec<axum::http::HeaderValue>>(),
                )
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    axum::http::header::AUTHORIZATION,
                    axum::http::header::CONTENT_TYPE,
                ]),
        );

    Ok(app)
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 500, description = "Service is unhealthy")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.accounts.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Account store health check failed");
        e
    })?;

    state.revocations.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Revocation store health check failed");
        AppError::StorageError(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "account_store": "up",
            "revocation_store": "up"
        }
    })))
}
