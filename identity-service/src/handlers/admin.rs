use std::net::IpAddr;

use admission_core::error::AppError;
use admission_core::limit::{LimiterKey, RateLimitPolicy};
use anyhow::anyhow;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::dtos::admin::{QuotaResponse, RateLimitConfigResponse, ResetResponse};
use crate::AppState;

fn parse_ip(raw: &str) -> Result<IpAddr, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(anyhow!("Not an IP address: {}", raw)))
}

fn edge_policy(state: &AppState) -> RateLimitPolicy {
    RateLimitPolicy::per_window_seconds(
        state.config.edge.max_requests,
        state.config.edge.window_seconds,
    )
}

/// Show the per-address admission policy
#[utoipa::path(
    get,
    path = "/admin/ratelimit/config",
    responses(
        (status = 200, description = "Current rate limit configuration", body = RateLimitConfigResponse),
        (status = 401, description = "Missing or rejected credential", body = ErrorResponse),
        (status = 403, description = "Caller is not an admin", body = ErrorResponse)
    ),
    tag = "Admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn ratelimit_config(State(state): State<AppState>) -> impl IntoResponse {
    let edge = &state.config.edge;
    Json(RateLimitConfigResponse {
        enabled: edge.enabled,
        window_seconds: edge.window_seconds,
        max_requests: edge.max_requests,
        whitelist: edge.whitelist.iter().map(IpAddr::to_string).collect(),
    })
}

/// Inspect one address's remaining quota without consuming it
#[utoipa::path(
    get,
    path = "/admin/ratelimit/quota/{ip}",
    params(
        ("ip" = String, Path, description = "Client IP address")
    ),
    responses(
        (status = 200, description = "Quota snapshot", body = QuotaResponse),
        (status = 400, description = "Not an IP address", body = ErrorResponse),
        (status = 401, description = "Missing or rejected credential", body = ErrorResponse),
        (status = 403, description = "Caller is not an admin", body = ErrorResponse)
    ),
    tag = "Admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn ratelimit_quota(
    State(state): State<AppState>,
    Path(ip): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let key = LimiterKey::Ip(parse_ip(&ip)?);
    let decision = state.limiter.peek(&key, edge_policy(&state));

    Ok((
        StatusCode::OK,
        Json(QuotaResponse {
            key: key.to_string(),
            limit: decision.limit,
            remaining: decision.remaining,
            used: decision.limit.saturating_sub(decision.remaining),
            resets_in_seconds: decision.retry_after_seconds(),
        }),
    ))
}

/// Clear one address's counted requests
#[utoipa::path(
    delete,
    path = "/admin/ratelimit/reset/{ip}",
    params(
        ("ip" = String, Path, description = "Client IP address")
    ),
    responses(
        (status = 200, description = "Counter cleared", body = ResetResponse),
        (status = 400, description = "Not an IP address", body = ErrorResponse),
        (status = 401, description = "Missing or rejected credential", body = ErrorResponse),
        (status = 403, description = "Caller is not an admin", body = ErrorResponse)
    ),
    tag = "Admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn ratelimit_reset(
    State(state): State<AppState>,
    Path(ip): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let key = LimiterKey::Ip(parse_ip(&ip)?);
    let cleared = state.limiter.reset(&key);

    tracing::info!(key = %key, cleared, "Rate limit counter reset");

    Ok((
        StatusCode::OK,
        Json(ResetResponse {
            key: key.to_string(),
            cleared,
        }),
    ))
}
