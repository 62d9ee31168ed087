use admission_core::error::AppError;
use admission_core::identity::CurrentAccount;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::dtos::auth::{LoginRequest, LoginResponse, RefreshRequest, RefreshResponse};
use crate::utils::ValidatedJson;
use crate::AppState;

/// Exchange a one-time login code for a token pair
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Invalid login code", body = ErrorResponse),
        (status = 403, description = "Account disabled", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many login attempts", body = ErrorResponse),
        (status = 503, description = "Identity provider unavailable", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.identity.login(req).await?;
    Ok((StatusCode::OK, Json(LoginResponse::from(outcome))))
}

/// Trade a refresh token for a fresh access token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Access token refreshed", body = RefreshResponse),
        (status = 401, description = "Refresh token rejected", body = ErrorResponse),
        (status = 403, description = "Account disabled", body = ErrorResponse),
        (status = 429, description = "Too many refresh attempts", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (_, access) = state.identity.refresh(&req.refresh_token).await?;
    Ok((StatusCode::OK, Json(RefreshResponse::from(access))))
}

/// Revoke every credential issued to the calling account
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "Missing or rejected credential", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    CurrentAccount(claims): CurrentAccount,
) -> Result<impl IntoResponse, AppError> {
    state.identity.logout(&claims.sub).await?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "message": "Logged out"
        })),
    ))
}
