use admission_core::error::AppError;
use admission_core::identity::CurrentAccount;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::dtos::accounts::{AccountResponse, UpdateProfileRequest};
use crate::utils::ValidatedJson;
use crate::AppState;

/// Fetch the calling account's profile
#[utoipa::path(
    get,
    path = "/accounts/me",
    responses(
        (status = 200, description = "Account profile", body = AccountResponse),
        (status = 401, description = "Missing or rejected credential", body = ErrorResponse)
    ),
    tag = "Accounts",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_me(
    State(state): State<AppState>,
    CurrentAccount(claims): CurrentAccount,
) -> Result<impl IntoResponse, AppError> {
    let account = state.identity.get_profile(&claims.sub).await?;
    Ok((StatusCode::OK, Json(AccountResponse::from(account))))
}

/// Update the calling account's profile
#[utoipa::path(
    put,
    path = "/accounts/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = AccountResponse),
        (status = 400, description = "Empty update", body = ErrorResponse),
        (status = 401, description = "Missing or rejected credential", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many profile updates", body = ErrorResponse)
    ),
    tag = "Accounts",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_me(
    State(state): State<AppState>,
    CurrentAccount(claims): CurrentAccount,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let account = state.identity.update_profile(&claims.sub, req.into()).await?;
    Ok((StatusCode::OK, Json(AccountResponse::from(account))))
}
