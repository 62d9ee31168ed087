use admission_core::identity::AccountType;
use admission_core::token::IssuedToken;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::services::LoginOutcome;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    /// One-time login code obtained from the identity provider SDK.
    #[validate(length(min = 1, message = "Login code is required"))]
    #[schema(example = "071Ab2cd3EFgh45ijkl6")]
    pub code: String,
    /// Optional profile hint; applied on create and on change.
    #[schema(example = "Zhang Wei")]
    pub display_name: Option<String>,
    #[schema(example = "https://cdn.example.com/avatars/42.png")]
    pub avatar_url: Option<String>,
    /// Requested role for brand-new accounts. Ignored for existing accounts.
    pub account_type: Option<AccountType>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    #[schema(example = 42)]
    pub account_id: i64,
    pub access_token: String,
    pub refresh_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Access token lifetime in seconds.
    #[schema(example = 900)]
    pub expires_in: i64,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub account_type: AccountType,
    /// True when this login created the account.
    pub is_new_account: bool,
}

impl From<LoginOutcome> for LoginResponse {
    fn from(outcome: LoginOutcome) -> Self {
        LoginResponse {
            account_id: outcome.account.id,
            expires_in: outcome.access.expires_in(),
            access_token: outcome.access.token,
            refresh_token: outcome.refresh.token,
            token_type: "Bearer".to_string(),
            display_name: outcome.account.display_name,
            avatar_url: outcome.account.avatar_url,
            account_type: outcome.account.account_type,
            is_new_account: outcome.is_new_account,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    #[schema(example = 900)]
    pub expires_in: i64,
}

impl From<IssuedToken> for RefreshResponse {
    fn from(access: IssuedToken) -> Self {
        RefreshResponse {
            expires_in: access.expires_in(),
            access_token: access.token,
            token_type: "Bearer".to_string(),
        }
    }
}
