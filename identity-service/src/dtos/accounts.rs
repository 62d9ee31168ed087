use admission_core::identity::AccountType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{Account, AccountStatus, ProfilePatch};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccountResponse {
    #[schema(example = 42)]
    pub account_id: i64,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub account_type: AccountType,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        AccountResponse {
            account_id: account.id,
            display_name: account.display_name,
            avatar_url: account.avatar_url,
            account_type: account.account_type,
            status: account.status,
            created_at: account.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 64, message = "Display name must be 1-64 characters"))]
    #[schema(example = "Zhang Wei")]
    pub display_name: Option<String>,
    #[validate(length(max = 512, message = "Avatar URL must be at most 512 characters"))]
    #[schema(example = "https://cdn.example.com/avatars/42.png")]
    pub avatar_url: Option<String>,
}

impl From<UpdateProfileRequest> for ProfilePatch {
    fn from(req: UpdateProfileRequest) -> Self {
        ProfilePatch {
            display_name: req.display_name,
            avatar_url: req.avatar_url,
        }
    }
}
