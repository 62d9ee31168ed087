use admission_core::identity::AccountType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Whether an account may log in and act. Disabled accounts keep their
/// records but every credential path refuses them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Disabled,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Disabled => "disabled",
        }
    }
}

impl std::str::FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(AccountStatus::Active),
            "disabled" => Ok(AccountStatus::Disabled),
            _ => Err(format!("Unknown account status: {}", s)),
        }
    }
}

/// One marketplace account, keyed internally by `id` and externally by the
/// identity provider's `external_id`.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub external_id: String,
    /// Cross-app id some providers issue alongside the primary id.
    pub link_id: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub account_type: AccountType,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

/// Everything needed to create an account on first login.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub external_id: String,
    pub link_id: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub account_type: AccountType,
}

/// Partial profile update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePatch {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.avatar_url.is_none()
    }
}
