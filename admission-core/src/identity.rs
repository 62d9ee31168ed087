use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::token::Claims;

/// Tenant roles recognized across the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Farmer,
    Supplier,
    Admin,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Farmer => "farmer",
            AccountType::Supplier => "supplier",
            AccountType::Admin => "admin",
        }
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "farmer" => Ok(AccountType::Farmer),
            "supplier" => Ok(AccountType::Supplier),
            "admin" => Ok(AccountType::Admin),
            _ => Err(format!("Unknown account type: {}", s)),
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a request is acting as, decided once by the gatekeeper and carried
/// in request extensions from then on. Anonymous only ever reaches handlers
/// on routes whose policy allows it.
#[derive(Debug, Clone)]
pub enum Identity {
    Anonymous,
    Account(Claims),
}

impl Identity {
    pub fn claims(&self) -> Option<&Claims> {
        match self {
            Identity::Anonymous => None,
            Identity::Account(claims) => Some(claims),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }
}

/// Extractor for handlers on login-required routes.
///
/// The gatekeeper has already verified the credential; this only lifts the
/// claims out of the request extensions.
pub struct CurrentAccount(pub Claims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentAccount
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Identity>() {
            Some(Identity::Account(claims)) => Ok(CurrentAccount(claims.clone())),
            _ => Err(AppError::Unauthenticated(
                "no account identity on request".to_string(),
            )),
        }
    }
}
