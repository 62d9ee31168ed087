use std::sync::Arc;

use admission_core::error::AppError;
use admission_core::identity::AccountType;
use admission_core::revoke::RevocationStore;
use admission_core::token::{IssuedToken, TokenService, TokenUse};
use anyhow::anyhow;
use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::dtos::auth::LoginRequest;
use crate::models::{Account, NewAccount, ProfilePatch};
use crate::provider::IdentityProvider;
use crate::store::AccountStore;

/// Result of a successful login: the account (fresh or pre-existing), a
/// signed token pair, and whether this login created the account.
#[derive(Debug)]
pub struct LoginOutcome {
    pub account: Account,
    pub access: IssuedToken,
    pub refresh: IssuedToken,
    pub is_new_account: bool,
}

/// Orchestrates code exchange, account lookup and credential issuance.
#[derive(Clone)]
pub struct IdentityService {
    provider: Arc<dyn IdentityProvider>,
    accounts: Arc<dyn AccountStore>,
    tokens: Arc<TokenService>,
    revocations: Arc<dyn RevocationStore>,
}

impl IdentityService {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        accounts: Arc<dyn AccountStore>,
        tokens: Arc<TokenService>,
        revocations: Arc<dyn RevocationStore>,
    ) -> Self {
        Self {
            provider,
            accounts,
            tokens,
            revocations,
        }
    }

    /// Exchanges a one-time login code and finds or creates the account for
    /// the resolved external identity.
    ///
    /// Profile hints in the request are stored on create. For existing
    /// accounts they refresh the profile only when they actually differ, so
    /// plain re-logins leave the row untouched.
    #[instrument(skip(self, req))]
    pub async fn login(&self, req: LoginRequest) -> Result<LoginOutcome, AppError> {
        let identity = self.provider.exchange_code(&req.code).await?;

        let new = NewAccount {
            external_id: identity.external_id,
            link_id: identity.link_id,
            display_name: req.display_name.clone(),
            avatar_url: req.avatar_url.clone(),
            account_type: req.account_type.unwrap_or(AccountType::Farmer),
        };

        let (mut account, created) = self.accounts.insert_or_fetch(new).await?;

        if !account.is_active() {
            warn!(account_id = account.id, "Disabled account attempted login");
            return Err(AppError::AccountDisabled);
        }

        if !created {
            let patch = ProfilePatch {
                display_name: req
                    .display_name
                    .filter(|name| account.display_name.as_ref() != Some(name)),
                avatar_url: req
                    .avatar_url
                    .filter(|url| account.avatar_url.as_ref() != Some(url)),
            };
            if !patch.is_empty() {
                if let Some(updated) = self.accounts.update_profile(account.id, patch).await? {
                    account = updated;
                }
            }
        }

        let (access, refresh) = self
            .tokens
            .issue_pair(&account.id.to_string(), account.account_type)?;

        info!(
            account_id = account.id,
            is_new_account = created,
            "Login succeeded"
        );

        Ok(LoginOutcome {
            account,
            access,
            refresh,
            is_new_account: created,
        })
    }

    /// Revokes every credential issued to the account up to now. Tokens
    /// issued at or before the mark stop verifying immediately; a later
    /// login issues fresh ones.
    #[instrument(skip(self))]
    pub async fn logout(&self, account_id: &str) -> Result<(), AppError> {
        self.revocations
            .mark(
                account_id,
                Utc::now().timestamp(),
                self.tokens.refresh_ttl_seconds(),
            )
            .await
            .map_err(AppError::StorageError)?;

        info!(account_id = %account_id, "Credentials revoked");
        Ok(())
    }

    /// Trades a live refresh token for a fresh access token. The account is
    /// re-read so role or status changes since login take effect here.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<(Account, IssuedToken), AppError> {
        let claims = self.tokens.decode(refresh_token, TokenUse::Refresh)?;

        let revoked = self
            .revocations
            .is_revoked(&claims.sub, claims.iat)
            .await
            .map_err(AppError::StorageError)?;
        if revoked {
            return Err(AppError::Revoked);
        }

        let account = self.find_account(&claims.sub).await?;
        if !account.is_active() {
            return Err(AppError::AccountDisabled);
        }

        let access = self
            .tokens
            .issue(&account.id.to_string(), account.account_type, TokenUse::Access)?;

        Ok((account, access))
    }

    pub async fn get_profile(&self, account_id: &str) -> Result<Account, AppError> {
        self.find_account(account_id).await
    }

    pub async fn update_profile(
        &self,
        account_id: &str,
        patch: ProfilePatch,
    ) -> Result<Account, AppError> {
        if patch.is_empty() {
            return Err(AppError::BadRequest(anyhow!("No fields to update")));
        }

        let account = self.find_account(account_id).await?;

        self.accounts
            .update_profile(account.id, patch)
            .await?
            .ok_or_else(|| AppError::Unauthenticated("Account no longer exists".to_string()))
    }

    /// Resolves a credential subject back to its account row.
    async fn find_account(&self, account_id: &str) -> Result<Account, AppError> {
        let id: i64 = account_id.parse().map_err(|_| AppError::Malformed)?;

        self.accounts
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Unauthenticated("Account no longer exists".to_string()))
    }
}
